//! Indexing, selection and decoding engine for protobag
//!
//! This crate sits on top of the core data model and the archive stores:
//! - descriptors: descriptor closure collection
//! - BagIndexBuilder: index accumulation while writing
//! - BagWriter: entry naming, duplicate policy, index persistence on close
//! - selection: Selection to ordered entry names
//! - MessageDecoder: static and descriptor-pool decoding
//! - BagReader: lazy entry streaming
//! - MaxSlopTimeSync: multi-topic approximate-time bundles

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod decoder;
pub mod descriptors;
pub mod index_builder;
pub mod reader;
pub mod selection;
pub mod time_sync;
pub mod writer;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use config::{DuplicatePolicy, ReaderConfig, WriterConfig};
pub use decoder::{DecodedMessage, Decoder, DescriptorDecoder, MessageDecoder, StaticDecoder};
pub use index_builder::{BagIndexBuilder, DescriptorSource, IndexOptions};
pub use reader::{BagReader, EntryIter};
pub use time_sync::{MaxSlopConfig, MaxSlopTimeSync};
pub use writer::BagWriter;
