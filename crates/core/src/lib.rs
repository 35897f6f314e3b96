//! Core types for protobag
//!
//! This crate defines the data model shared by the archive and engine crates:
//! - Timestamp: validated `(seconds, nanos)` pair
//! - Entry: Raw, Message and Stamped entries plus their archive envelopes
//! - TypedBytes: serialized message + type URL + owning entry name
//! - DescriptorClosure: schema files needed to decode one type
//! - BagIndex / BagIndexSummary: the persisted index
//! - Selection: declarative entry queries
//! - names: entry-name and type-URL conventions
//! - pb: protobuf wire messages of the bag format
//! - Error: error taxonomy

#![warn(missing_docs)]
#![warn(clippy::all)]

// Module declarations
pub mod closure;
pub mod entry;
pub mod error;
pub mod index;
pub mod names;
pub mod pb; // on-disk wire messages
pub mod selection;
pub mod timestamp;

// Re-export commonly used types
pub use closure::DescriptorClosure;
pub use entry::{Entry, MessageEntry, RawEntry, StampedEntry, TypedBytes};
pub use error::{Error, Result};
pub use index::{BagIndex, BagIndexSummary, TimeRange, TopicStats, TopicTime};
pub use selection::{EventRef, Selection};
pub use timestamp::Timestamp;

/// Version string recorded in every index this library writes
pub const PROTOBAG_VERSION: &str = env!("CARGO_PKG_VERSION");
