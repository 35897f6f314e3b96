//! Protobag - self-describing archives of protobuf messages
//!
//! A bag stores raw blobs, standalone messages and time-stamped messages
//! grouped by topic. Every type written is recorded with the descriptors
//! needed to decode it, so a reader needs no generated code.
//!
//! # Quick Start
//!
//! ```ignore
//! use protobag::{BagReader, BagWriter, MaxSlopConfig, Selection, Timestamp, WriterConfig};
//!
//! // Write
//! let config = WriterConfig::new("/data/run.tar.zst");
//! let mut writer = BagWriter::create(config.clone())?;
//! writer.write_stamped_typed("/imu", Timestamp::new(12, 500)?, &imu_msg)?;
//! writer.write_stamped_typed("/gps", Timestamp::new(12, 510)?, &gps_msg)?;
//! writer.close()?;
//!
//! // Read a window back, decoded from the bag's own descriptors
//! let reader = BagReader::open(config.reader_config())?;
//! for item in reader.decoded_entries(&Selection::topics(["/imu"]))? {
//!     let (entry, msg) = item?;
//! }
//!
//! // Pair /imu and /gps samples at most 20ms apart
//! let sync = reader.time_sync(&MaxSlopConfig::new(["/imu", "/gps"], Duration::from_millis(20)))?;
//! ```
//!
//! # Architecture
//!
//! - `protobag-core`: entry model, names, index and selection types
//! - `protobag-archive`: named-blob stores (memory, directory, tar, tar.zst)
//! - `protobag-engine`: writer, reader, decoder and time sync

pub use protobag_archive::{
    ArchiveError, ArchiveFormat, ArchiveMode, ArchiveSpec, ArchiveStore, DirectoryArchive,
    MemoryArchive, TarArchive,
};
pub use protobag_core::{
    names, pb, BagIndex, BagIndexSummary, DescriptorClosure, Entry, Error, EventRef, MessageEntry,
    RawEntry, Result, Selection, StampedEntry, Timestamp, TimeRange, TopicStats, TopicTime,
    TypedBytes, PROTOBAG_VERSION,
};
pub use protobag_engine::{
    descriptors, BagIndexBuilder, BagReader, BagWriter, DecodedMessage, Decoder,
    DescriptorDecoder, DescriptorSource, DuplicatePolicy, EntryIter, IndexOptions, MaxSlopConfig,
    MaxSlopTimeSync, MessageDecoder, ReaderConfig, StaticDecoder, WriterConfig,
};
