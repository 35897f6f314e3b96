//! Bag writer
//!
//! A [`BagWriter`] owns one archive opened for writing. Every write goes to
//! the archive immediately and is observed by a [`BagIndexBuilder`]; the
//! index itself is only computed and stored by [`BagWriter::close`].
//!
//! # Entry names
//!
//! Names and topics are canonicalized (`camera/` becomes `/camera`). Stamped
//! entries are named from `(topic, timestamp)`:
//!
//! ```text
//! /camera/12.500.stampedmsg.protobin      first write at 12s 500ns
//! /camera/12.500.stampedmsg.1.protobin    second write at the same instant
//! ```
//!
//! Names under `/_protobag_index` are reserved for the index.
//!
//! # Example
//!
//! ```ignore
//! let mut writer = BagWriter::create(WriterConfig::new("/data/run.tar.zst"))?;
//! writer.write_raw("/notes.txt", b"calibrated")?;
//! writer.write_stamped_typed("/imu", Timestamp::new(12, 500)?, &reading)?;
//! let index = writer.close()?;
//! ```

use crate::config::{DuplicatePolicy, WriterConfig};
use crate::index_builder::{BagIndexBuilder, DescriptorSource, IndexOptions};
use prost::Name;
use prost_reflect::ReflectMessage;
use protobag_archive::ArchiveStore;
use protobag_core::{
    names, pb, BagIndex, Entry, Error, MessageEntry, RawEntry, Result, StampedEntry, Timestamp,
    TypedBytes,
};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, trace, warn};

/// Writes entries into a new bag
pub struct BagWriter {
    store: Box<dyn ArchiveStore>,
    config: WriterConfig,
    index: BagIndexBuilder,
    /// Every name stored this session
    written: HashSet<String>,
    /// Next collision counter per stamped `(topic, timestamp)`
    next_collision: HashMap<(String, Timestamp), u32>,
    entries_written: u64,
    closed: bool,
}

impl std::fmt::Debug for BagWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BagWriter")
            .field("store", &self.store.describe())
            .field("entries_written", &self.entries_written)
            .field("closed", &self.closed)
            .finish()
    }
}

impl BagWriter {
    /// Open the archive described by `config` and start a session
    pub fn create(config: WriterConfig) -> Result<Self> {
        config.validate()?;
        let store = protobag_archive::open(&config.archive)?;
        Self::with_store(store, config)
    }

    /// Start a session on an already-open store
    ///
    /// `config.archive` is ignored; the store is used as given.
    pub fn with_store(store: Box<dyn ArchiveStore>, config: WriterConfig) -> Result<Self> {
        let index = BagIndexBuilder::new(IndexOptions {
            save_timeseries_index: config.save_timeseries_index,
            save_descriptor_index: config.save_descriptor_index,
            bag_namespace: config.bag_namespace.clone(),
        });
        info!(target: "protobag::writer", store = %store.describe(), policy = ?config.duplicate_policy, "Opened bag for writing");
        Ok(BagWriter {
            store,
            config,
            index,
            written: HashSet::new(),
            next_collision: HashMap::new(),
            entries_written: 0,
            closed: false,
        })
    }

    /// Number of user entries written so far
    pub fn entries_written(&self) -> u64 {
        self.entries_written
    }

    /// Whether [`close`](Self::close) has been called
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Configuration this writer was opened with
    pub fn config(&self) -> &WriterConfig {
        &self.config
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Store `payload` verbatim
    pub fn write_raw(&mut self, entry_name: &str, payload: &[u8]) -> Result<String> {
        let entry_name = self.claim_name(entry_name)?;
        let entry = Entry::Raw(RawEntry {
            entry_name,
            payload: payload.to_vec(),
        });
        self.write_entry(entry, DescriptorSource::None)
    }

    /// Store one serialized message
    ///
    /// `descriptors` is a serialized `FileDescriptorSet` holding the type's
    /// closure; it only needs to be supplied the first time `type_url` is
    /// written. An empty `type_url` stores the payload as a raw entry.
    pub fn write_message(
        &mut self,
        entry_name: &str,
        type_url: &str,
        payload: &[u8],
        descriptors: Option<&[u8]>,
    ) -> Result<String> {
        if type_url.is_empty() {
            return self.write_raw(entry_name, payload);
        }
        let entry_name = self.claim_name(entry_name)?;
        let entry = Entry::Message(MessageEntry {
            entry_name,
            msg: TypedBytes::new(type_url, payload.to_vec()),
        });
        self.write_entry(entry, encoded_source(descriptors))
    }

    /// Store one serialized message on `topic` at `(seconds, nanos)`
    ///
    /// Returns the generated entry name.
    pub fn write_stamped(
        &mut self,
        topic: &str,
        seconds: i64,
        nanos: i32,
        type_url: &str,
        payload: &[u8],
        descriptors: Option<&[u8]>,
    ) -> Result<String> {
        let timestamp = Timestamp::new(seconds, nanos)?;
        self.stamped(
            topic,
            timestamp,
            TypedBytes::new(type_url, payload.to_vec()),
            encoded_source(descriptors),
        )
    }

    /// Store a message, deriving its type URL and descriptors
    pub fn write_message_typed<M: ReflectMessage>(&mut self, entry_name: &str, msg: &M) -> Result<String> {
        let descriptor = msg.descriptor();
        let entry_name = self.claim_name(entry_name)?;
        let entry = Entry::Message(MessageEntry {
            entry_name,
            msg: TypedBytes::new(names::type_url_for(descriptor.full_name()), msg.encode_to_vec()),
        });
        self.write_entry(entry, DescriptorSource::Descriptor(&descriptor))
    }

    /// Store a message on `topic` at `timestamp`, deriving its type URL and descriptors
    pub fn write_stamped_typed<M: ReflectMessage>(
        &mut self,
        topic: &str,
        timestamp: Timestamp,
        msg: &M,
    ) -> Result<String> {
        let descriptor = msg.descriptor();
        self.stamped(
            topic,
            timestamp,
            TypedBytes::new(names::type_url_for(descriptor.full_name()), msg.encode_to_vec()),
            DescriptorSource::Descriptor(&descriptor),
        )
    }

    fn stamped(
        &mut self,
        topic: &str,
        timestamp: Timestamp,
        msg: TypedBytes,
        descriptors: DescriptorSource<'_>,
    ) -> Result<String> {
        self.ensure_open()?;
        let topic = names::canonical(topic);
        if names::is_reserved(&topic) {
            return Err(Error::ReservedName(topic));
        }
        let entry_name = self.stamped_name(&topic, timestamp);
        let entry = Entry::Stamped(StampedEntry {
            entry_name,
            topic,
            timestamp,
            msg,
        });
        self.write_entry(entry, descriptors)
    }

    fn write_entry(&mut self, entry: Entry, descriptors: DescriptorSource<'_>) -> Result<String> {
        self.index.observe(&entry, descriptors)?;
        self.store.put(entry.entry_name(), &entry.to_archive_bytes())?;
        self.written.insert(entry.entry_name().to_string());
        self.entries_written += 1;
        trace!(target: "protobag::writer", entry = entry.entry_name(), type_url = entry.type_url(), bytes = entry.payload().len(), "Wrote entry");
        Ok(entry.entry_name().to_string())
    }

    // =========================================================================
    // Names
    // =========================================================================

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(Error::session(format!(
                "write to closed bag ({})",
                self.store.describe()
            )));
        }
        Ok(())
    }

    /// Canonicalize a caller-chosen name and apply the duplicate policy
    fn claim_name(&mut self, entry_name: &str) -> Result<String> {
        self.ensure_open()?;
        let name = protobag_archive::entry_key(entry_name)?;
        if names::is_reserved(&name) {
            return Err(Error::ReservedName(name));
        }
        let taken = self.written.contains(&name) || self.store.contains(&name);
        if taken {
            match self.config.duplicate_policy {
                DuplicatePolicy::Error => return Err(Error::DuplicateEntry(name)),
                DuplicatePolicy::Overwrite => {
                    debug!(target: "protobag::writer", entry = %name, "Overwriting entry");
                }
            }
        }
        Ok(name)
    }

    /// First free stamped name for `(topic, timestamp)`
    fn stamped_name(&mut self, topic: &str, timestamp: Timestamp) -> String {
        let counter = self
            .next_collision
            .entry((topic.to_string(), timestamp))
            .or_insert(0);
        loop {
            let name = names::stamped_entry_name(topic, timestamp, *counter);
            *counter += 1;
            if !self.written.contains(&name) && !self.store.contains(&name) {
                return name;
            }
        }
    }

    // =========================================================================
    // Close
    // =========================================================================

    /// Finalize and store the index, then seal the archive
    ///
    /// The writer is unusable afterwards, even if closing fails.
    pub fn close(&mut self) -> Result<BagIndex> {
        self.ensure_open()?;
        self.closed = true;

        let index = self.index.finalize()?;
        if self.config.writes_index() {
            let timestamp = Timestamp::now();
            let entry = Entry::Stamped(StampedEntry {
                entry_name: self.stamped_name(names::BAG_INDEX_TOPIC, timestamp),
                topic: names::BAG_INDEX_TOPIC.to_string(),
                timestamp,
                msg: TypedBytes::new(
                    names::type_url_for(&pb::BagIndex::full_name()),
                    index.encode_to_vec(),
                ),
            });
            self.store.put(entry.entry_name(), &entry.to_archive_bytes())?;
            debug!(target: "protobag::writer", entry = entry.entry_name(), bytes = entry.payload().len(), "Stored bag index");
        }
        self.store.finish()?;

        info!(
            target: "protobag::writer",
            store = %self.store.describe(),
            entries = self.entries_written,
            topics = index.topic_stats.len(),
            types = index.descriptor_pool.len(),
            "Closed bag"
        );
        Ok(index)
    }
}

impl Drop for BagWriter {
    fn drop(&mut self) {
        if !self.closed {
            if let Err(e) = self.close() {
                warn!(target: "protobag::writer", store = %self.store.describe(), error = %e, "Failed to close bag on drop");
            }
        }
    }
}

fn encoded_source(descriptors: Option<&[u8]>) -> DescriptorSource<'_> {
    match descriptors {
        Some(bytes) => DescriptorSource::Encoded(bytes),
        None => DescriptorSource::None,
    }
}
