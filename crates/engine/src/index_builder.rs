//! Incremental bag index construction
//!
//! The writer hands every entry to [`BagIndexBuilder::observe`] in write
//! order. The builder accumulates:
//!
//! - per-topic message counts and the overall time range
//! - `(topic, timestamp, entry_name)` for every stamped entry
//! - one descriptor closure per distinct type URL
//! - the type URL each entry was written with
//!
//! [`BagIndexBuilder::finalize`] sorts the time-ordered list (stable, so
//! equal timestamps keep write order) and produces the [`BagIndex`].

use crate::descriptors;
use prost_reflect::MessageDescriptor;
use protobag_core::{
    BagIndex, DescriptorClosure, Entry, Error, Result, TimeRange, TopicStats, TopicTime,
    PROTOBAG_VERSION,
};
use std::collections::BTreeMap;
use tracing::{debug, trace};

/// Where the descriptors of an observed entry's type come from
#[derive(Debug, Clone)]
pub enum DescriptorSource<'a> {
    /// Nothing supplied; fine for types already seen
    None,
    /// Serialized `FileDescriptorSet`
    Encoded(&'a [u8]),
    /// Pre-built closure
    Closure(DescriptorClosure),
    /// Live descriptor; the closure is collected only on first sight
    Descriptor(&'a MessageDescriptor),
}

/// Which parts of the index to record
#[derive(Debug, Clone)]
pub struct IndexOptions {
    /// Record topic stats, time range and the time-ordered list
    pub save_timeseries_index: bool,
    /// Record descriptor closures and entry type pins
    pub save_descriptor_index: bool,
    /// Namespace written into the index
    pub bag_namespace: String,
}

impl Default for IndexOptions {
    fn default() -> Self {
        IndexOptions {
            save_timeseries_index: true,
            save_descriptor_index: true,
            bag_namespace: String::new(),
        }
    }
}

/// Accumulates a [`BagIndex`] while a bag is written
#[derive(Debug)]
pub struct BagIndexBuilder {
    options: IndexOptions,
    time_range: Option<TimeRange>,
    topic_stats: BTreeMap<String, TopicStats>,
    /// Write order; sorted on finalize
    time_entries: Vec<TopicTime>,
    descriptor_pool: BTreeMap<String, DescriptorClosure>,
    entry_types: BTreeMap<String, String>,
    observed: u64,
    finalized: bool,
}

impl BagIndexBuilder {
    /// Create a builder
    pub fn new(options: IndexOptions) -> Self {
        BagIndexBuilder {
            options,
            time_range: None,
            topic_stats: BTreeMap::new(),
            time_entries: Vec::new(),
            descriptor_pool: BTreeMap::new(),
            entry_types: BTreeMap::new(),
            observed: 0,
            finalized: false,
        }
    }

    /// Record one written entry
    pub fn observe(&mut self, entry: &Entry, descriptors: DescriptorSource<'_>) -> Result<()> {
        if self.finalized {
            return Err(Error::session(format!(
                "observe({}) after index was finalized",
                entry.entry_name()
            )));
        }
        self.observed += 1;

        if self.options.save_timeseries_index {
            if let Some((topic, timestamp)) = entry.topic_time() {
                self.topic_stats
                    .entry(topic.to_string())
                    .or_default()
                    .message_count += 1;
                match &mut self.time_range {
                    Some(range) => range.extend(timestamp),
                    None => self.time_range = Some(TimeRange::instant(timestamp)),
                }
                self.time_entries.push(TopicTime {
                    topic: topic.to_string(),
                    timestamp,
                    entry_name: entry.entry_name().to_string(),
                });
            }
        }

        if self.options.save_descriptor_index {
            let type_url = entry.type_url();
            self.entry_types
                .insert(entry.entry_name().to_string(), type_url.to_string());
            if !type_url.is_empty() && !self.descriptor_pool.contains_key(type_url) {
                self.record_descriptors(type_url, descriptors)?;
            }
        }

        trace!(target: "protobag::index", entry = entry.entry_name(), type_url = entry.type_url(), "Observed entry");
        Ok(())
    }

    fn record_descriptors(&mut self, type_url: &str, source: DescriptorSource<'_>) -> Result<()> {
        let closure = match source {
            DescriptorSource::None => {
                debug!(target: "protobag::index", type_url, "No descriptors supplied for new type");
                return Ok(());
            }
            DescriptorSource::Encoded(bytes) => DescriptorClosure::decode(bytes)?,
            DescriptorSource::Closure(closure) => closure,
            DescriptorSource::Descriptor(descriptor) => descriptors::collect(descriptor),
        };
        if closure.is_empty() {
            debug!(target: "protobag::index", type_url, "Ignoring empty descriptor closure");
            return Ok(());
        }
        debug!(target: "protobag::index", type_url, files = closure.len(), "Recorded descriptor closure");
        self.descriptor_pool.insert(type_url.to_string(), closure);
        Ok(())
    }

    /// Whether a closure is already recorded for `type_url`
    pub fn has_descriptors(&self, type_url: &str) -> bool {
        self.descriptor_pool.contains_key(type_url)
    }

    /// Number of entries observed so far
    pub fn observed_count(&self) -> u64 {
        self.observed
    }

    /// Whether [`finalize`](Self::finalize) has been called
    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Produce the index; may be called once
    pub fn finalize(&mut self) -> Result<BagIndex> {
        if self.finalized {
            return Err(Error::session("index already finalized"));
        }
        self.finalized = true;

        let mut time_ordered_entries = std::mem::take(&mut self.time_entries);
        time_ordered_entries.sort_by_key(|tt| tt.timestamp);

        debug!(
            target: "protobag::index",
            entries = self.observed,
            stamped = time_ordered_entries.len(),
            types = self.descriptor_pool.len(),
            "Finalized bag index"
        );

        Ok(BagIndex {
            bag_namespace: self.options.bag_namespace.clone(),
            protobag_version: PROTOBAG_VERSION.to_string(),
            time_range: self.time_range,
            topic_stats: std::mem::take(&mut self.topic_stats),
            time_ordered_entries,
            descriptor_pool: std::mem::take(&mut self.descriptor_pool),
            entry_name_to_type_url: std::mem::take(&mut self.entry_types),
        })
    }
}
