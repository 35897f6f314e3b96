//! Bag index domain types
//!
//! The index is written once, when a writer closes, and read wholesale by
//! readers. It answers:
//!
//! - which topics exist and how many messages each holds
//! - which stamped entries exist, in timestamp order
//! - which descriptor files decode each type URL
//! - which type URL each entry was written with

use crate::closure::DescriptorClosure;
use crate::error::{Error, Result};
use crate::pb;
use crate::timestamp::Timestamp;
use prost::Message;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Closed interval of timestamps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    /// Earliest timestamp
    pub start: Timestamp,
    /// Latest timestamp
    pub end: Timestamp,
}

impl TimeRange {
    /// Range covering a single instant
    pub fn instant(ts: Timestamp) -> Self {
        TimeRange { start: ts, end: ts }
    }

    /// Widen to include `ts`
    pub fn extend(&mut self, ts: Timestamp) {
        if ts < self.start {
            self.start = ts;
        }
        if ts > self.end {
            self.end = ts;
        }
    }

    /// Whether `ts` lies inside the range
    pub fn contains(&self, ts: Timestamp) -> bool {
        self.start <= ts && ts <= self.end
    }
}

/// Per-topic statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicStats {
    /// Number of stamped messages on the topic
    pub message_count: u64,
}

/// One stamped entry in the time-ordered list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicTime {
    /// Topic
    pub topic: String,
    /// Timestamp
    pub timestamp: Timestamp,
    /// Entry name
    pub entry_name: String,
}

impl TopicTime {
    pub(crate) fn to_proto(&self) -> pb::TopicTime {
        pb::TopicTime {
            topic: self.topic.clone(),
            timestamp: Some(self.timestamp.into()),
            entryname: self.entry_name.clone(),
        }
    }

    pub(crate) fn from_proto(tt: pb::TopicTime) -> Result<Self> {
        let timestamp = tt
            .timestamp
            .ok_or_else(|| Error::corrupt(format!("index entry {} has no timestamp", tt.entryname)))?;
        Ok(TopicTime {
            topic: tt.topic,
            timestamp: Timestamp::try_from(timestamp)?,
            entry_name: tt.entryname,
        })
    }
}

// =============================================================================
// BagIndex
// =============================================================================

/// The persisted index of a bag
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BagIndex {
    /// Namespace chosen by the writer
    pub bag_namespace: String,
    /// Version of the library that wrote the bag
    pub protobag_version: String,
    /// Min/max timestamp over all stamped entries, if any
    pub time_range: Option<TimeRange>,
    /// Statistics per topic
    pub topic_stats: BTreeMap<String, TopicStats>,
    /// Stamped entries sorted by timestamp, ties in write order
    pub time_ordered_entries: Vec<TopicTime>,
    /// Descriptor closure per type URL
    pub descriptor_pool: BTreeMap<String, DescriptorClosure>,
    /// Type URL each entry was written with (empty for raw)
    pub entry_name_to_type_url: BTreeMap<String, String>,
}

impl BagIndex {
    /// Topics with at least one stamped message
    pub fn topics(&self) -> impl Iterator<Item = &str> {
        self.topic_stats.keys().map(String::as_str)
    }

    /// Type URL pinned to an entry
    pub fn pinned_type_url(&self, entry_name: &str) -> Option<&str> {
        self.entry_name_to_type_url.get(entry_name).map(String::as_str)
    }

    /// Convert into the wire message
    pub fn to_proto(&self) -> pb::BagIndex {
        let descriptor_pool_data = if self.descriptor_pool.is_empty()
            && self.entry_name_to_type_url.is_empty()
        {
            None
        } else {
            Some(pb::DescriptorPoolData {
                type_url_to_descriptor: self
                    .descriptor_pool
                    .iter()
                    .map(|(url, closure)| (url.clone(), closure.to_file_descriptor_set()))
                    .collect(),
                entryname_to_type_url: self.entry_name_to_type_url.clone(),
            })
        };
        pb::BagIndex {
            bag_namespace: self.bag_namespace.clone(),
            start: self.time_range.map(|r| r.start.into()),
            end: self.time_range.map(|r| r.end.into()),
            protobag_version: self.protobag_version.clone(),
            topic_to_stats: self
                .topic_stats
                .iter()
                .map(|(topic, stats)| {
                    (
                        topic.clone(),
                        pb::TopicStats {
                            n_messages: stats.message_count,
                        },
                    )
                })
                .collect(),
            time_ordered_entries: self.time_ordered_entries.iter().map(TopicTime::to_proto).collect(),
            descriptor_pool_data,
        }
    }

    /// Convert from the wire message
    pub fn from_proto(index: pb::BagIndex) -> Result<Self> {
        let pool = index.descriptor_pool_data.unwrap_or_default();
        Ok(BagIndex {
            bag_namespace: index.bag_namespace,
            protobag_version: index.protobag_version,
            time_range: time_range_from_proto(index.start, index.end)?,
            topic_stats: stats_from_proto(index.topic_to_stats),
            time_ordered_entries: index
                .time_ordered_entries
                .into_iter()
                .map(TopicTime::from_proto)
                .collect::<Result<_>>()?,
            descriptor_pool: pool
                .type_url_to_descriptor
                .into_iter()
                .map(|(url, set)| (url, DescriptorClosure::from(set)))
                .collect(),
            entry_name_to_type_url: pool.entryname_to_type_url,
        })
    }

    /// Serialize as `protobag.BagIndex`
    pub fn encode_to_vec(&self) -> Vec<u8> {
        self.to_proto().encode_to_vec()
    }

    /// Deserialize from `protobag.BagIndex` bytes
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        Self::from_proto(pb::BagIndex::decode(bytes)?)
    }

    /// Summary view of this index
    pub fn summary(&self) -> BagIndexSummary {
        BagIndexSummary {
            bag_namespace: self.bag_namespace.clone(),
            protobag_version: self.protobag_version.clone(),
            time_range: self.time_range,
            topic_stats: self.topic_stats.clone(),
        }
    }
}

// =============================================================================
// BagIndexSummary
// =============================================================================

/// Topic list and time range, without the descriptor pool
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BagIndexSummary {
    /// Namespace chosen by the writer
    pub bag_namespace: String,
    /// Version of the library that wrote the bag
    pub protobag_version: String,
    /// Min/max timestamp over all stamped entries, if any
    pub time_range: Option<TimeRange>,
    /// Statistics per topic
    pub topic_stats: BTreeMap<String, TopicStats>,
}

impl BagIndexSummary {
    /// Decode from full `protobag.BagIndex` bytes, skipping the descriptor pool
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let summary = pb::BagIndexSummary::decode(bytes)?;
        Ok(BagIndexSummary {
            bag_namespace: summary.bag_namespace,
            protobag_version: summary.protobag_version,
            time_range: time_range_from_proto(summary.start, summary.end)?,
            topic_stats: stats_from_proto(summary.topic_to_stats),
        })
    }

    /// Total stamped messages over all topics
    pub fn message_count(&self) -> u64 {
        self.topic_stats.values().map(|s| s.message_count).sum()
    }
}

fn time_range_from_proto(
    start: Option<prost_types::Timestamp>,
    end: Option<prost_types::Timestamp>,
) -> Result<Option<TimeRange>> {
    match (start, end) {
        (Some(start), Some(end)) => Ok(Some(TimeRange {
            start: Timestamp::try_from(start)?,
            end: Timestamp::try_from(end)?,
        })),
        (None, None) => Ok(None),
        _ => Err(Error::corrupt("index time range has only one bound")),
    }
}

fn stats_from_proto(stats: BTreeMap<String, pb::TopicStats>) -> BTreeMap<String, TopicStats> {
    stats
        .into_iter()
        .map(|(topic, s)| {
            (
                topic,
                TopicStats {
                    message_count: s.n_messages,
                },
            )
        })
        .collect()
}
