//! Protobuf wire messages of the bag format
//!
//! These are the `protobag.*` messages persisted inside archives. They are
//! declared with `prost` derives; the field numbers are part of the on-disk
//! format and must never change.
//!
//! Domain code works with the types in [`crate::index`], [`crate::selection`]
//! and [`crate::entry`]; this module is only the serialized form.

#![allow(missing_docs)]

use prost_types::{Any, FileDescriptorSet, Timestamp};
use std::collections::BTreeMap;

/// Package of every message in this module
pub const PACKAGE: &str = "protobag";

/// Envelope of a stamped entry
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct StampedMessage {
    #[prost(message, optional, tag = "1")]
    pub timestamp: Option<Timestamp>,
    #[prost(message, optional, tag = "2")]
    pub msg: Option<Any>,
}

/// One (topic, timestamp, entry name) triple
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TopicTime {
    #[prost(string, tag = "1")]
    pub topic: String,
    #[prost(message, optional, tag = "2")]
    pub timestamp: Option<Timestamp>,
    #[prost(string, tag = "10")]
    pub entryname: String,
}

/// Per-topic statistics
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TopicStats {
    #[prost(uint64, tag = "1")]
    pub n_messages: u64,
}

/// Descriptor closures plus entry schema pins
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DescriptorPoolData {
    #[prost(btree_map = "string, message", tag = "1")]
    pub type_url_to_descriptor: BTreeMap<String, FileDescriptorSet>,
    #[prost(btree_map = "string, string", tag = "2")]
    pub entryname_to_type_url: BTreeMap<String, String>,
}

/// The persisted bag index
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct BagIndex {
    #[prost(string, tag = "1")]
    pub bag_namespace: String,
    #[prost(message, optional, tag = "2")]
    pub start: Option<Timestamp>,
    #[prost(message, optional, tag = "3")]
    pub end: Option<Timestamp>,
    #[prost(string, tag = "4")]
    pub protobag_version: String,
    #[prost(btree_map = "string, message", tag = "5")]
    pub topic_to_stats: BTreeMap<String, TopicStats>,
    #[prost(message, repeated, tag = "6")]
    pub time_ordered_entries: Vec<TopicTime>,
    #[prost(message, optional, tag = "7")]
    pub descriptor_pool_data: Option<DescriptorPoolData>,
}

/// [`BagIndex`] without the descriptor pool
///
/// Decoding the index bytes as this message skips field 7 entirely, so the
/// (possibly large) descriptor sets are never materialized.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct BagIndexSummary {
    #[prost(string, tag = "1")]
    pub bag_namespace: String,
    #[prost(message, optional, tag = "2")]
    pub start: Option<Timestamp>,
    #[prost(message, optional, tag = "3")]
    pub end: Option<Timestamp>,
    #[prost(string, tag = "4")]
    pub protobag_version: String,
    #[prost(btree_map = "string, message", tag = "5")]
    pub topic_to_stats: BTreeMap<String, TopicStats>,
}

/// Declarative query over a bag
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Selection {
    #[prost(oneof = "selection::Criteria", tags = "1, 2, 3, 4")]
    pub criteria: Option<selection::Criteria>,
}

/// Nested messages of [`Selection`]
pub mod selection {
    use super::{Timestamp, TopicTime};

    /// Which entries to select
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Criteria {
        #[prost(message, tag = "1")]
        Window(Window),
        #[prost(message, tag = "2")]
        Events(Events),
        #[prost(message, tag = "3")]
        SelectAll(SelectAll),
        #[prost(message, tag = "4")]
        Entrynames(Entrynames),
    }

    /// Topic/time window
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Window {
        #[prost(string, repeated, tag = "1")]
        pub topics: Vec<String>,
        #[prost(message, optional, tag = "2")]
        pub start: Option<Timestamp>,
        #[prost(message, optional, tag = "3")]
        pub end: Option<Timestamp>,
        #[prost(string, repeated, tag = "4")]
        pub exclude_topics: Vec<String>,
    }

    /// Explicit event list
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Events {
        #[prost(message, repeated, tag = "1")]
        pub events: Vec<TopicTime>,
        #[prost(bool, tag = "2")]
        pub require_all: bool,
    }

    /// Every entry
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct SelectAll {
        #[prost(bool, tag = "1")]
        pub all_entries_are_raw: bool,
    }

    /// Named entries
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Entrynames {
        #[prost(string, repeated, tag = "1")]
        pub entrynames: Vec<String>,
        #[prost(bool, tag = "2")]
        pub ignore_missing_entries: bool,
        #[prost(bool, tag = "3")]
        pub entries_are_raw: bool,
    }
}

/// Single-value wrapper messages for recording scalars without a schema
pub mod std_msg {
    /// `protobag.StdMsg.Bool`
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct BoolValue {
        #[prost(bool, tag = "1")]
        pub value: bool,
    }

    /// `protobag.StdMsg.Int`
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct IntValue {
        #[prost(int64, tag = "1")]
        pub value: i64,
    }

    /// `protobag.StdMsg.Float`
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct FloatValue {
        #[prost(float, tag = "1")]
        pub value: f32,
    }

    /// `protobag.StdMsg.String`
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct StringValue {
        #[prost(string, tag = "1")]
        pub value: String,
    }

    /// `protobag.StdMsg.Bytes`
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct BytesValue {
        #[prost(bytes = "vec", tag = "1")]
        pub value: Vec<u8>,
    }
}

macro_rules! impl_name {
    ($($ty:ty => $name:literal),* $(,)?) => {
        $(
            impl ::prost::Name for $ty {
                const NAME: &'static str = $name;
                const PACKAGE: &'static str = PACKAGE;
            }
        )*
    };
}

impl_name! {
    StampedMessage => "StampedMessage",
    TopicTime => "TopicTime",
    TopicStats => "TopicStats",
    DescriptorPoolData => "DescriptorPoolData",
    BagIndex => "BagIndex",
    Selection => "Selection",
    std_msg::BoolValue => "StdMsg.Bool",
    std_msg::IntValue => "StdMsg.Int",
    std_msg::FloatValue => "StdMsg.Float",
    std_msg::StringValue => "StdMsg.String",
    std_msg::BytesValue => "StdMsg.Bytes",
}
