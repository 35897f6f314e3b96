//! Entry model
//!
//! An archive holds three kinds of entries:
//!
//! - `Raw`: opaque bytes, stored verbatim
//! - `Message`: one typed protobuf message, stored as `google.protobuf.Any`
//! - `Stamped`: a typed message on a topic at a timestamp, stored as an `Any`
//!   wrapping `protobag.StampedMessage`
//!
//! ## Archive Encoding
//!
//! ```text
//! Raw      payload bytes
//! Message  Any { type_url, value = payload }
//! Stamped  Any { type_url = type.googleapis.com/protobag.StampedMessage,
//!                value = StampedMessage { timestamp, msg = Any { type_url, value = payload } } }
//! ```

use crate::error::{Error, Result};
use crate::names;
use crate::pb;
use crate::timestamp::Timestamp;
use prost::{Message, Name};
use prost_types::Any;

/// Type URL of the stamped envelope
pub fn stamped_type_url() -> String {
    names::type_url_for(&pb::StampedMessage::full_name())
}

// =============================================================================
// TypedBytes
// =============================================================================

/// Serialized message plus the type URL needed to decode it
///
/// An empty `type_url` marks a payload that cannot be decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypedBytes {
    /// Type URL, empty for raw payloads
    pub type_url: String,
    /// Entry this message was read from, if any
    pub entry_name: Option<String>,
    /// Serialized message bytes
    pub payload: Vec<u8>,
}

impl TypedBytes {
    /// Create typed bytes without an owning entry
    pub fn new(type_url: impl Into<String>, payload: Vec<u8>) -> Self {
        TypedBytes {
            type_url: type_url.into(),
            entry_name: None,
            payload,
        }
    }

    /// Attach the owning entry name
    pub fn with_entry_name(mut self, entry_name: impl Into<String>) -> Self {
        self.entry_name = Some(entry_name.into());
        self
    }

    /// True if there is no type URL to decode with
    pub fn is_raw(&self) -> bool {
        self.type_url.is_empty()
    }

    /// Wrap as `google.protobuf.Any`
    pub fn to_any(&self) -> Any {
        Any {
            type_url: self.type_url.clone(),
            value: self.payload.clone(),
        }
    }

    fn from_any(any: Any, entry_name: &str) -> Self {
        TypedBytes {
            type_url: any.type_url,
            entry_name: Some(entry_name.to_string()),
            payload: any.value,
        }
    }
}

// =============================================================================
// Entry variants
// =============================================================================

/// Opaque bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEntry {
    /// Entry name
    pub entry_name: String,
    /// Bytes as stored
    pub payload: Vec<u8>,
}

/// A single typed message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageEntry {
    /// Entry name
    pub entry_name: String,
    /// Message
    pub msg: TypedBytes,
}

/// A typed message on a topic at a point in time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StampedEntry {
    /// Entry name
    pub entry_name: String,
    /// Topic
    pub topic: String,
    /// Timestamp
    pub timestamp: Timestamp,
    /// Message
    pub msg: TypedBytes,
}

/// One named unit of data in an archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    /// Opaque bytes
    Raw(RawEntry),
    /// Single typed message
    Message(MessageEntry),
    /// Time-stamped message on a topic
    Stamped(StampedEntry),
}

impl Entry {
    /// Entry name
    pub fn entry_name(&self) -> &str {
        match self {
            Entry::Raw(e) => &e.entry_name,
            Entry::Message(e) => &e.entry_name,
            Entry::Stamped(e) => &e.entry_name,
        }
    }

    /// Type URL, empty for raw entries
    pub fn type_url(&self) -> &str {
        match self.typed() {
            Some(msg) => &msg.type_url,
            None => "",
        }
    }

    /// Serialized message (or raw) bytes
    pub fn payload(&self) -> &[u8] {
        match self {
            Entry::Raw(e) => &e.payload,
            Entry::Message(e) => &e.msg.payload,
            Entry::Stamped(e) => &e.msg.payload,
        }
    }

    /// Typed message, if this is not a raw entry
    pub fn typed(&self) -> Option<&TypedBytes> {
        match self {
            Entry::Raw(_) => None,
            Entry::Message(e) => Some(&e.msg),
            Entry::Stamped(e) => Some(&e.msg),
        }
    }

    /// Topic and timestamp of a stamped entry
    pub fn topic_time(&self) -> Option<(&str, Timestamp)> {
        match self {
            Entry::Stamped(e) => Some((&e.topic, e.timestamp)),
            _ => None,
        }
    }

    /// True for raw entries
    pub fn is_raw(&self) -> bool {
        matches!(self, Entry::Raw(_))
    }

    /// The stamped variant, if any
    pub fn as_stamped(&self) -> Option<&StampedEntry> {
        match self {
            Entry::Stamped(e) => Some(e),
            _ => None,
        }
    }

    /// Convert into the stamped variant, if any
    pub fn into_stamped(self) -> Option<StampedEntry> {
        match self {
            Entry::Stamped(e) => Some(e),
            _ => None,
        }
    }

    // =========================================================================
    // Archive encoding
    // =========================================================================

    /// Encode as stored in the archive
    pub fn to_archive_bytes(&self) -> Vec<u8> {
        match self {
            Entry::Raw(e) => e.payload.clone(),
            Entry::Message(e) => e.msg.to_any().encode_to_vec(),
            Entry::Stamped(e) => {
                let stamped = pb::StampedMessage {
                    timestamp: Some(e.timestamp.into()),
                    msg: Some(e.msg.to_any()),
                };
                Any {
                    type_url: stamped_type_url(),
                    value: stamped.encode_to_vec(),
                }
                .encode_to_vec()
            }
        }
    }

    /// Decode bytes read from the archive
    ///
    /// With `raw` set the bytes are returned verbatim. Otherwise the `Any`
    /// envelope is sniffed: bytes that do not parse as `Any`, or an `Any`
    /// with an empty type URL, are treated as raw.
    pub fn from_archive_bytes(entry_name: &str, bytes: Vec<u8>, raw: bool) -> Result<Entry> {
        let raw_entry = |payload| {
            Entry::Raw(RawEntry {
                entry_name: entry_name.to_string(),
                payload,
            })
        };
        if raw {
            return Ok(raw_entry(bytes));
        }

        let any = match Any::decode(bytes.as_slice()) {
            Ok(any) if !any.type_url.is_empty() => any,
            _ => return Ok(raw_entry(bytes)),
        };

        if any.type_url != stamped_type_url() {
            return Ok(Entry::Message(MessageEntry {
                entry_name: entry_name.to_string(),
                msg: TypedBytes::from_any(any, entry_name),
            }));
        }

        let stamped = pb::StampedMessage::decode(any.value.as_slice())?;
        let timestamp = stamped
            .timestamp
            .ok_or_else(|| Error::corrupt(format!("stamped entry {} has no timestamp", entry_name)))?;
        let msg = stamped
            .msg
            .ok_or_else(|| Error::corrupt(format!("stamped entry {} has no message", entry_name)))?;
        Ok(Entry::Stamped(StampedEntry {
            entry_name: entry_name.to_string(),
            topic: names::topic_of(entry_name),
            timestamp: Timestamp::try_from(timestamp)?,
            msg: TypedBytes::from_any(msg, entry_name),
        }))
    }
}
