//! Error types for protobag
//!
//! This module defines the error taxonomy shared by the writer, reader,
//! decoder and time-sync layers. We use `thiserror` for automatic `Display`
//! and `Error` trait implementations.
//!
//! Nothing in the core retries: every variant is terminal for the operation
//! that produced it. Lookups (`NotFound`) only fail the single lookup, while
//! `SessionState` indicates a programmer error against a closed session.

use std::io;
use thiserror::Error;

/// Result type alias for protobag operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for protobag
#[derive(Debug, Error)]
pub enum Error {
    /// Requested entry name, event or type URL is absent
    #[error("Not found: {0}")]
    NotFound(String),

    /// No static or dynamic decoder could be resolved for a type URL
    #[error("Cannot decode type '{type_url}'{}", fmt_entry(.entry_name))]
    Decode {
        /// The type URL that could not be decoded
        type_url: String,
        /// Owning entry, when known
        entry_name: Option<String>,
    },

    /// Pinned entry schema disagrees with the caller-supplied type URL
    #[error("Schema conflict for entry '{entry_name}': pinned '{pinned}', got '{requested}'")]
    SchemaConflict {
        /// Entry whose schema is pinned
        entry_name: String,
        /// Type URL recorded in the index
        pinned: String,
        /// Type URL supplied with the message
        requested: String,
    },

    /// Operation issued against a session in the wrong state
    #[error("Session state error: {0}")]
    SessionState(String),

    /// Backing archive is unreadable, truncated, or missing its index
    #[error("Corrupt archive: {0}")]
    CorruptArchive(String),

    /// Entry name already written in this archive
    #[error("Duplicate entry: {0}")]
    DuplicateEntry(String),

    /// Entry name lies in the reserved index namespace
    #[error("Reserved entry name: {0}")]
    ReservedName(String),

    /// Configuration failed validation
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Selection could not be interpreted
    #[error("Invalid selection: {0}")]
    InvalidSelection(String),

    /// Timestamp outside the protobuf range (nanos must be in [0, 1e9))
    #[error("Invalid timestamp: {seconds}s {nanos}ns")]
    InvalidTimestamp {
        /// Seconds component
        seconds: i64,
        /// Nanoseconds component
        nanos: i32,
    },

    /// Archive backend failure
    #[error("Archive error: {0}")]
    Archive(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Protobuf wire decoding error
    #[error("Protobuf decode error: {0}")]
    Protobuf(#[from] prost::DecodeError),

    /// Descriptor could not be added to a pool or located in it
    #[error("Descriptor error: {0}")]
    Descriptor(String),
}

fn fmt_entry(entry_name: &Option<String>) -> String {
    match entry_name {
        Some(name) => format!(" (entry '{}')", name),
        None => String::new(),
    }
}

impl Error {
    /// Create a not-found error
    pub fn not_found(what: impl Into<String>) -> Self {
        Error::NotFound(what.into())
    }

    /// Create a decode error for a type URL
    pub fn decode(type_url: impl Into<String>, entry_name: Option<&str>) -> Self {
        Error::Decode {
            type_url: type_url.into(),
            entry_name: entry_name.map(str::to_string),
        }
    }

    /// Create a session state error
    pub fn session(msg: impl Into<String>) -> Self {
        Error::SessionState(msg.into())
    }

    /// Create a corrupt-archive error
    pub fn corrupt(msg: impl Into<String>) -> Self {
        Error::CorruptArchive(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Create an invalid-selection error
    pub fn invalid_selection(msg: impl Into<String>) -> Self {
        Error::InvalidSelection(msg.into())
    }

    /// Create a descriptor error
    pub fn descriptor(msg: impl Into<String>) -> Self {
        Error::Descriptor(msg.into())
    }

    /// Whether this error only failed a single lookup
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}
