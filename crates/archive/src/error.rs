//! Archive error types

use crate::config::ConfigError;
use std::io;
use thiserror::Error;

/// Errors raised by archive backends
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// Named blob does not exist
    #[error("Entry not found: {0}")]
    NotFound(String),

    /// Entry name cannot be stored by this backend
    #[error("Invalid entry name '{name}': {reason}")]
    InvalidName {
        /// The rejected name
        name: String,
        /// Why it was rejected
        reason: String,
    },

    /// Write issued against an archive opened for reading
    #[error("Archive is read-only: {0}")]
    ReadOnly(String),

    /// Read issued against a write-only (streaming) archive
    #[error("Archive is write-only: {0}")]
    WriteOnly(String),

    /// Archive has already been finished
    #[error("Archive already finished: {0}")]
    Finished(String),

    /// Archive operation failed
    #[error("Archive error: {0}")]
    Archive(String),

    /// Compression/decompression failed
    #[error("Compression error: {0}")]
    Compression(String),

    /// Archive spec failed validation
    #[error("Invalid archive spec: {0}")]
    InvalidSpec(#[from] ConfigError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl ArchiveError {
    /// Create an archive error
    pub fn archive(msg: impl Into<String>) -> Self {
        Self::Archive(msg.into())
    }

    /// Create a compression error
    pub fn compression(msg: impl Into<String>) -> Self {
        Self::Compression(msg.into())
    }

    /// Create a not-found error
    pub fn not_found(name: impl Into<String>) -> Self {
        Self::NotFound(name.into())
    }

    /// Create an invalid-name error
    pub fn invalid_name(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidName {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

/// Result type for archive operations
pub type ArchiveResult<T> = Result<T, ArchiveError>;

impl From<ArchiveError> for protobag_core::Error {
    fn from(e: ArchiveError) -> Self {
        match e {
            ArchiveError::NotFound(name) => protobag_core::Error::NotFound(name),
            ArchiveError::Io(io) => protobag_core::Error::Io(io),
            other => protobag_core::Error::Archive(other.to_string()),
        }
    }
}
