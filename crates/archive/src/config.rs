//! Archive configuration
//!
//! An [`ArchiveSpec`] says where an archive lives, which container format it
//! uses and whether it is opened for reading or writing.

use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};

/// Default zstd level for `.tar.zst` archives
pub const DEFAULT_COMPRESSION_LEVEL: i32 = 3;

/// Open for reading or writing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArchiveMode {
    /// Read an existing archive
    #[default]
    Read,
    /// Create a new archive
    Write,
}

/// Container format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArchiveFormat {
    /// In-process map, nothing touches disk
    #[default]
    Memory,
    /// One file per entry under a root directory
    Directory,
    /// Uncompressed tar file
    Tar,
    /// zstd-compressed tar file
    TarZstd,
}

impl ArchiveFormat {
    /// Infer the format from a path's extension
    ///
    /// `.tar` is Tar, `.tar.zst`/`.tzst` is TarZstd, anything else is a
    /// directory.
    pub fn infer(path: &Path) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        if name.ends_with(".tar.zst") || name.ends_with(".tzst") {
            ArchiveFormat::TarZstd
        } else if name.ends_with(".tar") {
            ArchiveFormat::Tar
        } else {
            ArchiveFormat::Directory
        }
    }
}

/// Where and how to open an archive
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchiveSpec {
    /// Read or write
    pub mode: ArchiveMode,
    /// File or directory path (ignored for memory archives)
    pub path: PathBuf,
    /// Container format
    pub format: ArchiveFormat,
    /// zstd level for `TarZstd`
    pub compression_level: i32,
}

impl Default for ArchiveSpec {
    fn default() -> Self {
        ArchiveSpec {
            mode: ArchiveMode::Read,
            path: PathBuf::new(),
            format: ArchiveFormat::Memory,
            compression_level: DEFAULT_COMPRESSION_LEVEL,
        }
    }
}

impl ArchiveSpec {
    /// Read an existing archive, format inferred from the path
    pub fn read(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        ArchiveSpec {
            format: ArchiveFormat::infer(&path),
            path,
            ..Default::default()
        }
    }

    /// Create a new archive, format inferred from the path
    pub fn write(path: impl Into<PathBuf>) -> Self {
        ArchiveSpec {
            mode: ArchiveMode::Write,
            ..Self::read(path)
        }
    }

    /// Fresh in-memory archive
    pub fn memory() -> Self {
        ArchiveSpec {
            mode: ArchiveMode::Write,
            ..Default::default()
        }
    }

    /// Create a new directory archive under the system temp directory
    ///
    /// The directory is created here and is not removed afterwards.
    pub fn write_to_tempdir() -> io::Result<Self> {
        let path = tempfile::Builder::new().prefix("protobag_").tempdir()?.keep();
        Ok(ArchiveSpec {
            mode: ArchiveMode::Write,
            path,
            format: ArchiveFormat::Directory,
            ..Default::default()
        })
    }

    /// Set the container format
    pub fn with_format(mut self, format: ArchiveFormat) -> Self {
        self.format = format;
        self
    }

    /// Set the open mode
    pub fn with_mode(mut self, mode: ArchiveMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the zstd compression level
    pub fn with_compression_level(mut self, level: i32) -> Self {
        self.compression_level = level;
        self
    }

    /// Same archive, reopened for reading
    pub fn for_reading(&self) -> Self {
        self.clone().with_mode(ArchiveMode::Read)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.format != ArchiveFormat::Memory && self.path.as_os_str().is_empty() {
            return Err(ConfigError::MissingPath(self.format));
        }
        if self.format == ArchiveFormat::TarZstd && !(1..=22).contains(&self.compression_level) {
            return Err(ConfigError::InvalidCompressionLevel(self.compression_level));
        }
        Ok(())
    }
}

/// Configuration validation errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// On-disk format without a path
    #[error("{0:?} archive requires a path")]
    MissingPath(ArchiveFormat),

    /// zstd level outside 1..=22
    #[error("Invalid compression level: {0} (expected 1..=22)")]
    InvalidCompressionLevel(i32),

    /// Archive opened in the wrong mode for its user
    #[error("Archive must be opened in {expected:?} mode")]
    WrongMode {
        /// Mode the user requires
        expected: ArchiveMode,
    },
}

impl From<ConfigError> for protobag_core::Error {
    fn from(e: ConfigError) -> Self {
        protobag_core::Error::Config(e.to_string())
    }
}
