//! Writer and reader configuration
//!
//! Both configs wrap an [`ArchiveSpec`] and add session-level switches.
//! They can be built in code with the `with_*` builders or loaded from a
//! TOML file:
//!
//! ```toml
//! duplicate_policy = "error"
//! save_timeseries_index = true
//! save_descriptor_index = true
//! bag_namespace = "run_42"
//!
//! [archive]
//! mode = "write"
//! path = "/data/run_42.tar.zst"
//! format = "tar_zstd"
//! compression_level = 3
//! ```

use protobag_archive::{ArchiveFormat, ArchiveMode, ArchiveSpec, ConfigError};
use protobag_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// What to do when an entry name is written twice
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Reject the second write with `DuplicateEntry`
    #[default]
    Error,
    /// Replace the stored blob; the index keeps both observations
    Overwrite,
}

fn default_true() -> bool {
    true
}

/// Configuration for [`BagWriter`](crate::BagWriter)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WriterConfig {
    /// Behaviour on repeated entry names
    #[serde(default)]
    pub duplicate_policy: DuplicatePolicy,
    /// Record topic stats, time range and time-ordered entries
    #[serde(default = "default_true")]
    pub save_timeseries_index: bool,
    /// Record descriptor closures and entry type pins
    #[serde(default = "default_true")]
    pub save_descriptor_index: bool,
    /// Free-form namespace stored in the index
    #[serde(default)]
    pub bag_namespace: String,
    /// Target archive; must be opened for writing
    pub archive: ArchiveSpec,
}

impl Default for WriterConfig {
    fn default() -> Self {
        WriterConfig {
            duplicate_policy: DuplicatePolicy::Error,
            save_timeseries_index: true,
            save_descriptor_index: true,
            bag_namespace: String::new(),
            archive: ArchiveSpec::memory(),
        }
    }
}

impl WriterConfig {
    /// Write a new archive at `path`, format inferred from the extension
    pub fn new(path: impl Into<PathBuf>) -> Self {
        WriterConfig {
            archive: ArchiveSpec::write(path),
            ..Default::default()
        }
    }

    /// Write to an in-memory archive
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Write a directory archive in a fresh directory under the system temp directory
    pub fn in_tempdir() -> Result<Self> {
        Ok(WriterConfig {
            archive: ArchiveSpec::write_to_tempdir()?,
            ..Default::default()
        })
    }

    /// Set the archive spec
    pub fn with_archive(mut self, archive: ArchiveSpec) -> Self {
        self.archive = archive;
        self
    }

    /// Override the container format
    pub fn with_format(mut self, format: ArchiveFormat) -> Self {
        self.archive = self.archive.with_format(format);
        self
    }

    /// Set the duplicate-name policy
    pub fn with_duplicate_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.duplicate_policy = policy;
        self
    }

    /// Toggle the time-series part of the index
    pub fn with_timeseries_index(mut self, enabled: bool) -> Self {
        self.save_timeseries_index = enabled;
        self
    }

    /// Toggle the descriptor part of the index
    pub fn with_descriptor_index(mut self, enabled: bool) -> Self {
        self.save_descriptor_index = enabled;
        self
    }

    /// Set the bag namespace
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.bag_namespace = namespace.into();
        self
    }

    /// Whether any index will be written on close
    pub fn writes_index(&self) -> bool {
        self.save_timeseries_index || self.save_descriptor_index
    }

    /// Validate configuration
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.archive.mode != ArchiveMode::Write {
            return Err(ConfigError::WrongMode {
                expected: ArchiveMode::Write,
            });
        }
        self.archive.validate()
    }

    /// Config for reading back the archive this config writes
    pub fn reader_config(&self) -> ReaderConfig {
        ReaderConfig::default().with_archive(self.archive.for_reading())
    }

    /// Parse from TOML
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: WriterConfig = toml::from_str(content)
            .map_err(|e| Error::config(format!("Failed to parse writer config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML config file
    pub fn from_file(path: &Path) -> Result<Self> {
        Self::from_toml(&read_config_file(path)?)
    }

    /// Serialize to TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| Error::config(format!("Failed to serialize writer config: {}", e)))
    }
}

/// Configuration for [`BagReader`](crate::BagReader)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReaderConfig {
    /// Register every type in the bag's descriptor index before the first decode
    #[serde(default = "default_true")]
    pub dynamic_decode: bool,
    /// Source archive; must be opened for reading
    pub archive: ArchiveSpec,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        ReaderConfig {
            dynamic_decode: true,
            archive: ArchiveSpec::default(),
        }
    }
}

impl ReaderConfig {
    /// Read the archive at `path`, format inferred from the extension
    pub fn new(path: impl Into<PathBuf>) -> Self {
        ReaderConfig {
            archive: ArchiveSpec::read(path),
            ..Default::default()
        }
    }

    /// Set the archive spec
    pub fn with_archive(mut self, archive: ArchiveSpec) -> Self {
        self.archive = archive;
        self
    }

    /// Toggle registering the bag's descriptors before the first decode
    pub fn with_dynamic_decode(mut self, enabled: bool) -> Self {
        self.dynamic_decode = enabled;
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.archive.mode != ArchiveMode::Read {
            return Err(ConfigError::WrongMode {
                expected: ArchiveMode::Read,
            });
        }
        self.archive.validate()
    }

    /// Parse from TOML
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: ReaderConfig = toml::from_str(content)
            .map_err(|e| Error::config(format!("Failed to parse reader config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML config file
    pub fn from_file(path: &Path) -> Result<Self> {
        Self::from_toml(&read_config_file(path)?)
    }
}

fn read_config_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| {
        Error::config(format!(
            "Failed to read config file '{}': {}",
            path.display(),
            e
        ))
    })
}
