//! Named-blob storage for protobag archives
//!
//! An archive is a flat namespace of named byte blobs. This crate owns no
//! entry semantics; it only stores, fetches and enumerates blobs:
//!
//! - `ArchiveStore`: the storage trait the engine writes through
//! - `MemoryArchive`: shared in-process map
//! - `DirectoryArchive`: one file per entry
//! - `TarArchive`: `.tar` and `.tar.zst` containers
//!
//! Names are normalized to a single leading `/` by every backend, so
//! `topic/x` and `/topic/x` address the same blob and `list()` always
//! returns the normalized form.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod directory;
pub mod error;
pub mod memory;
pub mod tarball;

pub use config::{ArchiveFormat, ArchiveMode, ArchiveSpec, ConfigError};
pub use directory::DirectoryArchive;
pub use error::{ArchiveError, ArchiveResult};
pub use memory::MemoryArchive;
pub use tarball::TarArchive;

use std::fmt::Debug;
use tracing::debug;

/// Named-blob storage backend
pub trait ArchiveStore: Debug {
    /// Store `data` under `name`, replacing any previous blob
    fn put(&mut self, name: &str, data: &[u8]) -> ArchiveResult<()>;

    /// Fetch the blob stored under `name`
    fn get(&self, name: &str) -> ArchiveResult<Vec<u8>>;

    /// Whether a blob exists under `name`
    fn contains(&self, name: &str) -> bool;

    /// All names, in the backend's enumeration order
    fn list(&self) -> ArchiveResult<Vec<String>>;

    /// Flush and seal the archive; no-op for backends without a trailer
    fn finish(&mut self) -> ArchiveResult<()> {
        Ok(())
    }

    /// Human-readable description for logs
    fn describe(&self) -> String;
}

/// Normalize an entry name to a single leading `/`
///
/// Rejects empty names and `.`/`..` components.
pub fn entry_key(name: &str) -> ArchiveResult<String> {
    let key = protobag_core::names::canonical(name);
    if key == "/" {
        return Err(ArchiveError::invalid_name(name, "empty name"));
    }
    if key[1..].split('/').any(|c| c.is_empty() || c == "." || c == "..") {
        return Err(ArchiveError::invalid_name(
            name,
            "empty, current or parent directory component",
        ));
    }
    Ok(key)
}

/// Open an archive as described by `spec`
pub fn open(spec: &ArchiveSpec) -> ArchiveResult<Box<dyn ArchiveStore>> {
    spec.validate()?;
    debug!(target: "protobag::archive", format = ?spec.format, mode = ?spec.mode, path = %spec.path.display(), "Opening archive");
    let store: Box<dyn ArchiveStore> = match (spec.format, spec.mode) {
        (ArchiveFormat::Memory, _) => Box::new(MemoryArchive::new()),
        (ArchiveFormat::Directory, mode) => Box::new(DirectoryArchive::open(&spec.path, mode)?),
        (ArchiveFormat::Tar, ArchiveMode::Write) => Box::new(TarArchive::create(&spec.path, None)?),
        (ArchiveFormat::TarZstd, ArchiveMode::Write) => {
            Box::new(TarArchive::create(&spec.path, Some(spec.compression_level))?)
        }
        (ArchiveFormat::Tar, ArchiveMode::Read) => Box::new(TarArchive::open(&spec.path, false)?),
        (ArchiveFormat::TarZstd, ArchiveMode::Read) => Box::new(TarArchive::open(&spec.path, true)?),
    };
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_entry_key() {
        assert_eq!(entry_key("a/b").unwrap(), "/a/b");
        assert_eq!(entry_key("//a/b/").unwrap(), "/a/b");
        assert!(entry_key("/").is_err());
        assert!(entry_key("/a/../b").is_err());
        assert!(entry_key("/a//b").is_err());
    }

    #[test]
    fn test_open_every_on_disk_format() {
        let dir = tempdir().unwrap();
        for file in ["bag_dir", "bag.tar", "bag.tar.zst"] {
            let spec = ArchiveSpec::write(dir.path().join(file));
            {
                let mut store = open(&spec).unwrap();
                store.put("/t/1.0.stampedmsg.protobin", b"payload").unwrap();
                store.put("/other", b"x").unwrap();
                store.finish().unwrap();
            }
            let store = open(&spec.for_reading()).unwrap();
            let mut names = store.list().unwrap();
            names.sort();
            assert_eq!(names, vec!["/other", "/t/1.0.stampedmsg.protobin"], "{}", file);
            assert_eq!(store.get("/t/1.0.stampedmsg.protobin").unwrap(), b"payload");
        }
    }

    #[test]
    fn test_open_rejects_invalid_spec() {
        let spec = ArchiveSpec::default().with_format(ArchiveFormat::Directory);
        assert!(matches!(open(&spec), Err(ArchiveError::InvalidSpec(_))));
    }
}
