//! In-memory archive
//!
//! Clones share one map, so a writer and later readers in the same process
//! can hand the archive around without touching disk.

use crate::error::{ArchiveError, ArchiveResult};
use crate::{entry_key, ArchiveStore};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Default)]
struct MemoryData {
    /// Names in first-insertion order
    order: Vec<String>,
    blobs: HashMap<String, Vec<u8>>,
}

/// Shared in-memory archive
#[derive(Debug, Clone, Default)]
pub struct MemoryArchive {
    inner: Arc<RwLock<MemoryData>>,
}

impl MemoryArchive {
    /// Create an empty archive
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.inner.read().order.len()
    }

    /// True if no entries have been written
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total payload bytes held
    pub fn total_bytes(&self) -> usize {
        self.inner.read().blobs.values().map(Vec::len).sum()
    }
}

impl ArchiveStore for MemoryArchive {
    fn put(&mut self, name: &str, data: &[u8]) -> ArchiveResult<()> {
        let key = entry_key(name)?;
        let mut inner = self.inner.write();
        if inner.blobs.insert(key.clone(), data.to_vec()).is_none() {
            inner.order.push(key);
        }
        Ok(())
    }

    fn get(&self, name: &str) -> ArchiveResult<Vec<u8>> {
        let key = entry_key(name)?;
        self.inner
            .read()
            .blobs
            .get(&key)
            .cloned()
            .ok_or_else(|| ArchiveError::not_found(key))
    }

    fn contains(&self, name: &str) -> bool {
        match entry_key(name) {
            Ok(key) => self.inner.read().blobs.contains_key(&key),
            Err(_) => false,
        }
    }

    fn list(&self) -> ArchiveResult<Vec<String>> {
        Ok(self.inner.read().order.clone())
    }

    fn describe(&self) -> String {
        format!("memory archive ({} entries)", self.len())
    }
}
