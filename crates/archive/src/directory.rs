//! Directory archive
//!
//! Each entry is a file under the root directory; entry `/a/b.protobin` is
//! stored at `<root>/a/b.protobin`. Listing walks the tree and returns names
//! sorted lexicographically.

use crate::config::ArchiveMode;
use crate::error::{ArchiveError, ArchiveResult};
use crate::{entry_key, ArchiveStore};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Archive backed by a plain directory tree
#[derive(Debug)]
pub struct DirectoryArchive {
    root: PathBuf,
    mode: ArchiveMode,
}

impl DirectoryArchive {
    /// Open a directory archive
    ///
    /// Write mode creates the root if needed; read mode requires it to exist.
    pub fn open(root: impl Into<PathBuf>, mode: ArchiveMode) -> ArchiveResult<Self> {
        let root = root.into();
        match mode {
            ArchiveMode::Write => fs::create_dir_all(&root)?,
            ArchiveMode::Read => {
                if !root.is_dir() {
                    return Err(ArchiveError::not_found(root.display().to_string()));
                }
            }
        }
        debug!(target: "protobag::archive", root = %root.display(), ?mode, "Opened directory archive");
        Ok(DirectoryArchive { root, mode })
    }

    /// Root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_of(&self, key: &str) -> PathBuf {
        self.root.join(key.trim_start_matches('/'))
    }
}

fn collect_files(dir: &Path, prefix: &str, out: &mut Vec<String>) -> io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = format!("{}/{}", prefix, entry.file_name().to_string_lossy());
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            collect_files(&entry.path(), &name, out)?;
        } else if file_type.is_file() {
            out.push(name);
        }
    }
    Ok(())
}

impl ArchiveStore for DirectoryArchive {
    fn put(&mut self, name: &str, data: &[u8]) -> ArchiveResult<()> {
        if self.mode == ArchiveMode::Read {
            return Err(ArchiveError::ReadOnly(self.root.display().to_string()));
        }
        let path = self.path_of(&entry_key(name)?);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, data)?;
        Ok(())
    }

    fn get(&self, name: &str) -> ArchiveResult<Vec<u8>> {
        let key = entry_key(name)?;
        match fs::read(self.path_of(&key)) {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(ArchiveError::not_found(key)),
            Err(e) => Err(e.into()),
        }
    }

    fn contains(&self, name: &str) -> bool {
        match entry_key(name) {
            Ok(key) => self.path_of(&key).is_file(),
            Err(_) => false,
        }
    }

    fn list(&self) -> ArchiveResult<Vec<String>> {
        let mut names = Vec::new();
        collect_files(&self.root, "", &mut names)?;
        names.sort();
        Ok(names)
    }

    fn describe(&self) -> String {
        format!("directory archive at {}", self.root.display())
    }
}
