//! Tar and tar.zst archives
//!
//! ## Archive Structure
//!
//! ```text
//! bag.tar.zst (or bag.tar)
//! ├── topic/1.0.stampedmsg.protobin
//! ├── topic/1.5.stampedmsg.protobin
//! ├── my_message.protobin
//! └── _protobag_index/bag_index/1700000000.0.stampedmsg.protobin
//! ```
//!
//! Members are regular files with GNU headers, mode 0644 and a zero mtime,
//! so identical writes produce identical archives. Paths are stored
//! relative; the leading `/` of entry names is restored on read.
//!
//! Writing streams each entry straight into the tar builder and goes to a
//! temporary file that is renamed into place on [`ArchiveStore::finish`].
//! Reading loads every member into memory when the archive is opened.

use crate::error::{ArchiveError, ArchiveResult};
use crate::{entry_key, ArchiveStore};
use std::collections::{HashMap, HashSet};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::mem;
use std::path::{Path, PathBuf};
use tar::{Archive, Builder, Header};
use tracing::{debug, info, warn};

enum TarSink {
    Plain(Builder<BufWriter<File>>),
    Zstd(Builder<zstd::Encoder<'static, BufWriter<File>>>),
}

impl TarSink {
    fn append(&mut self, header: &mut Header, path: &str, data: &[u8]) -> std::io::Result<()> {
        match self {
            TarSink::Plain(builder) => builder.append_data(header, path, data),
            TarSink::Zstd(builder) => builder.append_data(header, path, data),
        }
    }

    /// Write the tar trailer and flush (and finish the zstd frame)
    fn finish(self) -> ArchiveResult<()> {
        match self {
            TarSink::Plain(builder) => {
                let mut writer = builder
                    .into_inner()
                    .map_err(|e| ArchiveError::archive(format!("tar finish: {}", e)))?;
                writer.flush()?;
            }
            TarSink::Zstd(builder) => {
                let encoder = builder
                    .into_inner()
                    .map_err(|e| ArchiveError::archive(format!("tar finish: {}", e)))?;
                let mut writer = encoder
                    .finish()
                    .map_err(|e| ArchiveError::compression(format!("zstd finish: {}", e)))?;
                writer.flush()?;
            }
        }
        Ok(())
    }
}

enum TarState {
    Writing {
        sink: TarSink,
        temp_path: PathBuf,
        names: Vec<String>,
        seen: HashSet<String>,
    },
    Reading {
        order: Vec<String>,
        files: HashMap<String, Vec<u8>>,
    },
    Finished {
        names: Vec<String>,
    },
}

/// Archive stored as a single tar (optionally zstd-compressed) file
pub struct TarArchive {
    path: PathBuf,
    compressed: bool,
    state: TarState,
}

impl std::fmt::Debug for TarArchive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TarArchive")
            .field("path", &self.path)
            .field("compressed", &self.compressed)
            .finish()
    }
}

impl TarArchive {
    /// Start writing a new archive at `path`
    pub fn create(path: impl Into<PathBuf>, compression_level: Option<i32>) -> ArchiveResult<Self> {
        let path = path.into();
        let temp_path = path.with_extension("tmp");

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let buf_writer = BufWriter::new(File::create(&temp_path)?);
        let sink = match compression_level {
            Some(level) => {
                let encoder = zstd::Encoder::new(buf_writer, level)
                    .map_err(|e| ArchiveError::compression(format!("zstd encoder: {}", e)))?;
                TarSink::Zstd(Builder::new(encoder))
            }
            None => TarSink::Plain(Builder::new(buf_writer)),
        };

        debug!(target: "protobag::archive", path = %path.display(), compressed = compression_level.is_some(), "Creating tar archive");
        Ok(TarArchive {
            path,
            compressed: compression_level.is_some(),
            state: TarState::Writing {
                sink,
                temp_path,
                names: Vec::new(),
                seen: HashSet::new(),
            },
        })
    }

    /// Open an existing archive and load its members
    pub fn open(path: impl Into<PathBuf>, compressed: bool) -> ArchiveResult<Self> {
        let path = path.into();
        let file = File::open(&path)?;
        let buf_reader = BufReader::new(file);
        let (order, files) = if compressed {
            let decoder = zstd::Decoder::new(buf_reader)
                .map_err(|e| ArchiveError::compression(format!("zstd decode: {}", e)))?;
            extract_all_files(decoder)?
        } else {
            extract_all_files(buf_reader)?
        };

        debug!(target: "protobag::archive", path = %path.display(), entries = order.len(), "Loaded tar archive");
        Ok(TarArchive {
            path,
            compressed,
            state: TarState::Reading { order, files },
        })
    }

    /// Path of the archive file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Header for one member; the path and checksum are filled in on append
/// (GNU long-name records cover paths past 100 bytes)
fn member_header(size: usize) -> Header {
    let mut header = Header::new_gnu();
    header.set_size(size as u64);
    header.set_mode(0o644);
    header.set_mtime(0);
    header
}

/// Read every regular file of a tar stream, keyed by entry name
fn extract_all_files<R: Read>(reader: R) -> ArchiveResult<(Vec<String>, HashMap<String, Vec<u8>>)> {
    let mut archive = Archive::new(reader);
    let mut order = Vec::new();
    let mut files = HashMap::new();

    for entry in archive
        .entries()
        .map_err(|e| ArchiveError::archive(e.to_string()))?
    {
        let mut entry = entry.map_err(|e| ArchiveError::archive(e.to_string()))?;
        if !entry.header().entry_type().is_file() {
            continue;
        }
        let entry_path = entry
            .path()
            .map_err(|e| ArchiveError::archive(e.to_string()))?
            .to_string_lossy()
            .to_string();
        let name = entry_key(&entry_path)?;

        let mut data = Vec::new();
        entry
            .read_to_end(&mut data)
            .map_err(|e| ArchiveError::archive(format!("read {}: {}", name, e)))?;
        if files.insert(name.clone(), data).is_none() {
            order.push(name);
        }
    }

    Ok((order, files))
}

impl ArchiveStore for TarArchive {
    fn put(&mut self, name: &str, data: &[u8]) -> ArchiveResult<()> {
        let key = entry_key(name)?;
        match &mut self.state {
            TarState::Writing {
                sink, names, seen, ..
            } => {
                let mut header = member_header(data.len());
                sink.append(&mut header, key.trim_start_matches('/'), data)
                    .map_err(|e| ArchiveError::archive(format!("append '{}': {}", key, e)))?;
                if seen.insert(key.clone()) {
                    names.push(key);
                }
                Ok(())
            }
            TarState::Reading { .. } => Err(ArchiveError::ReadOnly(self.path.display().to_string())),
            TarState::Finished { .. } => Err(ArchiveError::Finished(self.path.display().to_string())),
        }
    }

    fn get(&self, name: &str) -> ArchiveResult<Vec<u8>> {
        let key = entry_key(name)?;
        match &self.state {
            TarState::Reading { files, .. } => files
                .get(&key)
                .cloned()
                .ok_or_else(|| ArchiveError::not_found(key)),
            _ => Err(ArchiveError::WriteOnly(self.path.display().to_string())),
        }
    }

    fn contains(&self, name: &str) -> bool {
        let Ok(key) = entry_key(name) else {
            return false;
        };
        match &self.state {
            TarState::Writing { seen, .. } => seen.contains(&key),
            TarState::Reading { files, .. } => files.contains_key(&key),
            TarState::Finished { names } => names.contains(&key),
        }
    }

    fn list(&self) -> ArchiveResult<Vec<String>> {
        Ok(match &self.state {
            TarState::Writing { names, .. } | TarState::Finished { names } => names.clone(),
            TarState::Reading { order, .. } => order.clone(),
        })
    }

    fn finish(&mut self) -> ArchiveResult<()> {
        let state = mem::replace(&mut self.state, TarState::Finished { names: Vec::new() });
        match state {
            TarState::Writing {
                sink,
                temp_path,
                names,
                ..
            } => {
                let result = sink.finish().and_then(|()| {
                    fs::rename(&temp_path, &self.path)?;
                    Ok(())
                });
                if result.is_err() {
                    let _ = fs::remove_file(&temp_path);
                }
                info!(target: "protobag::archive", path = %self.path.display(), entries = names.len(), "Finished tar archive");
                self.state = TarState::Finished { names };
                result
            }
            other => {
                self.state = other;
                Ok(())
            }
        }
    }

    fn describe(&self) -> String {
        let kind = if self.compressed { "tar.zst" } else { "tar" };
        format!("{} archive at {}", kind, self.path.display())
    }
}

impl Drop for TarArchive {
    fn drop(&mut self) {
        if matches!(self.state, TarState::Writing { .. }) {
            if let Err(e) = self.finish() {
                warn!(target: "protobag::archive", path = %self.path.display(), error = %e, "Failed to finish tar archive on drop");
            }
        }
    }
}
