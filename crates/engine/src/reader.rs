//! Bag reader
//!
//! A [`BagReader`] snapshots the archive namespace on open and locates the
//! bag index. The index is decoded lazily: [`BagReader::index_summary`]
//! reads topics and time range without building the descriptor pool, and
//! `SelectAll` works even when the index is missing or corrupt. With
//! `dynamic_decode` on, the index descriptors are registered on the first
//! decode.
//!
//! Entries are streamed by [`EntryIter`], which fetches one blob per step.

use crate::config::ReaderConfig;
use crate::decoder::{DecodedMessage, MessageDecoder};
use crate::selection;
use crate::time_sync::{MaxSlopConfig, MaxSlopTimeSync};
use prost::Name;
use protobag_archive::ArchiveStore;
use protobag_core::{names, pb, BagIndex, BagIndexSummary, Entry, Error, Result, Selection};
use once_cell::unsync::OnceCell;
use std::cell::{Cell, Ref, RefCell};
use std::fmt;
use tracing::{debug, info, warn};

/// Reads entries from a closed bag
pub struct BagReader {
    store: Box<dyn ArchiveStore>,
    config: ReaderConfig,
    /// Archive namespace at open, in enumeration order
    namespace: Vec<String>,
    /// Serialized `protobag.BagIndex`, if an index entry was found
    index_bytes: Option<Vec<u8>>,
    index: OnceCell<BagIndex>,
    /// Why the index is unavailable
    index_problem: Option<String>,
    decoder: RefCell<MessageDecoder>,
    /// Set once index descriptors were offered to the decoder
    descriptors_loaded: Cell<bool>,
}

impl fmt::Debug for BagReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BagReader")
            .field("store", &self.store.describe())
            .field("entries", &self.namespace.len())
            .field("index_problem", &self.index_problem)
            .field("decoder", &self.decoder)
            .field("descriptors_loaded", &self.descriptors_loaded.get())
            .finish()
    }
}

impl BagReader {
    /// Open the archive described by `config`
    pub fn open(config: ReaderConfig) -> Result<Self> {
        config.validate()?;
        let store = protobag_archive::open(&config.archive)?;
        Self::from_store(store, config)
    }

    /// Read from an already-open store
    pub fn from_store(store: Box<dyn ArchiveStore>, config: ReaderConfig) -> Result<Self> {
        let namespace = store.list()?;
        let (index_bytes, index_problem) = match load_index_bytes(store.as_ref(), &namespace) {
            Ok(bytes) => (Some(bytes), None),
            Err(e) => {
                warn!(target: "protobag::reader", store = %store.describe(), error = %e, "Bag index unavailable");
                (None, Some(e.to_string()))
            }
        };

        let reader = BagReader {
            store,
            config,
            namespace,
            index_bytes,
            index: OnceCell::new(),
            index_problem,
            decoder: RefCell::new(MessageDecoder::new()),
            descriptors_loaded: Cell::new(false),
        };
        info!(
            target: "protobag::reader",
            store = %reader.store.describe(),
            entries = reader.namespace.len(),
            indexed = reader.index_problem.is_none(),
            "Opened bag for reading"
        );
        Ok(reader)
    }

    // =========================================================================
    // Index
    // =========================================================================

    /// Whether an index entry was found
    pub fn has_index(&self) -> bool {
        self.index_bytes.is_some()
    }

    /// The full bag index
    pub fn index(&self) -> Result<&BagIndex> {
        if let Some(index) = self.index.get() {
            return Ok(index);
        }
        let bytes = self.index_bytes.as_deref().ok_or_else(|| {
            Error::corrupt(
                self.index_problem
                    .clone()
                    .unwrap_or_else(|| "no bag index".to_string()),
            )
        })?;
        let index = BagIndex::decode(bytes)
            .map_err(|e| Error::corrupt(format!("undecodable bag index: {}", e)))?;
        debug!(
            target: "protobag::reader",
            types = index.descriptor_pool.len(),
            stamped = index.time_ordered_entries.len(),
            "Decoded bag index"
        );
        let _ = self.index.set(index);
        self.index
            .get()
            .ok_or_else(|| Error::corrupt("bag index vanished"))
    }

    /// Topics, time range and counts, without the descriptor pool
    pub fn index_summary(&self) -> Result<BagIndexSummary> {
        if let Some(index) = self.index.get() {
            return Ok(index.summary());
        }
        let bytes = self
            .index_bytes
            .as_deref()
            .ok_or_else(|| Error::corrupt("no bag index"))?;
        BagIndexSummary::decode(bytes)
            .map_err(|e| Error::corrupt(format!("undecodable bag index: {}", e)))
    }

    /// Register every closure and entry pin from the index with the decoder
    ///
    /// Returns the number of types that registered.
    pub fn register_index_descriptors(&mut self) -> Result<usize> {
        let index = self.index()?;
        let registered = self.decoder.borrow_mut().register_from_index(index);
        self.descriptors_loaded.set(true);
        Ok(registered)
    }

    /// Offer the index descriptors to the decoder once, if configured to
    fn ensure_descriptors(&self) {
        if self.descriptors_loaded.replace(true) || !self.config.dynamic_decode || !self.has_index() {
            return;
        }
        match self.index() {
            Ok(index) => {
                let registered = self.decoder.borrow_mut().register_from_index(index);
                debug!(target: "protobag::reader", types = registered, "Registered bag descriptors");
            }
            Err(e) => {
                warn!(target: "protobag::reader", error = %e, "Could not register bag descriptors");
            }
        }
    }

    // =========================================================================
    // Entries
    // =========================================================================

    /// User entry names, in archive enumeration order
    pub fn list_entries(&self) -> Vec<String> {
        self.namespace
            .iter()
            .filter(|n| !names::is_reserved(n))
            .cloned()
            .collect()
    }

    /// Read a single entry
    pub fn get_entry(&self, entry_name: &str) -> Result<Entry> {
        self.read_entry(&names::canonical(entry_name), false)
    }

    fn read_entry(&self, entry_name: &str, raw: bool) -> Result<Entry> {
        if names::is_reserved(entry_name) {
            return Err(Error::not_found(entry_name));
        }
        let bytes = self.store.get(entry_name)?;
        let raw = raw || self.written_raw(entry_name);
        Entry::from_archive_bytes(entry_name, bytes, raw)
    }

    /// Whether the index records `entry_name` as a raw write
    fn written_raw(&self, entry_name: &str) -> bool {
        if self.index_bytes.is_none() {
            return false;
        }
        matches!(
            self.index().map(|i| i.pinned_type_url(entry_name)),
            Ok(Some(""))
        )
    }

    /// Stream the entries chosen by `selection`
    ///
    /// `Window` and `Events` fail with `CorruptArchive` when the bag has no
    /// usable index.
    pub fn entries(&self, selection: &Selection) -> Result<EntryIter<'_>> {
        let index = if selection.requires_index() {
            Some(self.index()?)
        } else if selection.reads_raw() {
            None
        } else {
            self.index().ok()
        };
        let names = selection::resolve(selection, index, &self.namespace)?;
        Ok(EntryIter {
            reader: self,
            names: names.into_iter(),
            raw: selection.reads_raw(),
            require_all: selection.requires_all(),
        })
    }

    /// Stream the entries chosen by a serialized `protobag.Selection`
    pub fn entries_from_bytes(&self, selection: &[u8]) -> Result<EntryIter<'_>> {
        self.entries(&Selection::decode(selection)?)
    }

    /// Decode an entry's message; raw entries decode to `None`
    pub fn decode(&self, entry: &Entry) -> Result<Option<Box<dyn DecodedMessage>>> {
        match entry.typed() {
            Some(msg) => self.decoder().decode(msg).map(Some),
            None => Ok(None),
        }
    }

    /// Stream entries together with their decoded messages
    pub fn decoded_entries(
        &self,
        selection: &Selection,
    ) -> Result<impl Iterator<Item = Result<(Entry, Option<Box<dyn DecodedMessage>>)>> + '_> {
        let entries = self.entries(selection)?;
        Ok(entries.map(move |entry| {
            let entry = entry?;
            let decoded = self.decode(&entry)?;
            Ok((entry, decoded))
        }))
    }

    /// Synchronize the configured topics over the whole bag
    pub fn time_sync(&self, config: &MaxSlopConfig) -> Result<MaxSlopTimeSync<EntryIter<'_>>> {
        config.validate()?;
        let entries = self.entries(&Selection::topics(config.topics.iter().cloned()))?;
        MaxSlopTimeSync::new(entries, config)
    }

    /// The decoder used by [`decode`](Self::decode)
    pub fn decoder(&self) -> Ref<'_, MessageDecoder> {
        self.ensure_descriptors();
        self.decoder.borrow()
    }

    /// Mutable decoder, for registering static types
    pub fn decoder_mut(&mut self) -> &mut MessageDecoder {
        self.ensure_descriptors();
        self.decoder.get_mut()
    }
}

/// Locate the index entry and unwrap its `BagIndex` bytes
///
/// When several index entries exist the last one enumerated wins.
fn load_index_bytes(store: &dyn ArchiveStore, namespace: &[String]) -> Result<Vec<u8>> {
    let prefix = format!("{}/", names::BAG_INDEX_TOPIC);
    let entry_name = namespace
        .iter()
        .filter(|n| n.starts_with(&prefix))
        .last()
        .ok_or_else(|| Error::corrupt("archive has no bag index entry"))?;
    let bytes = store.get(entry_name)?;
    let entry = Entry::from_archive_bytes(entry_name, bytes, false)?;
    let expected = names::type_url_for(&pb::BagIndex::full_name());
    match entry {
        Entry::Stamped(stamped) if stamped.msg.type_url == expected => Ok(stamped.msg.payload),
        other => Err(Error::corrupt(format!(
            "index entry {} holds '{}', expected '{}'",
            entry_name,
            other.type_url(),
            expected
        ))),
    }
}

/// Pull iterator over selected entries
///
/// Entries that vanished since the selection was resolved are skipped
/// unless the selection requires every entry.
pub struct EntryIter<'a> {
    reader: &'a BagReader,
    names: std::vec::IntoIter<String>,
    raw: bool,
    require_all: bool,
}

impl EntryIter<'_> {
    /// Entries not yet read
    pub fn remaining(&self) -> usize {
        self.names.len()
    }
}

impl fmt::Debug for EntryIter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntryIter")
            .field("remaining", &self.names.len())
            .field("raw", &self.raw)
            .finish()
    }
}

impl Iterator for EntryIter<'_> {
    type Item = Result<Entry>;

    fn next(&mut self) -> Option<Self::Item> {
        for name in self.names.by_ref() {
            match self.reader.read_entry(&name, self.raw) {
                Err(e) if e.is_not_found() && !self.require_all => {
                    debug!(target: "protobag::reader", entry = %name, "Skipping missing entry");
                }
                result => return Some(result),
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.names.len()))
    }
}
