//! Declarative entry selection
//!
//! A [`Selection`] names which entries a reader should stream back and in
//! what order. Exactly one criterion is active:
//!
//! | Variant     | Needs index | Order                       |
//! |-------------|-------------|-----------------------------|
//! | `SelectAll` | no          | archive enumeration order   |
//! | `ByNames`   | no          | as given                    |
//! | `Window`    | yes         | timestamp ascending         |
//! | `Events`    | yes         | as given                    |
//!
//! Selections serialize as `protobag.Selection` so they can be passed to a
//! reader as bytes, and derive serde so they can live in JSON config.

use crate::error::{Error, Result};
use crate::index::TopicTime;
use crate::names;
use crate::pb;
use crate::timestamp::Timestamp;
use prost::Message;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// One requested event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRef {
    /// Topic
    pub topic: String,
    /// Timestamp
    pub timestamp: Timestamp,
    /// Exact entry, pinning the event to one write
    pub entry_name: Option<String>,
}

impl EventRef {
    /// Event identified by topic and timestamp
    pub fn new(topic: impl Into<String>, timestamp: Timestamp) -> Self {
        EventRef {
            topic: topic.into(),
            timestamp,
            entry_name: None,
        }
    }

    /// Pin to an exact entry name
    pub fn with_entry_name(mut self, entry_name: impl Into<String>) -> Self {
        self.entry_name = Some(entry_name.into());
        self
    }
}

impl From<&TopicTime> for EventRef {
    fn from(tt: &TopicTime) -> Self {
        EventRef {
            topic: tt.topic.clone(),
            timestamp: tt.timestamp,
            entry_name: Some(tt.entry_name.clone()),
        }
    }
}

/// Declarative query over a bag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Selection {
    /// Every user entry
    SelectAll {
        /// Read every entry as raw bytes and ignore the index
        all_entries_are_raw: bool,
    },
    /// Named entries, in the given order
    ByNames {
        /// Entry names
        entry_names: Vec<String>,
        /// Skip names absent from the archive instead of failing
        ignore_missing: bool,
        /// Read the entries as raw bytes
        entries_are_raw: bool,
    },
    /// Stamped entries in a topic/time window
    Window {
        /// Topics to include; empty means all
        topics: BTreeSet<String>,
        /// Inclusive lower bound
        start: Option<Timestamp>,
        /// Inclusive upper bound
        end: Option<Timestamp>,
        /// Topics to exclude
        exclude_topics: BTreeSet<String>,
    },
    /// Explicit list of events
    Events {
        /// Requested events
        events: Vec<EventRef>,
        /// Fail if any event cannot be resolved
        require_all: bool,
    },
}

impl Default for Selection {
    fn default() -> Self {
        Selection::all()
    }
}

impl Selection {
    // =========================================================================
    // Constructors
    // =========================================================================

    /// Select every user entry
    pub fn all() -> Self {
        Selection::SelectAll {
            all_entries_are_raw: false,
        }
    }

    /// Select every user entry as raw bytes
    pub fn all_raw() -> Self {
        Selection::SelectAll {
            all_entries_are_raw: true,
        }
    }

    /// Select named entries; missing names are an error
    pub fn names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Selection::ByNames {
            entry_names: names.into_iter().map(Into::into).collect(),
            ignore_missing: false,
            entries_are_raw: false,
        }
    }

    /// Select all stamped entries on the given topics (empty = all)
    pub fn topics<I, S>(topics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Selection::Window {
            topics: topics.into_iter().map(Into::into).collect(),
            start: None,
            end: None,
            exclude_topics: BTreeSet::new(),
        }
    }

    /// Select stamped entries on topics in `[start, end]`
    pub fn window<I, S>(topics: I, start: Option<Timestamp>, end: Option<Timestamp>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Selection::Window {
            topics: topics.into_iter().map(Into::into).collect(),
            start,
            end,
            exclude_topics: BTreeSet::new(),
        }
    }

    /// Select explicit events; unresolved events are dropped
    pub fn events(events: Vec<EventRef>) -> Self {
        Selection::Events {
            events,
            require_all: false,
        }
    }

    // =========================================================================
    // Builders
    // =========================================================================

    /// Set `ignore_missing` on a `ByNames` selection
    pub fn with_ignore_missing(mut self, value: bool) -> Self {
        if let Selection::ByNames { ignore_missing, .. } = &mut self {
            *ignore_missing = value;
        }
        self
    }

    /// Set `entries_are_raw` on a `ByNames` selection
    pub fn with_raw(mut self, value: bool) -> Self {
        match &mut self {
            Selection::ByNames {
                entries_are_raw, ..
            } => *entries_are_raw = value,
            Selection::SelectAll {
                all_entries_are_raw,
            } => *all_entries_are_raw = value,
            _ => {}
        }
        self
    }

    /// Add excluded topics to a `Window` selection
    pub fn with_excluded_topics<I, S>(mut self, topics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if let Selection::Window { exclude_topics, .. } = &mut self {
            exclude_topics.extend(topics.into_iter().map(Into::into));
        }
        self
    }

    /// Set `require_all` on an `Events` selection
    pub fn with_require_all(mut self, value: bool) -> Self {
        if let Selection::Events { require_all, .. } = &mut self {
            *require_all = value;
        }
        self
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Whether resolving this selection needs the bag index
    pub fn requires_index(&self) -> bool {
        matches!(self, Selection::Window { .. } | Selection::Events { .. })
    }

    /// Whether selected entries are read as raw bytes
    pub fn reads_raw(&self) -> bool {
        match self {
            Selection::SelectAll {
                all_entries_are_raw,
            } => *all_entries_are_raw,
            Selection::ByNames {
                entries_are_raw, ..
            } => *entries_are_raw,
            _ => false,
        }
    }

    /// Whether an entry that vanished between resolve and read is an error
    pub fn requires_all(&self) -> bool {
        match self {
            Selection::ByNames { ignore_missing, .. } => !ignore_missing,
            Selection::Events { require_all, .. } => *require_all,
            _ => false,
        }
    }

    // =========================================================================
    // Wire format
    // =========================================================================

    /// Convert into the wire message
    pub fn to_proto(&self) -> pb::Selection {
        use pb::selection::{Criteria, Entrynames, Events, SelectAll, Window};
        let criteria = match self {
            Selection::SelectAll {
                all_entries_are_raw,
            } => Criteria::SelectAll(SelectAll {
                all_entries_are_raw: *all_entries_are_raw,
            }),
            Selection::ByNames {
                entry_names,
                ignore_missing,
                entries_are_raw,
            } => Criteria::Entrynames(Entrynames {
                entrynames: entry_names.clone(),
                ignore_missing_entries: *ignore_missing,
                entries_are_raw: *entries_are_raw,
            }),
            Selection::Window {
                topics,
                start,
                end,
                exclude_topics,
            } => Criteria::Window(Window {
                topics: topics.iter().cloned().collect(),
                start: start.map(Into::into),
                end: end.map(Into::into),
                exclude_topics: exclude_topics.iter().cloned().collect(),
            }),
            Selection::Events {
                events,
                require_all,
            } => Criteria::Events(Events {
                events: events
                    .iter()
                    .map(|e| pb::TopicTime {
                        topic: e.topic.clone(),
                        timestamp: Some(e.timestamp.into()),
                        entryname: e.entry_name.clone().unwrap_or_default(),
                    })
                    .collect(),
                require_all: *require_all,
            }),
        };
        pb::Selection {
            criteria: Some(criteria),
        }
    }

    /// Convert from the wire message
    pub fn from_proto(sel: pb::Selection) -> Result<Self> {
        use pb::selection::Criteria;
        let criteria = sel
            .criteria
            .ok_or_else(|| Error::invalid_selection("no criteria set"))?;
        let optional_ts = |ts: Option<prost_types::Timestamp>| ts.map(Timestamp::try_from).transpose();
        Ok(match criteria {
            Criteria::SelectAll(s) => Selection::SelectAll {
                all_entries_are_raw: s.all_entries_are_raw,
            },
            Criteria::Entrynames(s) => Selection::ByNames {
                entry_names: s.entrynames,
                ignore_missing: s.ignore_missing_entries,
                entries_are_raw: s.entries_are_raw,
            },
            Criteria::Window(w) => Selection::Window {
                topics: w.topics.into_iter().collect(),
                start: optional_ts(w.start)?,
                end: optional_ts(w.end)?,
                exclude_topics: w.exclude_topics.into_iter().collect(),
            },
            Criteria::Events(e) => Selection::Events {
                events: e
                    .events
                    .into_iter()
                    .map(|tt| {
                        let timestamp = tt.timestamp.ok_or_else(|| {
                            Error::invalid_selection(format!("event on {} has no timestamp", tt.topic))
                        })?;
                        Ok(EventRef {
                            topic: tt.topic,
                            timestamp: Timestamp::try_from(timestamp)?,
                            entry_name: Some(tt.entryname).filter(|n| !n.is_empty()),
                        })
                    })
                    .collect::<Result<_>>()?,
                require_all: e.require_all,
            },
        })
    }

    /// Serialize as `protobag.Selection`
    pub fn encode_to_vec(&self) -> Vec<u8> {
        self.to_proto().encode_to_vec()
    }

    /// Deserialize from `protobag.Selection` bytes
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let sel = pb::Selection::decode(bytes)
            .map_err(|e| Error::invalid_selection(format!("undecodable selection: {}", e)))?;
        Self::from_proto(sel)
    }

    /// Canonicalize every entry name and topic
    pub fn canonicalized(&self) -> Self {
        let set = |s: &BTreeSet<String>| -> BTreeSet<String> { s.iter().map(|t| names::canonical(t)).collect() };
        match self {
            Selection::SelectAll { .. } => self.clone(),
            Selection::ByNames {
                entry_names,
                ignore_missing,
                entries_are_raw,
            } => Selection::ByNames {
                entry_names: entry_names.iter().map(|n| names::canonical(n)).collect(),
                ignore_missing: *ignore_missing,
                entries_are_raw: *entries_are_raw,
            },
            Selection::Window {
                topics,
                start,
                end,
                exclude_topics,
            } => Selection::Window {
                topics: set(topics),
                start: *start,
                end: *end,
                exclude_topics: set(exclude_topics),
            },
            Selection::Events {
                events,
                require_all,
            } => Selection::Events {
                events: events
                    .iter()
                    .map(|e| EventRef {
                        topic: names::canonical(&e.topic),
                        timestamp: e.timestamp,
                        entry_name: e.entry_name.as_deref().map(names::canonical),
                    })
                    .collect(),
                require_all: *require_all,
            },
        }
    }
}
