//! Selection matching
//!
//! Turns a [`Selection`] into the ordered list of entry names a reader
//! fetches. The archive namespace is the list of names the store
//! enumerates; reserved index names are never returned.

use protobag_core::{names, BagIndex, Error, EventRef, Result, Selection, Timestamp, TopicTime};
use std::collections::{BTreeSet, HashSet};
use tracing::debug;

/// Resolve `selection` to entry names in read order
///
/// `index` is required for `Window` and `Events`; without it those fail
/// with `CorruptArchive`. Names and topics in the selection are
/// canonicalized first.
pub fn resolve(selection: &Selection, index: Option<&BagIndex>, namespace: &[String]) -> Result<Vec<String>> {
    let selection = selection.canonicalized();
    let resolved = match &selection {
        Selection::SelectAll { .. } => namespace
            .iter()
            .filter(|name| !names::is_reserved(name))
            .cloned()
            .collect(),
        Selection::ByNames {
            entry_names,
            ignore_missing,
            ..
        } => resolve_names(entry_names, *ignore_missing, namespace)?,
        Selection::Window {
            topics,
            start,
            end,
            exclude_topics,
        } => {
            let index = require_index(index, "window")?;
            index
                .time_ordered_entries
                .iter()
                .filter(|tt| in_window(tt, topics, *start, *end, exclude_topics))
                .map(|tt| tt.entry_name.clone())
                .collect()
        }
        Selection::Events {
            events,
            require_all,
        } => {
            let index = require_index(index, "events")?;
            resolve_events(events, *require_all, index, namespace)?
        }
    };
    debug!(target: "protobag::reader", selection = ?selection, resolved = resolved.len(), "Resolved selection");
    Ok(resolved)
}

fn require_index<'a>(index: Option<&'a BagIndex>, what: &str) -> Result<&'a BagIndex> {
    index.ok_or_else(|| Error::corrupt(format!("{} selection requires a bag index", what)))
}

/// Whether `tt` falls inside a window
///
/// Empty `topics` means every topic; bounds are inclusive and `None` is
/// unbounded.
pub fn in_window(
    tt: &TopicTime,
    topics: &BTreeSet<String>,
    start: Option<Timestamp>,
    end: Option<Timestamp>,
    exclude_topics: &BTreeSet<String>,
) -> bool {
    if names::is_reserved(&tt.topic) || names::is_reserved(&tt.entry_name) {
        return false;
    }
    if !topics.is_empty() && !topics.contains(&tt.topic) {
        return false;
    }
    if exclude_topics.contains(&tt.topic) {
        return false;
    }
    start.map_or(true, |s| s <= tt.timestamp) && end.map_or(true, |e| tt.timestamp <= e)
}

fn resolve_names(entry_names: &[String], ignore_missing: bool, namespace: &[String]) -> Result<Vec<String>> {
    let present: HashSet<&str> = namespace.iter().map(String::as_str).collect();
    let mut out = Vec::with_capacity(entry_names.len());
    for name in entry_names {
        if !names::is_reserved(name) && present.contains(name.as_str()) {
            out.push(name.clone());
        } else if !ignore_missing {
            return Err(Error::not_found(name.clone()));
        }
    }
    Ok(out)
}

fn resolve_events(
    events: &[EventRef],
    require_all: bool,
    index: &BagIndex,
    namespace: &[String],
) -> Result<Vec<String>> {
    let present: HashSet<&str> = namespace
        .iter()
        .map(String::as_str)
        .filter(|n| !names::is_reserved(n))
        .collect();
    let mut out = Vec::with_capacity(events.len());
    for event in events {
        match resolve_event(event, index, &present) {
            Some(name) => out.push(name),
            None if require_all => {
                return Err(Error::not_found(format!(
                    "event {} @ {}",
                    event.topic, event.timestamp
                )))
            }
            None => {}
        }
    }
    Ok(out)
}

/// Resolve one event to an indexed stamped entry
///
/// An explicit name pins the event: it resolves only if that entry is indexed
/// at the event's `(topic, timestamp)`. Otherwise the deterministic name is
/// tried, then the first indexed entry at the same `(topic, timestamp)`.
/// Candidates must be present in the namespace.
fn resolve_event(event: &EventRef, index: &BagIndex, present: &HashSet<&str>) -> Option<String> {
    let indexed_at = |name: &str| {
        present.contains(name)
            && index.time_ordered_entries.iter().any(|tt| {
                tt.entry_name == name && tt.topic == event.topic && tt.timestamp == event.timestamp
            })
    };

    if let Some(name) = event.entry_name.as_deref() {
        return indexed_at(name).then(|| name.to_string());
    }
    let derived = names::stamped_entry_name(&event.topic, event.timestamp, 0);
    if indexed_at(&derived) {
        return Some(derived);
    }
    index
        .time_ordered_entries
        .iter()
        .find(|tt| {
            tt.topic == event.topic
                && tt.timestamp == event.timestamp
                && present.contains(tt.entry_name.as_str())
        })
        .map(|tt| tt.entry_name.clone())
}
