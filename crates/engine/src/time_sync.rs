//! Max-slop time synchronization
//!
//! [`MaxSlopTimeSync`] consumes a timestamp-ascending stream of entries and
//! emits bundles holding exactly one stamped entry per requested topic, with
//! all timestamps in a bundle within `max_slop` of each other.
//!
//! Each topic has a pending queue of at most `max_queue_size` entries; a full
//! queue drops its oldest entry to make room. After every push:
//!
//! 1. If any queue is empty, wait for more input.
//! 2. If the fronts span at most `max_slop`, pop them as a bundle.
//! 3. Otherwise drop the earliest front (arrival order breaks ties) and
//!    retry.
//!
//! Pending entries left at the end of the stream are discarded.

use protobag_core::{names, Entry, Error, Result, StampedEntry};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tracing::trace;

fn default_max_queue_size() -> usize {
    1
}

/// Synchronization parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaxSlopConfig {
    /// Topics to synchronize; bundles follow this order
    pub topics: Vec<String>,
    /// Largest allowed timestamp spread within a bundle
    pub max_slop: Duration,
    /// Pending entries kept per topic
    #[serde(default = "default_max_queue_size")]
    pub max_queue_size: usize,
}

impl MaxSlopConfig {
    /// Synchronize `topics` within `max_slop`
    pub fn new<I, S>(topics: I, max_slop: Duration) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        MaxSlopConfig {
            topics: topics.into_iter().map(|t| names::canonical(t.as_ref())).collect(),
            max_slop,
            max_queue_size: default_max_queue_size(),
        }
    }

    /// Set the per-topic queue capacity
    pub fn with_max_queue_size(mut self, size: usize) -> Self {
        self.max_queue_size = size;
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.topics.is_empty() {
            return Err(Error::config("time sync needs at least one topic"));
        }
        if self.max_queue_size == 0 {
            return Err(Error::config("max_queue_size must be at least 1"));
        }
        let mut seen = std::collections::HashSet::new();
        for topic in &self.topics {
            if !seen.insert(names::canonical(topic)) {
                return Err(Error::config(format!("topic {} listed twice", topic)));
            }
        }
        Ok(())
    }
}

/// Pending entry plus its arrival sequence number
type Pending = (u64, StampedEntry);

/// Iterator of synchronized bundles over an entry stream
pub struct MaxSlopTimeSync<I> {
    input: I,
    max_slop: Duration,
    max_queue_size: usize,
    topic_slots: HashMap<String, usize>,
    queues: Vec<VecDeque<Pending>>,
    ready: VecDeque<Vec<StampedEntry>>,
    arrivals: u64,
    done: bool,
}

impl<I> std::fmt::Debug for MaxSlopTimeSync<I> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MaxSlopTimeSync")
            .field("topics", &self.topic_slots.len())
            .field("max_slop", &self.max_slop)
            .field("pending", &self.queues.iter().map(VecDeque::len).sum::<usize>())
            .field("done", &self.done)
            .finish()
    }
}

impl<I> MaxSlopTimeSync<I>
where
    I: Iterator<Item = Result<Entry>>,
{
    /// Synchronize `input` according to `config`
    pub fn new(input: I, config: &MaxSlopConfig) -> Result<Self> {
        config.validate()?;
        let topic_slots = config
            .topics
            .iter()
            .enumerate()
            .map(|(i, t)| (names::canonical(t), i))
            .collect();
        Ok(MaxSlopTimeSync {
            input,
            max_slop: config.max_slop,
            max_queue_size: config.max_queue_size,
            topic_slots,
            queues: vec![VecDeque::new(); config.topics.len()],
            ready: VecDeque::new(),
            arrivals: 0,
            done: false,
        })
    }

    fn push(&mut self, entry: StampedEntry) {
        let Some(&slot) = self.topic_slots.get(&entry.topic) else {
            trace!(target: "protobag::sync", topic = %entry.topic, "Ignoring unrequested topic");
            return;
        };
        let queue = &mut self.queues[slot];
        if queue.len() >= self.max_queue_size {
            if let Some((_, evicted)) = queue.pop_front() {
                trace!(target: "protobag::sync", entry = %evicted.entry_name, "Evicted from full queue");
            }
        }
        queue.push_back((self.arrivals, entry));
        self.arrivals += 1;
        self.try_match();
    }

    fn try_match(&mut self) {
        loop {
            let mut earliest: Option<(usize, &Pending)> = None;
            let mut latest = None;
            for (slot, queue) in self.queues.iter().enumerate() {
                let Some(front) = queue.front() else {
                    return;
                };
                let is_earlier = match earliest {
                    None => true,
                    Some((_, (seq, e))) => (front.1.timestamp, front.0) < (e.timestamp, *seq),
                };
                if is_earlier {
                    earliest = Some((slot, front));
                }
                latest = latest.max(Some(front.1.timestamp));
            }
            let (Some((slot, (_, first))), Some(last)) = (earliest, latest) else {
                return;
            };

            if first.timestamp.abs_diff(&last) <= self.max_slop {
                let bundle: Vec<StampedEntry> = self
                    .queues
                    .iter_mut()
                    .filter_map(|q| q.pop_front().map(|(_, e)| e))
                    .collect();
                trace!(target: "protobag::sync", start = %first_ts(&bundle), "Emitting bundle");
                self.ready.push_back(bundle);
            } else if let Some((_, dropped)) = self.queues[slot].pop_front() {
                trace!(target: "protobag::sync", entry = %dropped.entry_name, "Dropped unmatched entry");
            }
        }
    }
}

fn first_ts(bundle: &[StampedEntry]) -> String {
    bundle
        .iter()
        .map(|e| e.timestamp)
        .min()
        .map(|ts| ts.to_string())
        .unwrap_or_default()
}

impl<I> Iterator for MaxSlopTimeSync<I>
where
    I: Iterator<Item = Result<Entry>>,
{
    type Item = Result<Vec<StampedEntry>>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(bundle) = self.ready.pop_front() {
                return Some(Ok(bundle));
            }
            if self.done {
                return None;
            }
            match self.input.next() {
                Some(Ok(Entry::Stamped(entry))) => self.push(entry),
                Some(Ok(_)) => {}
                Some(Err(e)) => return Some(Err(e)),
                None => {
                    self.done = true;
                    let pending: usize = self.queues.iter().map(VecDeque::len).sum();
                    trace!(target: "protobag::sync", pending, "Input exhausted");
                    self.queues.iter_mut().for_each(VecDeque::clear);
                }
            }
        }
    }
}
