//! Single deadline queue for every open incident.
//!
//! One background driver sleeps until the earliest deadline instead of one
//! timer per incident.

use parking_lot::Mutex;
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use tokio::sync::futures::Notified;
use tokio::sync::Notify;
use tokio::time::Instant;

use crate::models::IncidentKey;

#[derive(Debug)]
struct Deadline {
    at: Instant,
    seq: u64,
    key: IncidentKey,
}

// Ordered by (at, seq) only; seq keeps equal deadlines in scheduling order.
impl PartialEq for Deadline {
    fn eq(&self, other: &Self) -> bool {
        self.at == other.at && self.seq == other.seq
    }
}

impl Eq for Deadline {}

impl PartialOrd for Deadline {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Deadline {
    fn cmp(&self, other: &Self) -> Ordering {
        self.at.cmp(&other.at).then(self.seq.cmp(&other.seq))
    }
}

/// Min-heap of incident deadlines
#[derive(Debug, Default)]
pub struct DebounceQueue {
    heap: Mutex<BinaryHeap<Reverse<Deadline>>>,
    seq: AtomicU64,
    wakeup: Notify,
}

impl DebounceQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `key` to finalize at `at` and wake the driver
    pub fn schedule(&self, key: IncidentKey, at: Instant) {
        let seq = self.seq.fetch_add(1, AtomicOrdering::Relaxed);
        self.heap.lock().push(Reverse(Deadline { at, seq, key }));
        // notify_one stores a permit when the driver is not parked yet
        self.wakeup.notify_one();
    }

    /// Remove and return every key whose deadline is at or before `now`
    pub fn pop_due(&self, now: Instant) -> Vec<IncidentKey> {
        let mut heap = self.heap.lock();
        let mut due = Vec::new();
        while heap.peek().is_some_and(|Reverse(d)| d.at <= now) {
            if let Some(Reverse(deadline)) = heap.pop() {
                due.push(deadline.key);
            }
        }
        due
    }

    /// Remove and return every key regardless of deadline
    pub fn drain(&self) -> Vec<IncidentKey> {
        let mut heap = self.heap.lock();
        let mut all: Vec<Deadline> = heap.drain().map(|Reverse(d)| d).collect();
        all.sort();
        all.into_iter().map(|d| d.key).collect()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.heap.lock().peek().map(|Reverse(d)| d.at)
    }

    pub fn len(&self) -> usize {
        self.heap.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Resolves after the next `schedule` call
    pub fn notified(&self) -> Notified<'_> {
        self.wakeup.notified()
    }
}
