use dashmap::DashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::clock::Clock;

/// Payload tagged with the instant it was cached
#[derive(Debug, Clone)]
pub struct TimestampedCacheEntry<T> {
    pub payload: T,
    pub timestamp: Instant,
}

impl<T> TimestampedCacheEntry<T> {
    pub fn new(payload: T, timestamp: Instant) -> Self {
        Self { payload, timestamp }
    }

    /// True once the entry is older than `retention` at `now`.
    /// An entry exactly `retention` old is still fresh.
    pub fn is_stale(&self, now: Instant, retention: Duration) -> bool {
        now.saturating_duration_since(self.timestamp) > retention
    }
}

/// A cache the janitor can evict from
pub trait SweepableCache: Send + Sync {
    /// Name used in logs and metrics
    fn name(&self) -> &str;

    /// Remove every stale entry as of `now`, returning how many were removed
    fn evict_stale(&self, now: Instant) -> usize;

    /// Current number of entries
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Concurrent keyed cache whose entries expire after a fixed retention.
///
/// Stale entries are invisible to readers even before the janitor removes
/// them.
pub struct TimeWindowedCache<K, T>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
{
    name: String,
    retention: Duration,
    entries: DashMap<K, TimestampedCacheEntry<T>>,
    clock: Arc<dyn Clock>,
}

impl<K, T> TimeWindowedCache<K, T>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
{
    pub fn new(name: impl Into<String>, retention: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            name: name.into(),
            retention,
            entries: DashMap::new(),
            clock,
        }
    }

    pub fn retention(&self) -> Duration {
        self.retention
    }

    /// Insert or replace an entry stamped with the current instant
    pub fn insert(&self, key: K, payload: T) {
        let now = self.clock.now();
        self.entries
            .insert(key, TimestampedCacheEntry::new(payload, now));
    }

    /// Fresh payload for `key`, if any
    pub fn get(&self, key: &K) -> Option<T> {
        let now = self.clock.now();
        self.entries
            .get(key)
            .filter(|entry| !entry.is_stale(now, self.retention))
            .map(|entry| entry.payload.clone())
    }

    /// Snapshot of every fresh payload matching `predicate`
    pub fn fresh_values<F>(&self, mut predicate: F) -> Vec<T>
    where
        F: FnMut(&K, &T) -> bool,
    {
        let now = self.clock.now();
        self.entries
            .iter()
            .filter(|entry| !entry.value().is_stale(now, self.retention))
            .filter(|entry| predicate(entry.key(), &entry.value().payload))
            .map(|entry| entry.value().payload.clone())
            .collect()
    }

    pub fn remove(&self, key: &K) -> Option<T> {
        self.entries.remove(key).map(|(_, entry)| entry.payload)
    }
}

impl<K, T> SweepableCache for TimeWindowedCache<K, T>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn evict_stale(&self, now: Instant) -> usize {
        let before = self.entries.len();
        // retain() locks one shard at a time; an insert racing the sweep
        // carries a fresh timestamp and is never removed.
        self.entries
            .retain(|_, entry| !entry.is_stale(now, self.retention));
        before.saturating_sub(self.entries.len())
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}
