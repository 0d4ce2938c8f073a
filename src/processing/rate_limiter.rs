use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use crate::clock::Clock;
use crate::config::RateLimitSettings;
use crate::metrics::SPAM_TRIPS_TOTAL;
use crate::state::SweepableCache;

/// Per-actor message counter for the current window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateWindowEntry {
    pub count: u32,
    pub window_started_at: Instant,
}

/// Sliding-window spam limiter.
///
/// A window opens on an actor's first message and resets on the first
/// message after it has elapsed; it never slides forward on its own.
pub struct RateLimiter {
    window: Duration,
    threshold: u32,
    entries: DashMap<String, RateWindowEntry>,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    pub fn new(window: Duration, threshold: u32, clock: Arc<dyn Clock>) -> Self {
        Self {
            window,
            threshold,
            entries: DashMap::new(),
            clock,
        }
    }

    pub fn from_settings(settings: &RateLimitSettings, clock: Arc<dyn Clock>) -> Self {
        Self::new(settings.window(), settings.threshold, clock)
    }

    /// Record one message from `actor_id`.
    ///
    /// Returns true when the actor is at or over the threshold within the
    /// current window. Every call while over the threshold returns true.
    pub fn record(&self, actor_id: &str) -> bool {
        let now = self.clock.now();

        let mut entry = self
            .entries
            .entry(actor_id.to_string())
            .or_insert(RateWindowEntry {
                count: 0,
                window_started_at: now,
            });

        if entry.count > 0 && now.saturating_duration_since(entry.window_started_at) > self.window {
            entry.count = 0;
            entry.window_started_at = now;
        }

        entry.count += 1;

        if entry.count == 1 {
            return false;
        }

        let tripped = entry.count >= self.threshold;
        if tripped {
            SPAM_TRIPS_TOTAL.inc();
            debug!(
                actor_id = actor_id,
                count = entry.count,
                threshold = self.threshold,
                "Spam threshold reached"
            );
        }
        tripped
    }

    /// Current window for `actor_id`, if one has been opened
    pub fn entry(&self, actor_id: &str) -> Option<RateWindowEntry> {
        self.entries.get(actor_id).map(|e| *e)
    }

    /// Forget an actor's window
    pub fn reset(&self, actor_id: &str) {
        self.entries.remove(actor_id);
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }
}

impl SweepableCache for RateLimiter {
    fn name(&self) -> &str {
        "rate_window"
    }

    /// Windows that have elapsed carry no state worth keeping: the next
    /// message would reset them anyway.
    fn evict_stale(&self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, e| now.saturating_duration_since(e.window_started_at) <= self.window);
        before.saturating_sub(self.entries.len())
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}
