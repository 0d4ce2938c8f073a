use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

use crate::clock::Clock;
use crate::metrics::CACHE_EVICTIONS_TOTAL;
use crate::state::cache::SweepableCache;

/// Evicts stale entries from every registered time-windowed cache
pub struct CacheJanitor {
    caches: RwLock<Vec<Arc<dyn SweepableCache>>>,
    clock: Arc<dyn Clock>,
}

/// Outcome of one sweep
#[derive(Debug, Clone, Default, Serialize)]
pub struct SweepReport {
    /// (cache name, entries evicted)
    pub evicted: Vec<(String, usize)>,
    pub total_evicted: usize,
}

/// Entry count of one registered cache
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub name: String,
    pub entries: usize,
}

impl CacheJanitor {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            caches: RwLock::new(Vec::new()),
            clock,
        }
    }

    /// Add a cache to every future sweep
    pub fn register(&self, cache: Arc<dyn SweepableCache>) {
        debug!(cache = cache.name(), "Registered cache with janitor");
        self.caches.write().push(cache);
    }

    pub fn registered(&self) -> usize {
        self.caches.read().len()
    }

    /// Evict stale entries from each registered cache.
    ///
    /// Every cache is swept against the same instant.
    pub fn sweep(&self) -> SweepReport {
        let now = self.clock.now();
        // Clone the list so registration never waits on a sweep
        let caches: Vec<Arc<dyn SweepableCache>> = self.caches.read().clone();

        let mut report = SweepReport::default();
        for cache in caches {
            let evicted = cache.evict_stale(now);
            if evicted > 0 {
                CACHE_EVICTIONS_TOTAL
                    .with_label_values(&[cache.name()])
                    .inc_by(evicted as f64);
            }
            debug!(
                cache = cache.name(),
                evicted = evicted,
                remaining = cache.len(),
                "Swept cache"
            );
            report.total_evicted += evicted;
            report.evicted.push((cache.name().to_string(), evicted));
        }

        if report.total_evicted > 0 {
            info!(total_evicted = report.total_evicted, "Cache sweep evicted stale entries");
        }

        report
    }

    pub fn stats(&self) -> Vec<CacheStats> {
        self.caches
            .read()
            .iter()
            .map(|cache| CacheStats {
                name: cache.name().to_string(),
                entries: cache.len(),
            })
            .collect()
    }
}
