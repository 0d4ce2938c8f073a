//! Prometheus metrics for the moderation pipeline.
//!
//! All metrics live in a crate-owned registry so that tests and embedding
//! hosts never collide with the global default registry.

use lazy_static::lazy_static;
use prometheus::{Counter, CounterVec, Encoder, Gauge, Opts, Registry, TextEncoder};

use crate::error::Result;

const NAMESPACE: &str = "automod";

lazy_static! {
    /// Registry holding every pipeline metric
    pub static ref PIPELINE_REGISTRY: Registry = Registry::new();

    /// Incidents opened by the correlator
    pub static ref INCIDENTS_OPENED_TOTAL: Counter = Counter::with_opts(
        Opts::new("incidents_opened_total", "Incidents opened by the correlator")
            .namespace(NAMESPACE)
    ).expect("Failed to create INCIDENTS_OPENED_TOTAL metric");

    /// Raw events dropped because their incident was already finalized
    pub static ref EVENTS_DROPPED_TOTAL: Counter = Counter::with_opts(
        Opts::new("events_dropped_total", "Action events dropped after finalization")
            .namespace(NAMESPACE)
    ).expect("Failed to create EVENTS_DROPPED_TOTAL metric");

    /// Incidents currently waiting on their debounce deadline
    pub static ref OPEN_INCIDENTS: Gauge = Gauge::with_opts(
        Opts::new("open_incidents", "Incidents waiting on their debounce deadline")
            .namespace(NAMESPACE)
    ).expect("Failed to create OPEN_INCIDENTS metric");

    /// Alerts published, by severity
    ///
    /// Labels: severity
    pub static ref ALERTS_PUBLISHED_TOTAL: CounterVec = CounterVec::new(
        Opts::new("alerts_published_total", "Alerts published to the alert store")
            .namespace(NAMESPACE),
        &["severity"]
    ).expect("Failed to create ALERTS_PUBLISHED_TOTAL metric");

    /// Alerts the store failed to persist
    pub static ref ALERT_PUBLISH_FAILURES_TOTAL: Counter = Counter::with_opts(
        Opts::new("alert_publish_failures_total", "Alerts lost to publish failures")
            .namespace(NAMESPACE)
    ).expect("Failed to create ALERT_PUBLISH_FAILURES_TOTAL metric");

    /// Rate limiter trips
    pub static ref SPAM_TRIPS_TOTAL: Counter = Counter::with_opts(
        Opts::new("spam_trips_total", "Messages that tripped the spam threshold")
            .namespace(NAMESPACE)
    ).expect("Failed to create SPAM_TRIPS_TOTAL metric");

    /// Entries evicted by the janitor
    ///
    /// Labels: cache
    pub static ref CACHE_EVICTIONS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("cache_evictions_total", "Stale cache entries evicted")
            .namespace(NAMESPACE),
        &["cache"]
    ).expect("Failed to create CACHE_EVICTIONS_TOTAL metric");

    /// Completed sweep cycles
    pub static ref SWEEP_CYCLES_TOTAL: Counter = Counter::with_opts(
        Opts::new("sweep_cycles_total", "Completed security sweep cycles")
            .namespace(NAMESPACE)
    ).expect("Failed to create SWEEP_CYCLES_TOTAL metric");

    /// Detector failures during sweeps
    ///
    /// Labels: detector
    pub static ref DETECTOR_FAILURES_TOTAL: CounterVec = CounterVec::new(
        Opts::new("detector_failures_total", "Security detector failures")
            .namespace(NAMESPACE),
        &["detector"]
    ).expect("Failed to create DETECTOR_FAILURES_TOTAL metric");
}

/// Register all pipeline metrics. Safe to call more than once.
pub fn init_metrics() -> Result<()> {
    let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(INCIDENTS_OPENED_TOTAL.clone()),
        Box::new(EVENTS_DROPPED_TOTAL.clone()),
        Box::new(OPEN_INCIDENTS.clone()),
        Box::new(ALERTS_PUBLISHED_TOTAL.clone()),
        Box::new(ALERT_PUBLISH_FAILURES_TOTAL.clone()),
        Box::new(SPAM_TRIPS_TOTAL.clone()),
        Box::new(CACHE_EVICTIONS_TOTAL.clone()),
        Box::new(SWEEP_CYCLES_TOTAL.clone()),
        Box::new(DETECTOR_FAILURES_TOTAL.clone()),
    ];

    for collector in collectors {
        match PIPELINE_REGISTRY.register(collector) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(e.into()),
        }
    }

    Ok(())
}

/// Render all registered metrics in the Prometheus text format
pub fn gather_metrics() -> Result<String> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&PIPELINE_REGISTRY.gather(), &mut buffer)?;
    String::from_utf8(buffer)
        .map_err(|e| crate::error::AppError::Internal(format!("metrics output: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        assert!(init_metrics().is_ok());
        assert!(init_metrics().is_ok());
    }

    #[test]
    fn test_gather_contains_namespaced_metrics() {
        init_metrics().unwrap();
        SWEEP_CYCLES_TOTAL.inc();
        CACHE_EVICTIONS_TOTAL.with_label_values(&["message"]).inc_by(2.0);

        let output = gather_metrics().unwrap();
        assert!(output.contains("automod_sweep_cycles_total"));
        assert!(output.contains("automod_cache_evictions_total"));
    }
}
