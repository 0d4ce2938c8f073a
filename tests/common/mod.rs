//! Common test utilities
//!
//! Test doubles for the platform client and the alert system, plus helpers
//! for reading Prometheus exposition output.

#![allow(dead_code)]

use async_trait::async_trait;
use automod_correlator::alerts::InMemoryAlertSystem;
use automod_correlator::error::{AppError, Result};
use automod_correlator::integrations::{AlertSystem, PlatformClient, StaticPlatformClient};
use automod_correlator::models::{Alert, AlertKind, AlertSeverity, NewAlert};
use automod_correlator::scheduler::Detector;
use automod_correlator::state::ActivityCaches;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use uuid::Uuid;

/// Platform client with a fixed directory, an optional lookup delay and
/// switchable failures
pub struct FlakyPlatformClient {
    pub inner: StaticPlatformClient,
    pub delay: Duration,
    pub fail_lookups: AtomicBool,
    pub fail_guilds: AtomicBool,
}

impl FlakyPlatformClient {
    pub fn new() -> Self {
        let inner = StaticPlatformClient::new();
        inner.add_member("g1", "u1", "alice");
        inner.add_member("g1", "u2", "bob");
        inner.add_channel("c1", "general");
        inner.add_channel("c2", "random");
        Self {
            inner,
            delay: Duration::ZERO,
            fail_lookups: AtomicBool::new(false),
            fail_guilds: AtomicBool::new(false),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn failing_lookups(self) -> Self {
        self.fail_lookups.store(true, Ordering::SeqCst);
        self
    }

    async fn pause(&self) {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }

    fn lookup_error(target: &str) -> AppError {
        AppError::Resolution {
            target: target.to_string(),
            message: "platform unavailable".to_string(),
        }
    }
}

#[async_trait]
impl PlatformClient for FlakyPlatformClient {
    async fn resolve_member_name(&self, guild_id: &str, user_id: &str) -> Result<String> {
        self.pause().await;
        if self.fail_lookups.load(Ordering::SeqCst) {
            return Err(Self::lookup_error(user_id));
        }
        self.inner.resolve_member_name(guild_id, user_id).await
    }

    async fn resolve_channel_name(&self, channel_id: &str) -> Result<String> {
        self.pause().await;
        if self.fail_lookups.load(Ordering::SeqCst) {
            return Err(Self::lookup_error(channel_id));
        }
        self.inner.resolve_channel_name(channel_id).await
    }

    async fn guild_ids(&self) -> Result<Vec<String>> {
        if self.fail_guilds.load(Ordering::SeqCst) {
            return Err(Self::lookup_error("guilds"));
        }
        self.inner.guild_ids().await
    }
}

/// Alert system that records every call and can be told to fail
pub struct RecordingAlertSystem {
    pub inner: InMemoryAlertSystem,
    pub fail_creates: AtomicBool,
    pub failing_detectors: Mutex<Vec<Detector>>,
    pub panicking_detectors: Mutex<Vec<Detector>>,
    pub detector_calls: Mutex<Vec<(String, Detector)>>,
}

impl RecordingAlertSystem {
    pub fn new(caches: ActivityCaches) -> Self {
        Self {
            inner: InMemoryAlertSystem::new(caches),
            fail_creates: AtomicBool::new(false),
            failing_detectors: Mutex::new(Vec::new()),
            panicking_detectors: Mutex::new(Vec::new()),
            detector_calls: Mutex::new(Vec::new()),
        }
    }

    pub fn fail_detector(&self, detector: Detector) {
        self.failing_detectors.lock().push(detector);
    }

    pub fn panic_in_detector(&self, detector: Detector) {
        self.panicking_detectors.lock().push(detector);
    }

    pub fn alerts(&self) -> Vec<Alert> {
        self.inner.all_alerts()
    }

    pub fn calls_for(&self, detector: Detector) -> usize {
        self.detector_calls
            .lock()
            .iter()
            .filter(|(_, d)| *d == detector)
            .count()
    }

    fn enter(&self, detector: Detector, guild_id: &str) -> Result<()> {
        self.detector_calls
            .lock()
            .push((guild_id.to_string(), detector));

        if self.panicking_detectors.lock().contains(&detector) {
            panic!("{} detector exploded", detector);
        }
        if self.failing_detectors.lock().contains(&detector) {
            return Err(AppError::Detector {
                detector: detector.to_string(),
                message: "backend timeout".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl AlertSystem for RecordingAlertSystem {
    async fn create_alert(
        &self,
        kind: AlertKind,
        severity: AlertSeverity,
        request: NewAlert,
    ) -> Result<Alert> {
        if self.fail_creates.load(Ordering::SeqCst) {
            return Err(AppError::Integration {
                integration_source: "alert-store".to_string(),
                message: "connection refused".to_string(),
            });
        }
        self.inner.create_alert(kind, severity, request).await
    }

    async fn get_active_alerts(&self, guild_id: &str) -> Result<Vec<Alert>> {
        self.inner.get_active_alerts(guild_id).await
    }

    async fn resolve_alert(&self, alert_id: Uuid, resolved_by: &str) -> Result<Alert> {
        self.inner.resolve_alert(alert_id, resolved_by).await
    }

    async fn detect_verification_issues(&self, guild_id: &str) -> Result<usize> {
        self.enter(Detector::Verification, guild_id)?;
        self.inner.detect_verification_issues(guild_id).await
    }

    async fn detect_security_violations(&self, guild_id: &str) -> Result<usize> {
        self.enter(Detector::Security, guild_id)?;
        self.inner.detect_security_violations(guild_id).await
    }

    async fn detect_anomalous_activity(&self, guild_id: &str) -> Result<usize> {
        self.enter(Detector::Anomaly, guild_id)?;
        self.inner.detect_anomalous_activity(guild_id).await
    }
}

/// Parse Prometheus exposition format into metric name -> lines
pub fn parse_prometheus_output(output: &str) -> HashMap<String, Vec<String>> {
    let mut metrics = HashMap::new();
    let mut current_metric = String::new();

    for line in output.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if line.starts_with("# HELP") || line.starts_with("# TYPE") {
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() >= 3 {
                current_metric = parts[2].to_string();
                metrics
                    .entry(current_metric.clone())
                    .or_insert_with(Vec::new)
                    .push(line.to_string());
            }
        } else if !current_metric.is_empty() {
            metrics
                .entry(current_metric.clone())
                .or_insert_with(Vec::new)
                .push(line.to_string());
        }
    }

    metrics
}

/// Value of the first sample line for `metric` whose labels contain `label`
pub fn sample_value(output: &str, metric: &str, label: Option<&str>) -> Option<f64> {
    output
        .lines()
        .filter(|line| !line.starts_with('#') && line.starts_with(metric))
        .find(|line| label.map_or(true, |l| line.contains(l)))
        .and_then(|line| line.split_whitespace().last()?.parse::<f64>().ok())
}
