//! Core sweep scheduler implementation

use super::{
    config::SchedulerConfig,
    error::{SchedulerError, SchedulerResult},
};
use chrono::{DateTime, Utc};
use futures::FutureExt;
use parking_lot::Mutex;
use serde::Serialize;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use strum::{Display, EnumIter, IntoEnumIterator, IntoStaticStr};
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::error::{AppError, Result};
use crate::integrations::{AlertSystem, PlatformClient};
use crate::metrics::{DETECTOR_FAILURES_TOTAL, SWEEP_CYCLES_TOTAL};
use crate::state::CacheJanitor;

/// External detectors run for every guild on each cycle, in this order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum Detector {
    Verification,
    Security,
    Anomaly,
}

/// Outcome of one sweep cycle
#[derive(Debug, Clone, Default, Serialize)]
pub struct CycleReport {
    pub guilds: usize,
    pub alerts_raised: usize,
    pub detector_failures: usize,
    pub evicted: usize,
}

/// Statistics about the scheduler
#[derive(Debug, Clone, Serialize)]
pub struct SchedulerStats {
    pub running: bool,
    pub cycles_completed: u64,
    pub cycles_failed: u64,
    pub detector_failures: u64,
    pub alerts_raised: u64,
    pub last_cycle_at: Option<DateTime<Utc>>,
}

/// Runs the security detectors and the cache janitor on a fixed interval
pub struct SecuritySweepScheduler {
    /// Configuration
    config: SchedulerConfig,

    platform: Arc<dyn PlatformClient>,
    alerts: Arc<dyn AlertSystem>,
    janitor: Arc<CacheJanitor>,

    /// Whether the sweep loop is running
    running: Arc<RwLock<bool>>,

    cycles_completed: AtomicU64,
    cycles_failed: AtomicU64,
    detector_failures: AtomicU64,
    alerts_raised: AtomicU64,
    last_cycle_at: Mutex<Option<DateTime<Utc>>>,
}

impl SecuritySweepScheduler {
    pub fn new(
        config: SchedulerConfig,
        platform: Arc<dyn PlatformClient>,
        alerts: Arc<dyn AlertSystem>,
        janitor: Arc<CacheJanitor>,
    ) -> Self {
        Self {
            config,
            platform,
            alerts,
            janitor,
            running: Arc::new(RwLock::new(false)),
            cycles_completed: AtomicU64::new(0),
            cycles_failed: AtomicU64::new(0),
            detector_failures: AtomicU64::new(0),
            alerts_raised: AtomicU64::new(0),
            last_cycle_at: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Run one detector. A panic inside it is reported as a detector error.
    async fn run_detector(&self, detector: Detector, guild_id: &str) -> Result<usize> {
        let call = async {
            match detector {
                Detector::Verification => self.alerts.detect_verification_issues(guild_id).await,
                Detector::Security => self.alerts.detect_security_violations(guild_id).await,
                Detector::Anomaly => self.alerts.detect_anomalous_activity(guild_id).await,
            }
        };

        match AssertUnwindSafe(call).catch_unwind().await {
            Ok(result) => result,
            Err(payload) => Err(AppError::Detector {
                detector: detector.to_string(),
                message: format!("panicked: {}", panic_message(payload.as_ref())),
            }),
        }
    }

    /// Run every detector for every known guild, then sweep the caches.
    ///
    /// Detector errors and panics are counted and logged; they never stop the
    /// cycle and the janitor always runs.
    pub async fn run_cycle(&self) -> CycleReport {
        let mut report = CycleReport::default();

        let guilds = match self.platform.guild_ids().await {
            Ok(guilds) => guilds,
            Err(e) => {
                warn!(error = %e, "Failed to list guilds, skipping detectors this cycle");
                Vec::new()
            }
        };
        report.guilds = guilds.len();

        for guild_id in &guilds {
            for detector in Detector::iter() {
                match self.run_detector(detector, guild_id).await {
                    Ok(raised) => report.alerts_raised += raised,
                    Err(e) => {
                        report.detector_failures += 1;
                        let label: &'static str = detector.into();
                        DETECTOR_FAILURES_TOTAL.with_label_values(&[label]).inc();
                        error!(
                            guild_id = %guild_id,
                            detector = %detector,
                            error = %e,
                            "Detector failed"
                        );
                    }
                }
            }
        }

        report.evicted = self.janitor.sweep().total_evicted;

        SWEEP_CYCLES_TOTAL.inc();
        self.cycles_completed.fetch_add(1, Ordering::Relaxed);
        self.detector_failures
            .fetch_add(report.detector_failures as u64, Ordering::Relaxed);
        self.alerts_raised
            .fetch_add(report.alerts_raised as u64, Ordering::Relaxed);
        *self.last_cycle_at.lock() = Some(Utc::now());

        debug!(
            guilds = report.guilds,
            alerts_raised = report.alerts_raised,
            detector_failures = report.detector_failures,
            evicted = report.evicted,
            "Sweep cycle complete"
        );

        report
    }

    /// Start the sweep loop. The first cycle runs one interval after start.
    ///
    /// Returns `None` when the scheduler is disabled.
    pub async fn start(
        self: &Arc<Self>,
        mut shutdown: watch::Receiver<bool>,
    ) -> SchedulerResult<Option<JoinHandle<()>>> {
        if !self.config.enabled {
            info!("Security sweep is disabled in configuration");
            return Ok(None);
        }
        self.config.validate()?;

        {
            let mut running = self.running.write().await;
            if *running {
                return Err(SchedulerError::AlreadyRunning);
            }
            *running = true;
        }

        let interval = self.config.interval;
        info!(interval_secs = interval.as_secs(), "Starting security sweep scheduler");

        let scheduler = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = scheduler.spawn_cycle().await {
                            scheduler.cycles_failed.fetch_add(1, Ordering::Relaxed);
                            error!(error = %e, "Sweep cycle aborted, retrying next tick");
                        }
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }

            *scheduler.running.write().await = false;
            info!("Security sweep scheduler stopped");
        });

        Ok(Some(handle))
    }

    /// One cycle on its own task so a panic outside the detectors cannot take the loop down
    async fn spawn_cycle(self: &Arc<Self>) -> SchedulerResult<CycleReport> {
        let scheduler = Arc::clone(self);
        let report = tokio::spawn(async move { scheduler.run_cycle().await }).await?;
        Ok(report)
    }

    /// Check if the sweep loop is running
    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }

    pub async fn stats(&self) -> SchedulerStats {
        SchedulerStats {
            running: self.is_running().await,
            cycles_completed: self.cycles_completed.load(Ordering::Relaxed),
            cycles_failed: self.cycles_failed.load(Ordering::Relaxed),
            detector_failures: self.detector_failures.load(Ordering::Relaxed),
            alerts_raised: self.alerts_raised.load(Ordering::Relaxed),
            last_cycle_at: *self.last_cycle_at.lock(),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        *message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown panic"
    }
}
