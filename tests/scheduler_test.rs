//! Tests for the security sweep scheduler

mod common;

use automod_correlator::clock::{Clock, ManualClock, SystemClock};
use automod_correlator::config::CacheSettings;
use automod_correlator::models::MessageEvent;
use automod_correlator::scheduler::{
    Detector, SchedulerConfig, SchedulerConfigBuilder, SecuritySweepScheduler,
};
use automod_correlator::state::{ActivityCaches, CacheJanitor, SweepableCache};
use common::{FlakyPlatformClient, RecordingAlertSystem};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_test::assert_ok;

struct Harness {
    scheduler: Arc<SecuritySweepScheduler>,
    alerts: Arc<RecordingAlertSystem>,
    platform: Arc<FlakyPlatformClient>,
    caches: ActivityCaches,
}

fn harness(config: SchedulerConfig, clock: Arc<dyn Clock>) -> Harness {
    let caches = ActivityCaches::new(&CacheSettings::default(), Arc::clone(&clock));
    let alerts = Arc::new(RecordingAlertSystem::new(caches.clone()));
    let platform = Arc::new(FlakyPlatformClient::new());
    platform.inner.add_guild("g2");

    let janitor = Arc::new(CacheJanitor::new(clock));
    janitor.register(caches.messages.clone());
    janitor.register(caches.joins.clone());

    let scheduler = Arc::new(SecuritySweepScheduler::new(
        config,
        platform.clone(),
        alerts.clone(),
        janitor,
    ));

    Harness {
        scheduler,
        alerts,
        platform,
        caches,
    }
}

#[tokio::test]
async fn test_cycle_runs_every_detector_for_every_guild() {
    let h = harness(SchedulerConfig::default(), Arc::new(SystemClock::new()));

    let report = h.scheduler.run_cycle().await;
    assert_eq!(report.guilds, 2);
    assert_eq!(report.detector_failures, 0);
    assert_eq!(h.alerts.calls_for(Detector::Verification), 2);
    assert_eq!(h.alerts.calls_for(Detector::Security), 2);
    assert_eq!(h.alerts.calls_for(Detector::Anomaly), 2);

    // Detectors run in order within a guild
    let calls = h.alerts.detector_calls.lock().clone();
    assert_eq!(
        calls[..3].iter().map(|(_, d)| *d).collect::<Vec<_>>(),
        vec![Detector::Verification, Detector::Security, Detector::Anomaly]
    );
}

#[tokio::test]
async fn test_failing_detector_does_not_stop_the_others() {
    let clock = ManualClock::new();
    let h = harness(SchedulerConfig::default(), Arc::new(clock.clone()));
    h.alerts.fail_detector(Detector::Verification);

    for channel in ["c1", "c2", "c3"] {
        h.caches
            .record_message(MessageEvent::new("g1", "u1", channel, "join my server now"));
    }

    let report = h.scheduler.run_cycle().await;
    assert_eq!(report.detector_failures, 2);
    assert_eq!(report.alerts_raised, 1);
    assert_eq!(h.alerts.calls_for(Detector::Security), 2);
    assert_eq!(h.alerts.calls_for(Detector::Anomaly), 2);
    assert_eq!(h.alerts.alerts().len(), 1);

    // The janitor still ran
    clock.advance(Duration::from_secs(301));
    let report = h.scheduler.run_cycle().await;
    assert_eq!(report.evicted, 3);

    let stats = h.scheduler.stats().await;
    assert_eq!(stats.cycles_completed, 2);
    assert_eq!(stats.detector_failures, 4);
}

#[tokio::test]
async fn test_guild_listing_failure_still_sweeps() {
    let clock = ManualClock::new();
    let h = harness(SchedulerConfig::default(), Arc::new(clock.clone()));
    h.platform.fail_guilds.store(true, Ordering::SeqCst);

    h.caches
        .record_message(MessageEvent::new("g1", "u1", "c1", "hello"));
    clock.advance(Duration::from_secs(301));

    let report = h.scheduler.run_cycle().await;
    assert_eq!(report.guilds, 0);
    assert_eq!(report.evicted, 1);
    assert!(h.alerts.detector_calls.lock().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_panicking_detector_does_not_stop_the_sweep() {
    let clock = ManualClock::new();
    let h = harness(
        SchedulerConfigBuilder::new()
            .interval(Duration::from_secs(1))
            .build(),
        Arc::new(clock.clone()),
    );
    h.alerts.panic_in_detector(Detector::Verification);

    for channel in ["c1", "c2", "c3"] {
        h.caches
            .record_message(MessageEvent::new("g1", "u1", channel, "hello"));
    }
    clock.advance(Duration::from_secs(301));

    let (tx, rx) = watch::channel(false);
    let handle = assert_ok!(h.scheduler.start(rx).await).expect("scheduler is enabled");

    tokio::time::sleep(Duration::from_millis(3500)).await;

    let stats = h.scheduler.stats().await;
    assert!(stats.running);
    assert_eq!(stats.cycles_completed, 3);
    assert_eq!(stats.cycles_failed, 0);
    // Two guilds, three cycles
    assert_eq!(stats.detector_failures, 6);
    assert_eq!(h.alerts.calls_for(Detector::Security), 6);
    assert_eq!(h.alerts.calls_for(Detector::Anomaly), 6);

    // The janitor ran despite the panics
    assert_eq!(h.caches.messages.len(), 0);

    // Once the detector recovers, no new failures are counted
    h.alerts.panicking_detectors.lock().clear();
    tokio::time::sleep(Duration::from_secs(1)).await;
    let stats = h.scheduler.stats().await;
    assert_eq!(stats.cycles_completed, 4);
    assert_eq!(stats.detector_failures, 6);

    tx.send(true).unwrap();
    handle.await.unwrap();
    assert!(!h.scheduler.is_running().await);
}
