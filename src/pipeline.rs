use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use validator::Validate;

use crate::alerts::AlertPublisher;
use crate::clock::Clock;
use crate::config::Config;
use crate::correlation::{CorrelatorConfig, CorrelatorStats, EventCorrelator, ObserveOutcome};
use crate::error::{AppError, Result};
use crate::integrations::{AlertSystem, PlatformClient};
use crate::models::{MemberJoin, MessageEvent, RawActionEvent};
use crate::processing::RateLimiter;
use crate::scheduler::{SchedulerConfig, SchedulerStats, SecuritySweepScheduler};
use crate::state::{ActivityCaches, CacheJanitor, CacheStats};

/// Result of feeding one chat message through the rate limiter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageVerdict {
    Clean,
    Spam,
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineStats {
    pub correlator: CorrelatorStats,
    pub caches: Vec<CacheStats>,
    pub scheduler: SchedulerStats,
}

/// Wires the correlator, rate limiter, caches, janitor and sweep scheduler
/// around one platform client and one alert system
pub struct ModerationPipeline {
    correlator: Arc<EventCorrelator>,
    rate_limiter: Arc<RateLimiter>,
    caches: ActivityCaches,
    janitor: Arc<CacheJanitor>,
    scheduler: Arc<SecuritySweepScheduler>,
    shutdown_tx: watch::Sender<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl ModerationPipeline {
    pub fn new(
        config: &Config,
        platform: Arc<dyn PlatformClient>,
        alerts: Arc<dyn AlertSystem>,
        caches: ActivityCaches,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let publisher = AlertPublisher::new(
            Arc::clone(&alerts),
            config.correlation.content_preview_chars,
        );
        let correlator = Arc::new(EventCorrelator::new(
            CorrelatorConfig::from(&config.correlation),
            Arc::clone(&platform),
            publisher,
            Arc::clone(&clock),
        ));
        let rate_limiter = Arc::new(RateLimiter::from_settings(
            &config.rate_limit,
            Arc::clone(&clock),
        ));

        let janitor = Arc::new(CacheJanitor::new(clock));
        janitor.register(caches.messages.clone());
        janitor.register(caches.joins.clone());
        janitor.register(rate_limiter.clone());

        let scheduler = Arc::new(SecuritySweepScheduler::new(
            SchedulerConfig::from(&config.sweep),
            platform,
            alerts,
            Arc::clone(&janitor),
        ));

        let (shutdown_tx, _) = watch::channel(false);

        Self {
            correlator,
            rate_limiter,
            caches,
            janitor,
            scheduler,
            shutdown_tx,
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Spawn the debounce driver and, when enabled, the sweep scheduler
    pub async fn start(&self) -> Result<()> {
        let mut tasks = self.tasks.lock().await;
        if !tasks.is_empty() {
            return Err(AppError::InvalidStateTransition(
                "Pipeline already started".to_string(),
            ));
        }

        // Scheduler first: a refused start must not leave the driver running
        if let Some(handle) = self.scheduler.start(self.shutdown_tx.subscribe()).await? {
            tasks.push(handle);
        }

        let correlator = Arc::clone(&self.correlator);
        tasks.push(tokio::spawn(correlator.run(self.shutdown_tx.subscribe())));

        info!(tasks = tasks.len(), "Moderation pipeline started");
        Ok(())
    }

    /// Stop background tasks and publish every incident still pending
    pub async fn shutdown(&self) {
        self.shutdown_tx.send_replace(true);

        let handles: Vec<JoinHandle<()>> = self.tasks.lock().await.drain(..).collect();
        for handle in handles {
            if let Err(e) = handle.await {
                error!(error = %e, "Pipeline task ended abnormally");
            }
        }

        // Covers a pipeline that was never started
        let flushed = self.correlator.flush().await;
        if flushed > 0 {
            debug!(flushed = flushed, "Flushed pending incidents on shutdown");
        }
        info!("Moderation pipeline stopped");
    }

    pub async fn handle_action(&self, event: RawActionEvent) -> Result<ObserveOutcome> {
        self.correlator.observe(event).await
    }

    /// Record a message for the detectors and count it against its author
    pub fn handle_message(&self, message: MessageEvent) -> Result<MessageVerdict> {
        message.validate()?;

        let author_id = message.author_id.clone();
        let guild_id = message.guild_id.clone();
        self.caches.record_message(message);

        if self.rate_limiter.record(&author_id) {
            warn!(guild_id = %guild_id, author_id = %author_id, "Message rate threshold exceeded");
            Ok(MessageVerdict::Spam)
        } else {
            Ok(MessageVerdict::Clean)
        }
    }

    pub fn handle_member_join(&self, join: MemberJoin) -> Result<()> {
        join.validate()?;

        debug!(guild_id = %join.guild_id, user_id = %join.user_id, "Member joined");
        self.caches.record_join(join);
        Ok(())
    }

    pub fn correlator(&self) -> &Arc<EventCorrelator> {
        &self.correlator
    }

    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        &self.rate_limiter
    }

    pub fn caches(&self) -> &ActivityCaches {
        &self.caches
    }

    pub fn janitor(&self) -> &Arc<CacheJanitor> {
        &self.janitor
    }

    pub fn scheduler(&self) -> &Arc<SecuritySweepScheduler> {
        &self.scheduler
    }

    pub async fn stats(&self) -> PipelineStats {
        PipelineStats {
            correlator: self.correlator.stats(),
            caches: self.janitor.stats(),
            scheduler: self.scheduler.stats().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::InMemoryAlertSystem;
    use crate::clock::ManualClock;
    use crate::integrations::StaticPlatformClient;
    use crate::config::SweepSettings;
    use crate::models::ActionKind;
    use crate::state::SweepableCache;

    fn pipeline(clock: &ManualClock) -> (ModerationPipeline, Arc<InMemoryAlertSystem>) {
        let clock: Arc<dyn Clock> = Arc::new(clock.clone());
        let caches = ActivityCaches::new(&Config::default().caches, Arc::clone(&clock));
        let alerts = Arc::new(InMemoryAlertSystem::new(caches.clone()));
        let pipeline = ModerationPipeline::new(
            &Config::default(),
            Arc::new(StaticPlatformClient::new().with_guild("g1")),
            alerts.clone(),
            caches,
            clock,
        );
        (pipeline, alerts)
    }

    #[tokio::test]
    async fn test_janitor_covers_every_cache() {
        let (pipeline, _) = pipeline(&ManualClock::new());
        assert_eq!(pipeline.janitor().registered(), 3);
    }

    #[tokio::test]
    async fn test_message_verdicts() {
        let (pipeline, _) = pipeline(&ManualClock::new());
        for _ in 0..4 {
            let verdict = pipeline
                .handle_message(MessageEvent::new("g1", "u1", "c1", "hi"))
                .unwrap();
            assert_eq!(verdict, MessageVerdict::Clean);
        }
        let verdict = pipeline
            .handle_message(MessageEvent::new("g1", "u1", "c1", "hi"))
            .unwrap();
        assert_eq!(verdict, MessageVerdict::Spam);
        assert_eq!(pipeline.caches().messages.len(), 5);
    }

    #[tokio::test]
    async fn test_invalid_messages_and_joins_are_rejected() {
        let (pipeline, _) = pipeline(&ManualClock::new());

        let result = pipeline.handle_message(MessageEvent::new("g1", "", "c1", "hi"));
        assert!(matches!(result, Err(AppError::Validation(_))));
        assert_eq!(pipeline.caches().messages.len(), 0);
        assert!(pipeline.rate_limiter().entry("").is_none());

        let join = MemberJoin::new("", "u1", chrono::Utc::now());
        let result = pipeline.handle_member_join(join);
        assert!(matches!(result, Err(AppError::Validation(_))));
        assert_eq!(pipeline.caches().joins.len(), 0);
    }

    #[tokio::test]
    async fn test_shutdown_without_start_flushes() {
        let (pipeline, alerts) = pipeline(&ManualClock::new());
        pipeline
            .handle_action(RawActionEvent::new("g1", "u1", ActionKind::MessageBlocked, "spam"))
            .await
            .unwrap();

        pipeline.shutdown().await;
        assert_eq!(alerts.all_alerts().len(), 1);
        assert_eq!(pipeline.stats().await.correlator.open_incidents, 0);
    }

    #[tokio::test]
    async fn test_failed_start_leaves_nothing_running() {
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::new());
        let config = Config {
            sweep: SweepSettings {
                enabled: true,
                interval_secs: 0,
            },
            ..Config::default()
        };
        let caches = ActivityCaches::new(&config.caches, Arc::clone(&clock));
        let pipeline = ModerationPipeline::new(
            &config,
            Arc::new(StaticPlatformClient::new()),
            Arc::new(InMemoryAlertSystem::new(caches.clone())),
            caches,
            clock,
        );

        assert!(matches!(
            pipeline.start().await,
            Err(AppError::Configuration(_))
        ));
        assert!(pipeline.tasks.lock().await.is_empty());

        // A failed start does not count as started
        assert!(matches!(
            pipeline.start().await,
            Err(AppError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn test_start_twice_fails() {
        let (pipeline, _) = pipeline(&ManualClock::new());
        pipeline.start().await.unwrap();
        assert!(matches!(
            pipeline.start().await,
            Err(AppError::InvalidStateTransition(_))
        ));
        pipeline.shutdown().await;
    }
}
