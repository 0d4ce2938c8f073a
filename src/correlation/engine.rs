use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use validator::Validate;

use crate::alerts::AlertPublisher;
use crate::clock::Clock;
use crate::config::CorrelationSettings;
use crate::correlation::debounce::DebounceQueue;
use crate::error::Result;
use crate::integrations::PlatformClient;
use crate::metrics::{EVENTS_DROPPED_TOTAL, INCIDENTS_OPENED_TOTAL, OPEN_INCIDENTS};
use crate::models::{IncidentKey, IncidentRecord, RawActionEvent};

/// Correlator tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrelatorConfig {
    /// Fixed delay from first sighting to finalization
    pub debounce: Duration,
    pub fingerprint_bytes: usize,
    pub content_preview_chars: usize,
}

impl Default for CorrelatorConfig {
    fn default() -> Self {
        CorrelationSettings::default().into()
    }
}

impl From<&CorrelationSettings> for CorrelatorConfig {
    fn from(settings: &CorrelationSettings) -> Self {
        Self {
            debounce: settings.debounce(),
            fingerprint_bytes: settings.fingerprint_bytes,
            content_preview_chars: settings.content_preview_chars,
        }
    }
}

impl From<CorrelationSettings> for CorrelatorConfig {
    fn from(settings: CorrelationSettings) -> Self {
        Self::from(&settings)
    }
}

/// Builder for CorrelatorConfig
pub struct CorrelatorConfigBuilder {
    config: CorrelatorConfig,
}

impl CorrelatorConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: CorrelatorConfig::default(),
        }
    }

    pub fn debounce(mut self, debounce: Duration) -> Self {
        self.config.debounce = debounce;
        self
    }

    pub fn fingerprint_bytes(mut self, bytes: usize) -> Self {
        self.config.fingerprint_bytes = bytes;
        self
    }

    pub fn content_preview_chars(mut self, chars: usize) -> Self {
        self.config.content_preview_chars = chars;
        self
    }

    pub fn build(self) -> CorrelatorConfig {
        self.config
    }
}

impl Default for CorrelatorConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// What `observe` did with an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObserveOutcome {
    /// First event for the key; a debounce deadline was scheduled
    Opened,
    /// New action kind appended to an open incident
    Merged,
    /// Action kind already recorded for the incident
    Duplicate,
    /// Incident already finalized; event discarded
    Dropped,
}

/// Point-in-time counters
#[derive(Debug, Clone, Serialize)]
pub struct CorrelatorStats {
    pub open_incidents: usize,
    pub pending_deadlines: usize,
}

/// Coalesces bursts of raw moderation events into one alert per incident.
///
/// Every key gets exactly one deadline, fixed at first sighting. A single
/// driver (`run`) finalizes keys as their deadlines pass.
pub struct EventCorrelator {
    config: CorrelatorConfig,
    records: Arc<DashMap<IncidentKey, IncidentRecord>>,
    deadlines: DebounceQueue,
    platform: Arc<dyn PlatformClient>,
    publisher: AlertPublisher,
    clock: Arc<dyn Clock>,
}

impl EventCorrelator {
    pub fn new(
        config: CorrelatorConfig,
        platform: Arc<dyn PlatformClient>,
        publisher: AlertPublisher,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            records: Arc::new(DashMap::new()),
            deadlines: DebounceQueue::new(),
            platform,
            publisher,
            clock,
        }
    }

    pub fn config(&self) -> &CorrelatorConfig {
        &self.config
    }

    /// Fold one raw event into its incident
    pub async fn observe(&self, event: RawActionEvent) -> Result<ObserveOutcome> {
        event.validate()?;

        let key = IncidentKey::for_event(&event, self.config.fingerprint_bytes);
        let now = self.clock.now();

        // The entry guard is the per-key lock; it is released at the end of the match.
        let outcome = match self.records.entry(key.clone()) {
            Entry::Occupied(mut occupied) => {
                let record = occupied.get_mut();
                if record.finalized {
                    ObserveOutcome::Dropped
                } else if record.add_action(event.action, event.duration_secs) {
                    ObserveOutcome::Merged
                } else {
                    ObserveOutcome::Duplicate
                }
            }
            Entry::Vacant(vacant) => {
                let record = vacant.insert(IncidentRecord::open(key.clone(), &event, now));
                self.deadlines
                    .schedule(key.clone(), record.deadline(self.config.debounce));
                ObserveOutcome::Opened
            }
        };

        match outcome {
            ObserveOutcome::Opened => {
                INCIDENTS_OPENED_TOTAL.inc();
                OPEN_INCIDENTS.inc();
                debug!(incident = %key, action = %event.action, "Opened incident");
                self.spawn_name_resolution(key, event.channel_id);
            }
            ObserveOutcome::Merged => {
                debug!(incident = %key, action = %event.action, "Merged action into incident");
            }
            ObserveOutcome::Duplicate => {}
            ObserveOutcome::Dropped => {
                EVENTS_DROPPED_TOTAL.inc();
                debug!(incident = %key, action = %event.action, "Dropped event for finalized incident");
            }
        }

        Ok(outcome)
    }

    /// Look up display names off the observe path. Results that arrive after
    /// finalization are discarded and the alert keeps its placeholders.
    fn spawn_name_resolution(&self, key: IncidentKey, channel_id: Option<String>) {
        let platform = Arc::clone(&self.platform);
        let records = Arc::clone(&self.records);

        tokio::spawn(async move {
            let member = platform.resolve_member_name(&key.guild_id, &key.actor_id);
            let channel = async {
                match channel_id.as_deref() {
                    Some(id) => Some(platform.resolve_channel_name(id).await),
                    None => None,
                }
            };
            let (member, channel) = tokio::join!(member, channel);

            let actor_name = match member {
                Ok(name) => Some(name),
                Err(e) => {
                    warn!(incident = %key, error = %e, "Failed to resolve actor name, using placeholder");
                    None
                }
            };
            let channel_name = match channel {
                Some(Ok(name)) => Some(name),
                Some(Err(e)) => {
                    warn!(incident = %key, error = %e, "Failed to resolve channel name, using placeholder");
                    None
                }
                None => None,
            };

            if let Some(mut record) = records.get_mut(&key) {
                if !record.finalized {
                    record.actor_name = actor_name;
                    record.channel_name = channel_name;
                }
            }
        });
    }

    /// Finalize every incident whose deadline has passed
    pub async fn finalize_due(&self) -> usize {
        let due = self.deadlines.pop_due(self.clock.now());
        if due.is_empty() {
            return 0;
        }
        let count = due.len();
        join_all(due.into_iter().map(|key| self.finalize(key))).await;
        count
    }

    /// Finalize every pending incident regardless of deadline
    pub async fn flush(&self) -> usize {
        let pending = self.deadlines.drain();
        let count = pending.len();
        join_all(pending.into_iter().map(|key| self.finalize(key))).await;
        count
    }

    async fn finalize(&self, key: IncidentKey) {
        // Mark and snapshot under the per-key lock so no append can slip in between.
        let snapshot = match self.records.get_mut(&key) {
            Some(mut record) if !record.finalized => {
                record.finalized = true;
                Some(record.clone())
            }
            _ => None,
        };

        if let Some(record) = snapshot {
            if record.actions.is_empty() {
                debug!(incident = %key, "Incident has no actions, nothing to publish");
            } else if let Err(e) = self.publisher.publish(&record).await {
                warn!(incident = %key, error = %e, "Incident lost after publish failure");
            }
        }

        if self.records.remove(&key).is_some() {
            OPEN_INCIDENTS.dec();
        }
    }

    /// Drive deadlines until shutdown, then flush what is still pending
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        info!(debounce_ms = self.config.debounce.as_millis() as u64, "Starting event correlator");

        loop {
            self.finalize_due().await;

            let next = self.deadlines.next_deadline();
            let wakeup = self.deadlines.notified();

            tokio::select! {
                _ = async {
                    match next {
                        Some(at) => tokio::time::sleep_until(at).await,
                        None => std::future::pending::<()>().await,
                    }
                } => {}
                _ = wakeup => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        let flushed = self.flush().await;
        info!(flushed = flushed, "Event correlator stopped");
    }

    pub fn stats(&self) -> CorrelatorStats {
        CorrelatorStats {
            open_incidents: self.records.len(),
            pending_deadlines: self.deadlines.len(),
        }
    }

    /// Snapshot of an open incident
    pub fn incident(&self, key: &IncidentKey) -> Option<IncidentRecord> {
        self.records.get(key).map(|r| r.clone())
    }
}
