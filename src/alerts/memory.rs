use async_trait::async_trait;
use chrono::Duration as ChronoDuration;
use dashmap::DashMap;
use serde_json::json;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;
use validator::Validate;

use crate::alerts::publisher::truncate_content;
use crate::clock::SystemClock;
use crate::config::CacheSettings;
use crate::error::{AppError, Result};
use crate::integrations::AlertSystem;
use crate::models::{Alert, AlertKind, AlertSeverity, NewAlert};
use crate::state::ActivityCaches;

/// Limits used by the built-in detectors
#[derive(Debug, Clone)]
pub struct DetectorThresholds {
    /// Accounts younger than this are flagged on join
    pub new_account_age: ChronoDuration,
    /// Distinct channels the same message must reach
    pub cross_channel_min: usize,
    /// Joins within the join cache retention that indicate a raid
    pub raid_join_threshold: usize,
}

impl Default for DetectorThresholds {
    fn default() -> Self {
        Self {
            new_account_age: ChronoDuration::days(7),
            cross_channel_min: 3,
            raid_join_threshold: 10,
        }
    }
}

/// Alert system that keeps alerts in memory and runs its detectors over the
/// shared activity caches
pub struct InMemoryAlertSystem {
    alerts: DashMap<Uuid, Alert>,
    caches: ActivityCaches,
    thresholds: DetectorThresholds,
}

impl InMemoryAlertSystem {
    pub fn new(caches: ActivityCaches) -> Self {
        Self {
            alerts: DashMap::new(),
            caches,
            thresholds: DetectorThresholds::default(),
        }
    }

    pub fn with_thresholds(mut self, thresholds: DetectorThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn caches(&self) -> &ActivityCaches {
        &self.caches
    }

    /// Every alert, oldest first
    pub fn all_alerts(&self) -> Vec<Alert> {
        let mut alerts: Vec<Alert> = self.alerts.iter().map(|a| a.value().clone()).collect();
        alerts.sort_by_key(|a| a.created_at);
        alerts
    }

    fn has_active<F>(&self, guild_id: &str, kind: AlertKind, predicate: F) -> bool
    where
        F: Fn(&Alert) -> bool,
    {
        self.alerts.iter().any(|entry| {
            let alert = entry.value();
            alert.guild_id == guild_id && alert.kind == kind && alert.is_active() && predicate(alert)
        })
    }
}

impl Default for InMemoryAlertSystem {
    fn default() -> Self {
        Self::new(ActivityCaches::new(
            &CacheSettings::default(),
            Arc::new(SystemClock::new()),
        ))
    }
}

#[async_trait]
impl AlertSystem for InMemoryAlertSystem {
    async fn create_alert(
        &self,
        kind: AlertKind,
        severity: AlertSeverity,
        request: NewAlert,
    ) -> Result<Alert> {
        request.validate()?;

        let alert = Alert::new(kind, severity, request);
        debug!(
            alert_id = %alert.id,
            guild_id = %alert.guild_id,
            kind = %kind,
            severity = %severity,
            "Stored alert"
        );
        self.alerts.insert(alert.id, alert.clone());
        Ok(alert)
    }

    async fn get_active_alerts(&self, guild_id: &str) -> Result<Vec<Alert>> {
        let mut alerts: Vec<Alert> = self
            .alerts
            .iter()
            .filter(|a| a.guild_id == guild_id && a.is_active())
            .map(|a| a.value().clone())
            .collect();
        alerts.sort_by_key(|a| a.created_at);
        Ok(alerts)
    }

    async fn resolve_alert(&self, alert_id: Uuid, resolved_by: &str) -> Result<Alert> {
        let mut alert = self
            .alerts
            .get_mut(&alert_id)
            .ok_or_else(|| AppError::NotFound(format!("Alert {} not found", alert_id)))?;
        alert.resolve(resolved_by)?;
        info!(alert_id = %alert_id, resolved_by = resolved_by, "Alert resolved");
        Ok(alert.clone())
    }

    async fn detect_verification_issues(&self, guild_id: &str) -> Result<usize> {
        let max_age = self.thresholds.new_account_age;
        let fresh = self
            .caches
            .joins
            .fresh_values(|(guild, _), join| guild == guild_id && join.account_age() < max_age);

        if fresh.is_empty() || self.has_active(guild_id, AlertKind::Verification, |_| true) {
            return Ok(0);
        }

        let mut users: Vec<&str> = fresh.iter().map(|j| j.user_id.as_str()).collect();
        users.sort_unstable();

        self.create_alert(
            AlertKind::Verification,
            AlertSeverity::Low,
            NewAlert {
                title: "New accounts joining".to_string(),
                description: format!(
                    "{} account(s) younger than {} days joined recently",
                    fresh.len(),
                    max_age.num_days()
                ),
                guild_id: guild_id.to_string(),
                data: json!({ "users": users, "count": fresh.len() }),
            },
        )
        .await?;
        Ok(1)
    }

    async fn detect_security_violations(&self, guild_id: &str) -> Result<usize> {
        let messages = self
            .caches
            .messages
            .fresh_values(|_, message| message.guild_id == guild_id);

        // (author, content) -> channels it was posted in
        let mut spread: BTreeMap<(String, String), BTreeSet<String>> = BTreeMap::new();
        for message in messages {
            let content = message.content.trim();
            if content.is_empty() {
                continue;
            }
            spread
                .entry((message.author_id.clone(), content.to_string()))
                .or_default()
                .insert(message.channel_id.clone());
        }

        let mut raised = 0;
        for ((author_id, content), channels) in spread {
            if channels.len() < self.thresholds.cross_channel_min {
                continue;
            }
            let already_flagged = self.has_active(guild_id, AlertKind::Security, |alert| {
                alert.data["actor"]["id"] == author_id.as_str()
            });
            if already_flagged {
                continue;
            }

            self.create_alert(
                AlertKind::Security,
                AlertSeverity::High,
                NewAlert {
                    title: "Cross-channel spam".to_string(),
                    description: format!("Same message posted in {} channels", channels.len()),
                    guild_id: guild_id.to_string(),
                    data: json!({
                        "actor": { "id": author_id },
                        "content": truncate_content(&content, 200),
                        "channels": channels,
                    }),
                },
            )
            .await?;
            raised += 1;
        }

        Ok(raised)
    }

    async fn detect_anomalous_activity(&self, guild_id: &str) -> Result<usize> {
        let joins = self
            .caches
            .joins
            .fresh_values(|(guild, _), _| guild == guild_id);

        if joins.len() < self.thresholds.raid_join_threshold
            || self.has_active(guild_id, AlertKind::Raid, |_| true)
        {
            return Ok(0);
        }

        let window_minutes = self.caches.joins.retention().as_secs() / 60;
        self.create_alert(
            AlertKind::Raid,
            AlertSeverity::Critical,
            NewAlert {
                title: "Possible raid".to_string(),
                description: format!(
                    "{} members joined within {} minutes",
                    joins.len(),
                    window_minutes
                ),
                guild_id: guild_id.to_string(),
                data: json!({ "join_count": joins.len(), "window_minutes": window_minutes }),
            },
        )
        .await?;
        Ok(1)
    }
}
