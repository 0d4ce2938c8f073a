use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info};
use validator::Validate;

use crate::correlation::classify::{classify_reason, describe_actions, severity_for};
use crate::error::{AppError, Result};
use crate::integrations::AlertSystem;
use crate::metrics::{ALERTS_PUBLISHED_TOTAL, ALERT_PUBLISH_FAILURES_TOTAL};
use crate::models::{Alert, AlertKind, AlertSeverity, IncidentRecord, NewAlert};

/// Per-action breakdown carried in the alert payload
#[derive(Debug, Clone, Serialize)]
pub struct ActionSummary {
    pub kind: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<u64>,
}

/// Turns finalized incidents into alert-store calls
#[derive(Clone)]
pub struct AlertPublisher {
    alerts: Arc<dyn AlertSystem>,
    content_preview_chars: usize,
}

impl AlertPublisher {
    pub fn new(alerts: Arc<dyn AlertSystem>, content_preview_chars: usize) -> Self {
        Self {
            alerts,
            content_preview_chars,
        }
    }

    /// Severity and request body for a finalized incident
    pub fn build_alert(&self, record: &IncidentRecord) -> (AlertSeverity, NewAlert) {
        let severity = severity_for(&record.actions);
        let actor_name = record.actor_display_name();

        let actions: Vec<ActionSummary> = record
            .actions
            .iter()
            .map(|a| ActionSummary {
                kind: a.kind.to_string(),
                description: a.kind.phrase().to_string(),
                duration_secs: a.duration_secs,
            })
            .collect();

        let data = json!({
            "actor": {
                "id": record.key.actor_id,
                "name": actor_name,
            },
            "content": truncate_content(&record.content, self.content_preview_chars),
            "channel": {
                "id": record.channel_id,
                "name": record.channel_display_name(),
            },
            "actions": actions,
            "action_count": record.actions.len(),
            "reason": classify_reason(&record.content),
            "fingerprint": record.key.fingerprint,
            "timestamp": record.first_seen_wall.to_rfc3339(),
        });

        let request = NewAlert {
            title: format!("AutoMod action: {}", actor_name),
            description: describe_actions(&record.actions),
            guild_id: record.key.guild_id.clone(),
            data,
        };

        (severity, request)
    }

    /// Publish one alert for the incident. Failures are logged and returned,
    /// never retried.
    pub async fn publish(&self, record: &IncidentRecord) -> Result<Alert> {
        let (severity, request) = self.build_alert(record);
        request.validate()?;

        match self
            .alerts
            .create_alert(AlertKind::Automod, severity, request)
            .await
        {
            Ok(alert) => {
                ALERTS_PUBLISHED_TOTAL
                    .with_label_values(&[severity.to_string().as_str()])
                    .inc();
                info!(
                    alert_id = %alert.id,
                    guild_id = %record.key.guild_id,
                    actor_id = %record.key.actor_id,
                    severity = %severity,
                    action_count = record.actions.len(),
                    "Published automod alert"
                );
                Ok(alert)
            }
            Err(e) => {
                ALERT_PUBLISH_FAILURES_TOTAL.inc();
                error!(
                    guild_id = %record.key.guild_id,
                    actor_id = %record.key.actor_id,
                    error = %e,
                    "Failed to publish automod alert"
                );
                Err(AppError::Publish(e.to_string()))
            }
        }
    }
}

/// At most `max_chars` characters, with an ellipsis when cut
pub fn truncate_content(content: &str, max_chars: usize) -> String {
    if content.chars().count() <= max_chars {
        return content.to_string();
    }
    let mut cut: String = content.chars().take(max_chars).collect();
    cut.push_str("...");
    cut
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::InMemoryAlertSystem;
    use crate::models::{ActionKind, IncidentKey, RawActionEvent};
    use tokio::time::Instant;

    fn record() -> IncidentRecord {
        let event = RawActionEvent::new("g1", "u1", ActionKind::MessageBlocked, "buy cheap stuff")
            .with_channel("c1");
        let key = IncidentKey::for_event(&event, 32);
        let mut record = IncidentRecord::open(key, &event, Instant::now());
        record.add_action(ActionKind::TimeoutApplied, Some(600));
        record.actor_name = Some("alice".to_string());
        record
    }

    #[test]
    fn test_truncate_content() {
        assert_eq!(truncate_content("short", 10), "short");
        assert_eq!(truncate_content("abcdef", 3), "abc...");
        // Multi-byte characters are never split
        assert_eq!(truncate_content("ééééé", 2), "éé...");
    }

    #[test]
    fn test_build_alert_payload() {
        let publisher = AlertPublisher::new(Arc::new(InMemoryAlertSystem::default()), 200);
        let (severity, request) = publisher.build_alert(&record());

        assert_eq!(severity, AlertSeverity::High);
        assert_eq!(request.title, "AutoMod action: alice");
        assert_eq!(request.description, "Message blocked, User timed out");
        assert_eq!(request.guild_id, "g1");

        let data = &request.data;
        assert_eq!(data["actor"]["id"], "u1");
        assert_eq!(data["channel"]["id"], "c1");
        assert_eq!(data["channel"]["name"], "Unknown Channel");
        assert_eq!(data["action_count"], 2);
        assert_eq!(data["reason"], "Spam content");
        assert_eq!(data["actions"][0]["kind"], "message-blocked");
        assert!(data["actions"][0].get("duration_secs").is_none());
        assert_eq!(data["actions"][1]["duration_secs"], 600);
    }

    #[tokio::test]
    async fn test_publish_creates_one_alert() {
        let store = Arc::new(InMemoryAlertSystem::default());
        let publisher = AlertPublisher::new(store.clone(), 200);

        let alert = publisher.publish(&record()).await.unwrap();
        assert_eq!(alert.kind, AlertKind::Automod);

        let active = store.get_active_alerts("g1").await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, alert.id);
    }
}
