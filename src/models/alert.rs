use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, Result};

/// Category of alert raised in a guild
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AlertKind {
    /// Coalesced auto-moderation incident
    Automod,
    /// New or unverified accounts joining
    Verification,
    /// Cross-channel content abuse
    Security,
    /// Join burst
    Raid,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AlertSeverity {
    Low,
    Medium,
    High,
    Critical,
}

/// Request body for creating an alert
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewAlert {
    #[validate(length(min = 1, max = 256))]
    pub title: String,

    #[validate(length(max = 4096))]
    pub description: String,

    #[validate(length(min = 1, max = 64))]
    pub guild_id: String,

    /// Structured payload
    pub data: serde_json::Value,
}

/// Alert as stored by the alert system
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub id: Uuid,
    pub kind: AlertKind,
    pub severity: AlertSeverity,
    pub title: String,
    pub description: String,
    pub guild_id: String,
    pub data: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub resolved: bool,
    pub resolved_by: Option<String>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Alert {
    pub fn new(kind: AlertKind, severity: AlertSeverity, request: NewAlert) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            severity,
            title: request.title,
            description: request.description,
            guild_id: request.guild_id,
            data: request.data,
            created_at: Utc::now(),
            resolved: false,
            resolved_by: None,
            resolved_at: None,
        }
    }

    pub fn is_active(&self) -> bool {
        !self.resolved
    }

    /// Mark the alert resolved
    pub fn resolve(&mut self, resolved_by: impl Into<String>) -> Result<()> {
        if self.resolved {
            return Err(AppError::InvalidStateTransition(format!(
                "alert {} is already resolved",
                self.id
            )));
        }
        self.resolved = true;
        self.resolved_by = Some(resolved_by.into());
        self.resolved_at = Some(Utc::now());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> NewAlert {
        NewAlert {
            title: "AutoMod action".to_string(),
            description: "Message blocked".to_string(),
            guild_id: "1".to_string(),
            data: serde_json::json!({}),
        }
    }

    #[test]
    fn test_alert_creation() {
        let alert = Alert::new(AlertKind::Automod, AlertSeverity::Medium, request());
        assert!(alert.is_active());
        assert_eq!(alert.kind.to_string(), "automod");
        assert_eq!(alert.severity.to_string(), "medium");
    }

    #[test]
    fn test_resolve_once() {
        let mut alert = Alert::new(AlertKind::Raid, AlertSeverity::Critical, request());
        alert.resolve("mod#1").unwrap();
        assert!(!alert.is_active());
        assert_eq!(alert.resolved_by.as_deref(), Some("mod#1"));
        assert!(matches!(
            alert.resolve("mod#2"),
            Err(AppError::InvalidStateTransition(_))
        ));
    }

    #[test]
    fn test_severity_ordering() {
        assert!(AlertSeverity::Critical > AlertSeverity::High);
        assert!(AlertSeverity::Medium > AlertSeverity::Low);
    }

    #[test]
    fn test_new_alert_validation() {
        let mut req = request();
        req.title = String::new();
        assert!(req.validate().is_err());
    }
}
