use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use validator::Validate;

/// Enforcement action the platform reports for an auto-moderation rule hit
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, EnumString, Display,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum ActionKind {
    MessageBlocked,
    WarningSent,
    TimeoutApplied,
    ContentBlocked,
}

impl ActionKind {
    /// Human-readable phrase used in alert descriptions
    pub fn phrase(&self) -> &'static str {
        match self {
            ActionKind::MessageBlocked => "Message blocked",
            ActionKind::WarningSent => "Warning sent",
            ActionKind::TimeoutApplied => "User timed out",
            ActionKind::ContentBlocked => "Content blocked",
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ActionKind::TimeoutApplied)
    }
}

/// One action-execution notification from the chat platform
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RawActionEvent {
    /// Guild the rule fired in
    #[validate(length(min = 1, max = 64))]
    pub guild_id: String,

    /// Member who triggered the rule
    #[validate(length(min = 1, max = 64))]
    pub actor_id: String,

    /// Action the platform took
    pub action: ActionKind,

    /// Channel the content was posted in, when the platform reports one
    #[serde(default)]
    pub channel_id: Option<String>,

    /// Content that matched the rule
    #[serde(default)]
    pub content: String,

    /// Timeout length, for timeout actions
    #[serde(default)]
    pub duration_secs: Option<u64>,
}

impl RawActionEvent {
    pub fn new(
        guild_id: impl Into<String>,
        actor_id: impl Into<String>,
        action: ActionKind,
        content: impl Into<String>,
    ) -> Self {
        Self {
            guild_id: guild_id.into(),
            actor_id: actor_id.into(),
            action,
            channel_id: None,
            content: content.into(),
            duration_secs: None,
        }
    }

    pub fn with_channel(mut self, channel_id: impl Into<String>) -> Self {
        self.channel_id = Some(channel_id.into());
        self
    }

    pub fn with_duration(mut self, duration_secs: u64) -> Self {
        self.duration_secs = Some(duration_secs);
        self
    }
}

/// A message posted in a guild, fed to the spam limiter and the message cache
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct MessageEvent {
    #[validate(length(min = 1, max = 64))]
    pub guild_id: String,

    #[validate(length(min = 1, max = 64))]
    pub author_id: String,

    pub channel_id: String,

    #[serde(default)]
    pub message_id: Option<String>,

    #[serde(default)]
    pub content: String,
}

impl MessageEvent {
    pub fn new(
        guild_id: impl Into<String>,
        author_id: impl Into<String>,
        channel_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            guild_id: guild_id.into(),
            author_id: author_id.into(),
            channel_id: channel_id.into(),
            message_id: None,
            content: content.into(),
        }
    }
}

/// A member joining a guild
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct MemberJoin {
    #[validate(length(min = 1, max = 64))]
    pub guild_id: String,

    #[validate(length(min = 1, max = 64))]
    pub user_id: String,

    /// When the joining account was registered
    pub account_created_at: DateTime<Utc>,

    #[serde(default = "Utc::now")]
    pub joined_at: DateTime<Utc>,
}

impl MemberJoin {
    pub fn new(
        guild_id: impl Into<String>,
        user_id: impl Into<String>,
        account_created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            guild_id: guild_id.into(),
            user_id: user_id.into(),
            account_created_at,
            joined_at: Utc::now(),
        }
    }

    /// Age of the account at join time
    pub fn account_age(&self) -> chrono::Duration {
        self.joined_at.signed_duration_since(self.account_created_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_action_kind_names() {
        assert_eq!(ActionKind::MessageBlocked.to_string(), "message-blocked");
        assert_eq!(ActionKind::WarningSent.to_string(), "warning-sent");
        assert_eq!(
            ActionKind::from_str("timeout-applied").unwrap(),
            ActionKind::TimeoutApplied
        );
        assert!(ActionKind::TimeoutApplied.is_timeout());
        assert!(!ActionKind::ContentBlocked.is_timeout());
    }

    #[test]
    fn test_raw_event_deserialization() {
        let json = r#"{"guild_id":"1","actor_id":"42","action":"content-blocked","content":"hi"}"#;
        let event: RawActionEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.action, ActionKind::ContentBlocked);
        assert!(event.channel_id.is_none());
        assert!(event.duration_secs.is_none());
    }

    #[test]
    fn test_raw_event_validation() {
        let event = RawActionEvent::new("", "42", ActionKind::MessageBlocked, "x");
        assert!(event.validate().is_err());

        let event = RawActionEvent::new("1", "42", ActionKind::MessageBlocked, "x");
        assert!(event.validate().is_ok());
    }

    #[test]
    fn test_member_join_account_age() {
        let created = Utc::now() - chrono::Duration::days(3);
        let join = MemberJoin::new("1", "7", created);
        assert!(join.account_age() >= chrono::Duration::days(3));
    }
}
