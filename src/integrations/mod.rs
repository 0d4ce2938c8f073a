//! Interfaces to the collaborators the pipeline depends on: the chat platform
//! client and the persistent alert system.

use async_trait::async_trait;
use dashmap::DashMap;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::{Alert, AlertKind, AlertSeverity, NewAlert};

/// Metadata lookups against the chat platform
#[async_trait]
pub trait PlatformClient: Send + Sync + 'static {
    /// Display name of a guild member
    async fn resolve_member_name(&self, guild_id: &str, user_id: &str) -> Result<String>;

    /// Display name of a channel
    async fn resolve_channel_name(&self, channel_id: &str) -> Result<String>;

    /// Guilds the bot is currently in
    async fn guild_ids(&self) -> Result<Vec<String>>;
}

/// Persistent alert store and its detection routines
#[async_trait]
pub trait AlertSystem: Send + Sync + 'static {
    async fn create_alert(
        &self,
        kind: AlertKind,
        severity: AlertSeverity,
        request: NewAlert,
    ) -> Result<Alert>;

    async fn get_active_alerts(&self, guild_id: &str) -> Result<Vec<Alert>>;

    async fn resolve_alert(&self, alert_id: Uuid, resolved_by: &str) -> Result<Alert>;

    /// Returns the number of alerts raised
    async fn detect_verification_issues(&self, guild_id: &str) -> Result<usize>;

    /// Returns the number of alerts raised
    async fn detect_security_violations(&self, guild_id: &str) -> Result<usize>;

    /// Returns the number of alerts raised
    async fn detect_anomalous_activity(&self, guild_id: &str) -> Result<usize>;
}

/// Platform client backed by in-memory name tables.
///
/// Used by the standalone binary and tests; unknown ids fail resolution.
#[derive(Debug, Default)]
pub struct StaticPlatformClient {
    members: DashMap<(String, String), String>,
    channels: DashMap<String, String>,
    guilds: DashMap<String, ()>,
}

impl StaticPlatformClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_guild(self, guild_id: impl Into<String>) -> Self {
        self.add_guild(guild_id);
        self
    }

    pub fn add_guild(&self, guild_id: impl Into<String>) {
        self.guilds.insert(guild_id.into(), ());
    }

    pub fn add_member(
        &self,
        guild_id: impl Into<String>,
        user_id: impl Into<String>,
        name: impl Into<String>,
    ) {
        let guild_id = guild_id.into();
        self.add_guild(guild_id.clone());
        self.members.insert((guild_id, user_id.into()), name.into());
    }

    pub fn add_channel(&self, channel_id: impl Into<String>, name: impl Into<String>) {
        self.channels.insert(channel_id.into(), name.into());
    }
}

#[async_trait]
impl PlatformClient for StaticPlatformClient {
    async fn resolve_member_name(&self, guild_id: &str, user_id: &str) -> Result<String> {
        self.members
            .get(&(guild_id.to_string(), user_id.to_string()))
            .map(|name| name.clone())
            .ok_or_else(|| AppError::Resolution {
                target: "member".to_string(),
                message: format!("unknown member {} in guild {}", user_id, guild_id),
            })
    }

    async fn resolve_channel_name(&self, channel_id: &str) -> Result<String> {
        self.channels
            .get(channel_id)
            .map(|name| name.clone())
            .ok_or_else(|| AppError::Resolution {
                target: "channel".to_string(),
                message: format!("unknown channel {}", channel_id),
            })
    }

    async fn guild_ids(&self) -> Result<Vec<String>> {
        let mut guilds: Vec<String> = self.guilds.iter().map(|g| g.key().clone()).collect();
        guilds.sort();
        Ok(guilds)
    }
}
