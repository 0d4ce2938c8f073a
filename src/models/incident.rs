use base64ct::{Base64, Encoding};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;

use super::event::{ActionKind, RawActionEvent};

pub const UNKNOWN_USER: &str = "Unknown User";
pub const UNKNOWN_CHANNEL: &str = "Unknown Channel";

/// Identity shared by every raw event describing one incident
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct IncidentKey {
    pub guild_id: String,
    pub actor_id: String,
    pub fingerprint: String,
}

impl IncidentKey {
    /// Build the key for an event, fingerprinting its first `fingerprint_bytes` bytes
    pub fn for_event(event: &RawActionEvent, fingerprint_bytes: usize) -> Self {
        Self {
            guild_id: event.guild_id.clone(),
            actor_id: event.actor_id.clone(),
            fingerprint: content_fingerprint(&event.content, fingerprint_bytes),
        }
    }
}

impl fmt::Display for IncidentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.guild_id, self.actor_id, self.fingerprint)
    }
}

/// Base64 of the first `max_bytes` bytes of the trimmed content.
///
/// Content sharing a prefix collides on purpose: a burst of near-identical
/// spam is one incident.
pub fn content_fingerprint(content: &str, max_bytes: usize) -> String {
    let bytes = content.trim().as_bytes();
    let end = bytes.len().min(max_bytes);
    Base64::encode_string(&bytes[..end])
}

/// One distinct enforcement action within an incident
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionEntry {
    pub kind: ActionKind,
    pub duration_secs: Option<u64>,
}

/// In-flight incident owned by the correlator until its debounce deadline
#[derive(Debug, Clone)]
pub struct IncidentRecord {
    pub key: IncidentKey,
    pub actor_name: Option<String>,
    pub channel_id: Option<String>,
    pub channel_name: Option<String>,
    pub content: String,
    pub actions: Vec<ActionEntry>,
    pub first_seen_at: Instant,
    pub first_seen_wall: DateTime<Utc>,
    pub finalized: bool,
}

impl IncidentRecord {
    /// Open a record from the first event of an incident
    pub fn open(key: IncidentKey, event: &RawActionEvent, now: Instant) -> Self {
        let mut record = Self {
            key,
            actor_name: None,
            channel_id: event.channel_id.clone(),
            channel_name: None,
            content: event.content.clone(),
            actions: Vec::new(),
            first_seen_at: now,
            first_seen_wall: Utc::now(),
            finalized: false,
        };
        record.add_action(event.action, event.duration_secs);
        record
    }

    /// Add an action unless one of the same kind is already recorded
    pub fn add_action(&mut self, kind: ActionKind, duration_secs: Option<u64>) -> bool {
        if self.actions.iter().any(|a| a.kind == kind) {
            return false;
        }
        self.actions.push(ActionEntry {
            kind,
            duration_secs,
        });
        true
    }

    /// When the incident finalizes. Fixed at the first event and never extended.
    pub fn deadline(&self, debounce: Duration) -> Instant {
        self.first_seen_at + debounce
    }

    pub fn has_timeout(&self) -> bool {
        self.actions.iter().any(|a| a.kind.is_timeout())
    }

    pub fn action_kinds(&self) -> Vec<ActionKind> {
        self.actions.iter().map(|a| a.kind).collect()
    }

    pub fn actor_display_name(&self) -> &str {
        self.actor_name.as_deref().unwrap_or(UNKNOWN_USER)
    }

    pub fn channel_display_name(&self) -> &str {
        self.channel_name.as_deref().unwrap_or(UNKNOWN_CHANNEL)
    }
}
