use std::sync::Arc;

use crate::clock::Clock;
use crate::config::CacheSettings;
use crate::models::{MemberJoin, MessageEvent};
use crate::state::cache::TimeWindowedCache;

/// Recent messages, keyed by message id
pub type MessageCache = TimeWindowedCache<String, MessageEvent>;

/// Recent joins, keyed by (guild id, user id)
pub type JoinCache = TimeWindowedCache<(String, String), MemberJoin>;

/// Message and join caches shared by the pipeline (writer), the alert
/// system detectors (readers) and the janitor (evictor)
#[derive(Clone)]
pub struct ActivityCaches {
    pub messages: Arc<MessageCache>,
    pub joins: Arc<JoinCache>,
}

impl ActivityCaches {
    pub fn new(settings: &CacheSettings, clock: Arc<dyn Clock>) -> Self {
        Self {
            messages: Arc::new(TimeWindowedCache::new(
                "message",
                settings.message_retention(),
                clock.clone(),
            )),
            joins: Arc::new(TimeWindowedCache::new(
                "join",
                settings.join_retention(),
                clock,
            )),
        }
    }

    pub fn record_message(&self, message: MessageEvent) {
        let key = message
            .message_id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        self.messages.insert(key, message);
    }

    pub fn record_join(&self, join: MemberJoin) {
        self.joins
            .insert((join.guild_id.clone(), join.user_id.clone()), join);
    }
}
