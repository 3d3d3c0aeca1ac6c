use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tracing::debug;

use super::types::InteractionRecord;
use crate::models::chat::{ChannelId, UserId};

/// Remembers where and when each user last had an engaged exchange
#[derive(Default)]
pub struct InteractionTracker {
    records: DashMap<UserId, InteractionRecord>,
}

impl InteractionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite the user's record
    pub fn record(&self, user_id: UserId, time: DateTime<Utc>, channel_id: ChannelId) {
        self.records
            .insert(user_id, InteractionRecord::new(time, channel_id));
        debug!("Recorded interaction for user {} in channel {}", user_id, channel_id);
    }

    /// The user's record, or the "never interacted" default.
    /// Lookups never create entries.
    pub fn get(&self, user_id: UserId) -> InteractionRecord {
        self.records
            .get(&user_id)
            .map(|r| *r.value())
            .unwrap_or_else(InteractionRecord::never)
    }

    /// Number of users with a record
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True if no user has interacted yet
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
