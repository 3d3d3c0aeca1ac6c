use chrono::{DateTime, Utc};

use crate::models::chat::ChannelId;
use crate::utils::error::ExchangeFailure;

/// Last engaged exchange of a user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InteractionRecord {
    /// None = never interacted
    pub last_time: Option<DateTime<Utc>>,
    pub last_channel: Option<ChannelId>,
}

impl InteractionRecord {
    pub fn new(last_time: DateTime<Utc>, last_channel: ChannelId) -> Self {
        Self {
            last_time: Some(last_time),
            last_channel: Some(last_channel),
        }
    }

    pub fn never() -> Self {
        Self::default()
    }

    pub fn has_interacted(&self) -> bool {
        self.last_time.is_some()
    }
}

/// Why the gate admitted a message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngagementReason {
    Mentioned,
    ReplyToBot,
    /// Same channel, within the continuation window
    Continuation,
}

/// Result of one pass through the orchestrator
#[derive(Debug)]
pub enum ExchangeOutcome {
    /// Not for us: bot author, channel not allowed, or gate declined
    Skipped,
    /// User still on cooldown; wait notice sent
    CooldownActive,
    /// Reply relayed and session state committed
    Replied { reason: EngagementReason },
    /// Exchange aborted, state untouched
    Failed(ExchangeFailure),
}

impl ExchangeOutcome {
    pub fn is_replied(&self) -> bool {
        matches!(self, ExchangeOutcome::Replied { .. })
    }
}

/// Session store counters for monitoring
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct SessionStats {
    pub cached_users: usize,
    pub users_on_cooldown: usize,
    pub tracked_users: usize,
}
