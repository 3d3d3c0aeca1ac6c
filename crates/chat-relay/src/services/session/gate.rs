use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::time::Duration;

use super::types::{EngagementReason, InteractionRecord};
use crate::models::chat::ChannelId;

/// Decides whether an inbound message gets an automated reply.
///
/// Pure: the same inputs always give the same answer.
#[derive(Debug, Clone, Copy)]
pub struct EngagementGate {
    continuation_window: ChronoDuration,
}

impl EngagementGate {
    pub fn new(continuation_window: Duration) -> Self {
        Self {
            continuation_window: ChronoDuration::from_std(continuation_window)
                .unwrap_or(ChronoDuration::MAX),
        }
    }

    pub fn should_engage(
        &self,
        channel_id: ChannelId,
        is_mentioned: bool,
        is_reply_to_bot: bool,
        record: &InteractionRecord,
        now: DateTime<Utc>,
    ) -> bool {
        self.evaluate(channel_id, is_mentioned, is_reply_to_bot, record, now)
            .is_some()
    }

    /// Same decision as [`should_engage`](Self::should_engage), with the
    /// first matching reason.
    pub fn evaluate(
        &self,
        channel_id: ChannelId,
        is_mentioned: bool,
        is_reply_to_bot: bool,
        record: &InteractionRecord,
        now: DateTime<Utc>,
    ) -> Option<EngagementReason> {
        if is_mentioned {
            return Some(EngagementReason::Mentioned);
        }
        if is_reply_to_bot {
            return Some(EngagementReason::ReplyToBot);
        }
        if self.is_continuation(channel_id, record, now) {
            return Some(EngagementReason::Continuation);
        }
        None
    }

    /// Continuation is channel-scoped and the window edge is inclusive
    fn is_continuation(
        &self,
        channel_id: ChannelId,
        record: &InteractionRecord,
        now: DateTime<Utc>,
    ) -> bool {
        let Some(last_time) = record.last_time else {
            return false;
        };
        let within_window = now.signed_duration_since(last_time) <= self.continuation_window;
        let same_channel = record.last_channel == Some(channel_id);
        within_window && same_channel
    }
}
