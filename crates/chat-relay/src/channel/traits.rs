//! Messaging platform seam.

use anyhow::Result;
use async_trait::async_trait;

use crate::models::chat::{ChannelId, UserId};

/// Outbound side of a chat platform as seen by the session subsystem.
///
/// Implementations own platform concerns such as message-size limits:
/// `send_message` accepts text of any length and splits it as needed.
#[async_trait]
pub trait MessagingClient: Send + Sync {
    /// The bot's own user id, for mention and reply detection
    fn bot_user_id(&self) -> UserId;

    /// Send text to a channel
    async fn send_message(&self, channel_id: ChannelId, text: &str) -> Result<()>;

    /// Show the "typing…" indicator in a channel
    async fn signal_typing(&self, channel_id: ChannelId) -> Result<()>;
}
