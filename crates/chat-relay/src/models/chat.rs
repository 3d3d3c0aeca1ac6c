use serde::{Deserialize, Serialize};

/// Discord user snowflake
pub type UserId = u64;

/// Discord channel snowflake
pub type ChannelId = u64;

// ===== CONVERSATION TURNS =====

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One role-tagged turn. Stored in the rolling cache and sent as-is
/// in the completion request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

// ===== INBOUND EVENTS =====

/// A chat message as delivered by the messaging platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub message_id: u64,
    pub author_id: UserId,
    pub author_name: String,
    pub author_is_bot: bool,
    pub channel_id: ChannelId,
    pub content: String,
    /// Users explicitly mentioned in the message
    pub mentions: Vec<UserId>,
    /// Author of the referenced message when this is a reply
    pub reply_target_author: Option<UserId>,
}

impl InboundMessage {
    pub fn mentions_user(&self, user_id: UserId) -> bool {
        self.mentions.contains(&user_id)
    }

    pub fn is_reply_to(&self, user_id: UserId) -> bool {
        self.reply_target_author == Some(user_id)
    }
}
