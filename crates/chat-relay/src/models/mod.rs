pub mod chat;

pub use chat::{ChannelId, ChatMessage, InboundMessage, Role, UserId};
