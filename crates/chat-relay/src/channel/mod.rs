//! Messaging platform adapters

pub mod discord;
pub mod traits;

pub use discord::DiscordChannel;
pub use traits::MessagingClient;
