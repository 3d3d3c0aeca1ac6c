pub mod settings;

pub use settings::{DiscordConfig, LlmConfig, ServerConfig, SessionConfig, Settings};
