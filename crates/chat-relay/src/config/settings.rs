use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::models::chat::ChannelId;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    pub discord: DiscordConfig,
    pub llm: LlmConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DiscordConfig {
    pub bot_token: String,
    /// Empty means every channel the bot can read
    #[serde(default)]
    pub allowed_channel_ids: Vec<ChannelId>,
    #[serde(default = "default_message_limit")]
    pub message_limit: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,
    pub api_key: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_llm_timeout")]
    pub timeout_seconds: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SessionConfig {
    /// Max turns (not exchanges) kept per user
    #[serde(default = "default_max_cache")]
    pub max_cache: usize,
    /// Seconds
    #[serde(default = "default_cooldown_time")]
    pub cooldown_time: u64,
    /// Seconds
    #[serde(default = "default_continuation_window")]
    pub continuation_window: u64,
    /// Seconds between typing signals
    #[serde(default = "default_typing_interval")]
    pub typing_interval: u64,
    #[serde(default = "default_system_message_file")]
    pub system_message_file: PathBuf,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_server_enabled")]
    pub enabled: bool,
    #[serde(default = "default_server_host")]
    pub host: String,
    #[serde(default = "default_server_port")]
    pub port: u16,
}

fn default_message_limit() -> usize {
    2000
}

fn default_llm_base_url() -> String {
    "https://api.openai.com".to_string()
}

fn default_model() -> String {
    "gpt-3.5-turbo-16k".to_string()
}

fn default_llm_timeout() -> u64 {
    120
}

fn default_max_cache() -> usize {
    5
}

fn default_cooldown_time() -> u64 {
    2
}

fn default_continuation_window() -> u64 {
    120
}

fn default_typing_interval() -> u64 {
    5
}

fn default_system_message_file() -> PathBuf {
    PathBuf::from("system_message.txt")
}

fn default_server_enabled() -> bool {
    true
}

fn default_server_host() -> String {
    "0.0.0.0".to_string()
}

fn default_server_port() -> u16 {
    8080
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_cache: default_max_cache(),
            cooldown_time: default_cooldown_time(),
            continuation_window: default_continuation_window(),
            typing_interval: default_typing_interval(),
            system_message_file: default_system_message_file(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enabled: default_server_enabled(),
            host: default_server_host(),
            port: default_server_port(),
        }
    }
}

impl SessionConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_time)
    }

    pub fn continuation_window(&self) -> Duration {
        Duration::from_secs(self.continuation_window)
    }

    pub fn typing_interval(&self) -> Duration {
        Duration::from_secs(self.typing_interval)
    }

    /// Read the system message. Called once at startup.
    pub fn load_system_message(&self) -> Result<String> {
        std::fs::read_to_string(&self.system_message_file).with_context(|| {
            format!(
                "Failed to read system message file {}",
                self.system_message_file.display()
            )
        })
    }
}

impl Settings {
    pub fn load() -> Result<Self> {
        // `.env.prod` takes priority over `.env`
        dotenvy::dotenv().ok();
        dotenvy::from_filename_override(".env.prod").ok();

        let config = Config::builder()
            .add_source(File::with_name("config/settings").required(false))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("discord.allowed_channel_ids")
                    .try_parsing(true),
            )
            .build()?;

        let settings: Settings = config.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.discord.bot_token.trim().is_empty() {
            anyhow::bail!("discord.bot_token must be set");
        }
        if self.llm.api_key.trim().is_empty() {
            anyhow::bail!("llm.api_key must be set");
        }
        if self.discord.message_limit == 0 {
            anyhow::bail!("discord.message_limit must be at least 1");
        }
        if self.session.max_cache == 0 {
            anyhow::bail!("session.max_cache must be at least 1");
        }
        if self.session.typing_interval == 0 {
            anyhow::bail!("session.typing_interval must be at least 1 second");
        }
        Ok(())
    }
}
