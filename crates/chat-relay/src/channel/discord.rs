//! Discord gateway listener and REST client.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use reqwest::Client;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, error, info, trace, warn};

use super::traits::MessagingClient;
use crate::config::DiscordConfig;
use crate::models::chat::{ChannelId, InboundMessage, UserId};
use crate::utils::text_split::split_message;

pub const DISCORD_API_BASE: &str = "https://discord.com/api/v10";

/// GUILDS | GUILD_MESSAGES | DIRECT_MESSAGES | MESSAGE_CONTENT
pub const GATEWAY_INTENTS: u64 = (1 << 0) | (1 << 9) | (1 << 12) | (1 << 15);

const DEFAULT_HEARTBEAT_MS: u64 = 41_250;
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

mod opcode {
    pub const DISPATCH: u64 = 0;
    pub const HEARTBEAT: u64 = 1;
    pub const IDENTIFY: u64 = 2;
    pub const RECONNECT: u64 = 7;
    pub const INVALID_SESSION: u64 = 9;
    pub const HELLO: u64 = 10;
    pub const HEARTBEAT_ACK: u64 = 11;
}

pub struct DiscordChannel {
    config: DiscordConfig,
    client: Client,
    api_base: String,
    bot_user_id: AtomicU64,
}

impl DiscordChannel {
    pub fn new(config: DiscordConfig) -> Self {
        Self::with_api_base(config, DISCORD_API_BASE)
    }

    pub fn with_api_base(config: DiscordConfig, api_base: impl Into<String>) -> Self {
        Self {
            config,
            client: Client::new(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            bot_user_id: AtomicU64::new(0),
        }
    }

    fn auth_header(&self) -> String {
        format!("Bot {}", self.config.bot_token)
    }

    /// Resolve the bot's own identity. Must run before messages are handled,
    /// otherwise mention and reply detection cannot match anything.
    pub async fn init(&self) -> Result<UserId> {
        let resp = self
            .client
            .get(format!("{}/users/@me", self.api_base))
            .header("Authorization", self.auth_header())
            .send()
            .await
            .context("Failed to reach Discord API")?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            bail!("Discord identity lookup failed ({}): {}", status, body);
        }

        let body: Value = resp.json().await?;
        let id = body["id"]
            .as_str()
            .and_then(|s| s.parse::<UserId>().ok())
            .context("Missing 'id' in /users/@me response")?;
        let name = body["username"].as_str().unwrap_or("unknown");

        self.bot_user_id.store(id, Ordering::SeqCst);
        info!("Logged in as {} (ID: {})", name, id);
        Ok(id)
    }

    async fn fetch_gateway_url(&self) -> Result<String> {
        let resp = self
            .client
            .get(format!("{}/gateway/bot", self.api_base))
            .header("Authorization", self.auth_header())
            .send()
            .await
            .context("Failed to get Discord gateway URL")?;

        let body: Value = resp.json().await?;
        let url = body["url"]
            .as_str()
            .context("Missing 'url' in gateway response")?;
        Ok(format!("{}/?v=10&encoding=json", url))
    }

    /// Keep a gateway session alive until `tx` is closed.
    pub async fn run(&self, tx: mpsc::Sender<InboundMessage>) {
        while !tx.is_closed() {
            match self.listen(&tx).await {
                Ok(()) => info!("Discord gateway session ended, reconnecting"),
                Err(e) => error!("Discord gateway error: {:#}", e),
            }
            if tx.is_closed() {
                break;
            }
            tokio::time::sleep(RECONNECT_DELAY).await;
        }
        debug!("Discord listener stopped");
    }

    /// One gateway session. Returns when Discord asks us to reconnect or
    /// the socket closes.
    pub async fn listen(&self, tx: &mpsc::Sender<InboundMessage>) -> Result<()> {
        let url = self.fetch_gateway_url().await?;
        let (ws_stream, _) = tokio_tungstenite::connect_async(url.as_str())
            .await
            .context("Discord WebSocket connect failed")?;
        info!("Connected to Discord gateway");

        let (mut ws_write, mut ws_read) = ws_stream.split();

        let heartbeat_ms = match ws_read.next().await {
            Some(Ok(msg)) => {
                let payload: Value =
                    serde_json::from_str(msg.to_text().unwrap_or("{}")).unwrap_or_default();
                if payload["op"].as_u64() == Some(opcode::HELLO) {
                    payload["d"]["heartbeat_interval"]
                        .as_u64()
                        .unwrap_or(DEFAULT_HEARTBEAT_MS)
                } else {
                    warn!("Expected Hello (op 10), got op {}", payload["op"]);
                    DEFAULT_HEARTBEAT_MS
                }
            }
            Some(Err(e)) => bail!("Discord WebSocket error before Hello: {}", e),
            None => bail!("No Hello from Discord gateway"),
        };
        debug!("Discord heartbeat interval: {}ms", heartbeat_ms);

        let identify = json!({
            "op": opcode::IDENTIFY,
            "d": {
                "token": self.config.bot_token,
                "intents": GATEWAY_INTENTS,
                "properties": {
                    "os": std::env::consts::OS,
                    "browser": "chat-relay",
                    "device": "chat-relay"
                }
            }
        });
        ws_write
            .send(WsMessage::Text(identify.to_string().into()))
            .await
            .context("Failed to send Identify")?;

        let mut sequence: Option<u64> = None;
        let mut heartbeat = tokio::time::interval(Duration::from_millis(heartbeat_ms));
        // First tick fires immediately
        heartbeat.tick().await;

        loop {
            tokio::select! {
                _ = heartbeat.tick() => {
                    let beat = json!({ "op": opcode::HEARTBEAT, "d": sequence });
                    ws_write
                        .send(WsMessage::Text(beat.to_string().into()))
                        .await
                        .context("Discord heartbeat failed")?;
                    trace!("Heartbeat sent (seq {:?})", sequence);
                }
                frame = ws_read.next() => {
                    let msg = match frame {
                        Some(Ok(m)) => m,
                        Some(Err(e)) => bail!("Discord WebSocket error: {}", e),
                        None => return Ok(()),
                    };

                    if let WsMessage::Close(frame) = &msg {
                        info!("Discord gateway closed: {:?}", frame);
                        return Ok(());
                    }

                    let Ok(text) = msg.to_text() else { continue };
                    let Ok(payload) = serde_json::from_str::<Value>(text) else { continue };

                    if let Some(s) = payload["s"].as_u64() {
                        sequence = Some(s);
                    }

                    match payload["op"].as_u64() {
                        Some(opcode::DISPATCH) => {
                            let event = payload["t"].as_str().unwrap_or_default();
                            if event == "READY" {
                                info!("Discord session ready");
                                continue;
                            }
                            if event != "MESSAGE_CREATE" {
                                continue;
                            }
                            let Some(inbound) = parse_message_create(&payload["d"]) else {
                                continue;
                            };
                            if tx.send(inbound).await.is_err() {
                                debug!("Inbound message channel closed");
                                return Ok(());
                            }
                        }
                        Some(opcode::HEARTBEAT) => {
                            let beat = json!({ "op": opcode::HEARTBEAT, "d": sequence });
                            ws_write
                                .send(WsMessage::Text(beat.to_string().into()))
                                .await
                                .context("Discord heartbeat failed")?;
                        }
                        Some(opcode::RECONNECT) => {
                            info!("Discord requested reconnect");
                            return Ok(());
                        }
                        Some(opcode::INVALID_SESSION) => {
                            warn!("Discord session invalidated");
                            return Ok(());
                        }
                        Some(opcode::HEARTBEAT_ACK) => trace!("Heartbeat ACK"),
                        other => trace!("Unhandled gateway op {:?}", other),
                    }
                }
            }
        }
    }
}

fn parse_id(value: &Value) -> Option<u64> {
    value.as_str()?.parse().ok()
}

/// Build an [`InboundMessage`] from a MESSAGE_CREATE payload.
///
/// Returns `None` when required ids are missing or the message has no text.
pub fn parse_message_create(data: &Value) -> Option<InboundMessage> {
    let content = data["content"].as_str().unwrap_or_default();
    if content.is_empty() {
        return None;
    }

    let author = &data["author"];
    let mentions = data["mentions"]
        .as_array()
        .map(|users| users.iter().filter_map(|u| parse_id(&u["id"])).collect())
        .unwrap_or_default();

    Some(InboundMessage {
        message_id: parse_id(&data["id"])?,
        author_id: parse_id(&author["id"])?,
        author_name: author["username"].as_str().unwrap_or_default().to_string(),
        author_is_bot: author["bot"].as_bool().unwrap_or(false),
        channel_id: parse_id(&data["channel_id"])?,
        content: content.to_string(),
        mentions,
        reply_target_author: parse_id(&data["referenced_message"]["author"]["id"]),
    })
}

#[async_trait]
impl MessagingClient for DiscordChannel {
    fn bot_user_id(&self) -> UserId {
        self.bot_user_id.load(Ordering::SeqCst)
    }

    async fn send_message(&self, channel_id: ChannelId, text: &str) -> Result<()> {
        let url = format!("{}/channels/{}/messages", self.api_base, channel_id);

        for chunk in split_message(text, self.config.message_limit) {
            let resp = self
                .client
                .post(&url)
                .header("Authorization", self.auth_header())
                .json(&json!({ "content": chunk }))
                .send()
                .await
                .context("Failed to send Discord message")?;

            if !resp.status().is_success() {
                let status = resp.status();
                let body = resp.text().await.unwrap_or_default();
                bail!("Discord send failed ({}): {}", status, body);
            }
        }
        Ok(())
    }

    async fn signal_typing(&self, channel_id: ChannelId) -> Result<()> {
        let resp = self
            .client
            .post(format!("{}/channels/{}/typing", self.api_base, channel_id))
            .header("Authorization", self.auth_header())
            .send()
            .await
            .context("Failed to send typing indicator")?;

        if !resp.status().is_success() {
            bail!("Discord typing failed ({})", resp.status());
        }
        Ok(())
    }
}
