// orchestrator.rs
use chrono::{DateTime, Utc};
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, trace, warn};

use crate::channel::MessagingClient;
use crate::config::Settings;
use crate::models::chat::{ChannelId, ChatMessage, InboundMessage, UserId};
use crate::utils::error::{CompletionError, ExchangeFailure};

use super::gate::EngagementGate;
use super::store::SessionStore;
use super::typing::TypingIndicator;
use super::types::{EngagementReason, ExchangeOutcome};

/// Sent when a user engages again before their cooldown has elapsed
pub const COOLDOWN_NOTICE: &str = "Please wait a bit before chatting again!";

/// Trait for the completion service
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(
        &self,
        model: &str,
        messages: &[ChatMessage],
    ) -> Result<String, CompletionError>;
}

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub model: String,
    /// Loaded once at startup, never mutated
    pub system_message: String,
    pub cooldown: Duration,
    pub continuation_window: Duration,
    pub typing_interval: Duration,
    /// Empty = all channels
    pub allowed_channel_ids: Vec<ChannelId>,
}

impl OrchestratorConfig {
    pub fn from_settings(settings: &Settings, system_message: String) -> Self {
        Self {
            model: settings.llm.model.clone(),
            system_message,
            cooldown: settings.session.cooldown(),
            continuation_window: settings.session.continuation_window(),
            typing_interval: settings.session.typing_interval(),
            allowed_channel_ids: settings.discord.allowed_channel_ids.clone(),
        }
    }
}

/// Per-message control flow.
///
/// Gating → cooldown check → prompt assembly → completion → commit or fail.
/// Session state only changes on the commit path, and only while the
/// user's exchange lock is held.
pub struct SessionOrchestrator {
    store: Arc<SessionStore>,
    gate: EngagementGate,
    completion: Arc<dyn CompletionProvider>,
    messaging: Arc<dyn MessagingClient>,
    config: OrchestratorConfig,
}

impl SessionOrchestrator {
    pub fn new(
        store: Arc<SessionStore>,
        completion: Arc<dyn CompletionProvider>,
        messaging: Arc<dyn MessagingClient>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            store,
            gate: EngagementGate::new(config.continuation_window),
            completion,
            messaging,
            config,
        }
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    pub async fn handle_message(&self, message: &InboundMessage) -> ExchangeOutcome {
        let Some(reason) = self.admit(message, Utc::now()) else {
            trace!("Message {} not admitted", message.message_id);
            return ExchangeOutcome::Skipped;
        };

        info!(
            "Initiating conversation with user: {} (ID: {}) reason={:?}",
            message.author_name, message.author_id, reason
        );

        // Held until the exchange ends, on every path
        let _exclusive = self.store.lock_user(message.author_id).await;

        if self.store.cooldowns().is_on_cooldown(message.author_id) {
            info!(
                "Cooldown enforced for user: {} (ID: {})",
                message.author_name, message.author_id
            );
            if let Err(e) = self
                .messaging
                .send_message(message.channel_id, COOLDOWN_NOTICE)
                .await
            {
                warn!("Failed to send cooldown notice: {}", e);
            }
            return ExchangeOutcome::CooldownActive;
        }

        let result = AssertUnwindSafe(self.run_exchange(message))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(ExchangeFailure::Unexpected(panic_message(&*panic))));

        match result {
            Ok(()) => ExchangeOutcome::Replied { reason },
            Err(failure) => {
                error!(
                    "Exchange failed for user: {} (ID: {}). Error: {}",
                    message.author_name, message.author_id, failure
                );
                if let Err(e) = self
                    .messaging
                    .send_message(message.channel_id, failure.user_message())
                    .await
                {
                    warn!("Failed to send error notice: {}", e);
                }
                ExchangeOutcome::Failed(failure)
            }
        }
    }

    /// Pre-filter plus engagement gate. No side effects.
    fn admit(&self, message: &InboundMessage, now: DateTime<Utc>) -> Option<EngagementReason> {
        let bot_id = self.messaging.bot_user_id();

        if message.author_is_bot || message.author_id == bot_id {
            return None;
        }

        if !self.config.allowed_channel_ids.is_empty()
            && !self.config.allowed_channel_ids.contains(&message.channel_id)
        {
            trace!("Channel {} not in allow-list", message.channel_id);
            return None;
        }

        let record = self.store.interactions().get(message.author_id);
        self.gate.evaluate(
            message.channel_id,
            message.mentions_user(bot_id),
            message.is_reply_to(bot_id),
            &record,
            now,
        )
    }

    /// `[system] + history + [current user message]`
    pub fn assemble_prompt(&self, user_id: UserId, content: &str) -> Vec<ChatMessage> {
        let history = self.store.cache().read(user_id);

        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(ChatMessage::system(self.config.system_message.as_str()));
        messages.extend(history);
        messages.push(ChatMessage::user(content));
        messages
    }

    async fn run_exchange(&self, message: &InboundMessage) -> Result<(), ExchangeFailure> {
        let prompt = self.assemble_prompt(message.author_id, &message.content);
        debug!(
            "Assembled prompt with {} messages for user {}",
            prompt.len(),
            message.author_id
        );

        let typing = TypingIndicator::start(
            self.messaging.clone(),
            message.channel_id,
            self.config.typing_interval,
        );
        let completion = self.completion.complete(&self.config.model, &prompt).await;
        typing.stop();

        let reply = completion?;
        if reply.trim().is_empty() {
            return Err(CompletionError::MalformedResponse("empty completion".to_string()).into());
        }

        self.messaging
            .send_message(message.channel_id, &reply)
            .await
            .map_err(|e| ExchangeFailure::Dispatch(e.to_string()))?;

        self.commit(message, reply);
        Ok(())
    }

    fn commit(&self, message: &InboundMessage, reply: String) {
        let user_id = message.author_id;

        let evicted = self.store.cache().append_exchange(
            user_id,
            ChatMessage::user(message.content.as_str()),
            ChatMessage::assistant(reply),
        );
        for turn in evicted {
            info!(
                "Removed oldest cached message for user: {} (ID: {}). Message: {}",
                message.author_name, user_id, turn.content
            );
        }

        self.store
            .cooldowns()
            .start_cooldown(user_id, self.config.cooldown);
        self.store
            .interactions()
            .record(user_id, Utc::now(), message.channel_id);
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        format!("panic: {}", msg)
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        format!("panic: {}", msg)
    } else {
        "panic".to_string()
    }
}
