//! End-to-end flows through the session orchestrator with in-process fakes
//! for the completion service and the chat platform.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chat_relay::channel::MessagingClient;
use chat_relay::models::{ChannelId, ChatMessage, InboundMessage, Role, UserId};
use chat_relay::services::session::{
    EngagementReason, ExchangeOutcome, OrchestratorConfig, COOLDOWN_NOTICE,
};
use chat_relay::services::{CompletionProvider, SessionOrchestrator, SessionStore};
use chat_relay::utils::CompletionError;

const BOT: UserId = 900;
const ALICE: UserId = 1;
const GENERAL: ChannelId = 10;
const RANDOM: ChannelId = 11;

/// Answers "reply N" for the N-th call, optionally after a delay
#[derive(Default)]
struct ScriptedCompletion {
    calls: AtomicUsize,
    delay: Duration,
    fail: bool,
}

#[async_trait]
impl CompletionProvider for ScriptedCompletion {
    async fn complete(
        &self,
        _model: &str,
        _messages: &[ChatMessage],
    ) -> Result<String, CompletionError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail {
            return Err(CompletionError::Api {
                status: 503,
                body: "overloaded".to_string(),
            });
        }
        Ok(format!("reply {n}"))
    }
}

#[derive(Default)]
struct FakeDiscord {
    sent: Mutex<Vec<(ChannelId, String)>>,
}

impl FakeDiscord {
    fn texts(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|(_, t)| t.clone())
            .collect()
    }
}

#[async_trait]
impl MessagingClient for FakeDiscord {
    fn bot_user_id(&self) -> UserId {
        BOT
    }

    async fn send_message(&self, channel_id: ChannelId, text: &str) -> Result<()> {
        self.sent
            .lock()
            .unwrap()
            .push((channel_id, text.to_string()));
        Ok(())
    }

    async fn signal_typing(&self, _channel_id: ChannelId) -> Result<()> {
        Ok(())
    }
}

struct Harness {
    orchestrator: Arc<SessionOrchestrator>,
    store: Arc<SessionStore>,
    discord: Arc<FakeDiscord>,
    completion: Arc<ScriptedCompletion>,
}

fn harness(max_cache: usize, cooldown: Duration, completion: ScriptedCompletion) -> Harness {
    let store = Arc::new(SessionStore::new(max_cache));
    let discord = Arc::new(FakeDiscord::default());
    let completion = Arc::new(completion);
    let config = OrchestratorConfig {
        model: "test-model".to_string(),
        system_message: "be brief".to_string(),
        cooldown,
        continuation_window: Duration::from_secs(120),
        typing_interval: Duration::from_secs(5),
        allowed_channel_ids: Vec::new(),
    };
    let orchestrator = Arc::new(SessionOrchestrator::new(
        store.clone(),
        completion.clone(),
        discord.clone(),
        config,
    ));
    Harness {
        orchestrator,
        store,
        discord,
        completion,
    }
}

fn message(id: u64, channel: ChannelId, content: &str, mention: bool) -> InboundMessage {
    InboundMessage {
        message_id: id,
        author_id: ALICE,
        author_name: "alice".to_string(),
        author_is_bot: false,
        channel_id: channel,
        content: content.to_string(),
        mentions: if mention { vec![BOT] } else { Vec::new() },
        reply_target_author: None,
    }
}

#[tokio::test]
async fn mention_starts_a_session() {
    let h = harness(5, Duration::from_secs(2), ScriptedCompletion::default());
    assert!(h.store.cache().read(ALICE).is_empty());

    let before = Utc::now();
    let outcome = h
        .orchestrator
        .handle_message(&message(1, GENERAL, "hello", true))
        .await;

    assert!(matches!(
        outcome,
        ExchangeOutcome::Replied {
            reason: EngagementReason::Mentioned
        }
    ));
    assert_eq!(
        h.store.cache().read(ALICE),
        vec![ChatMessage::user("hello"), ChatMessage::assistant("reply 1")]
    );
    assert!(h.store.cooldowns().is_on_cooldown(ALICE));

    let record = h.store.interactions().get(ALICE);
    assert_eq!(record.last_channel, Some(GENERAL));
    assert!(record.last_time.unwrap() >= before);
    assert_eq!(h.discord.texts(), vec!["reply 1".to_string()]);
}

#[tokio::test]
async fn plain_message_continues_in_same_channel() {
    let h = harness(5, Duration::from_secs(2), ScriptedCompletion::default());
    h.store
        .interactions()
        .record(ALICE, Utc::now() - ChronoDuration::seconds(30), GENERAL);

    let outcome = h
        .orchestrator
        .handle_message(&message(2, GENERAL, "hello", false))
        .await;

    assert!(matches!(
        outcome,
        ExchangeOutcome::Replied {
            reason: EngagementReason::Continuation
        }
    ));
}

#[tokio::test]
async fn plain_message_in_other_channel_is_ignored() {
    let h = harness(5, Duration::from_secs(2), ScriptedCompletion::default());
    h.store
        .interactions()
        .record(ALICE, Utc::now() - ChronoDuration::seconds(30), GENERAL);

    let outcome = h
        .orchestrator
        .handle_message(&message(2, RANDOM, "hello", false))
        .await;

    assert!(matches!(outcome, ExchangeOutcome::Skipped));
    assert_eq!(h.completion.calls.load(Ordering::SeqCst), 0);
    assert!(h.discord.texts().is_empty());
    assert!(h.store.cache().read(ALICE).is_empty());
}

#[tokio::test]
async fn cache_keeps_most_recent_turns() {
    // Zero cooldown so consecutive exchanges are not throttled
    let h = harness(5, Duration::ZERO, ScriptedCompletion::default());

    for i in 1..=6 {
        let outcome = h
            .orchestrator
            .handle_message(&message(i, GENERAL, &format!("msg {i}"), true))
            .await;
        assert!(outcome.is_replied(), "exchange {i} failed: {outcome:?}");
    }

    assert_eq!(
        h.store.cache().read(ALICE),
        vec![
            ChatMessage::assistant("reply 4"),
            ChatMessage::user("msg 5"),
            ChatMessage::assistant("reply 5"),
            ChatMessage::user("msg 6"),
            ChatMessage::assistant("reply 6"),
        ]
    );
}

#[tokio::test]
async fn history_is_sent_with_next_prompt() {
    let h = harness(5, Duration::ZERO, ScriptedCompletion::default());
    h.orchestrator
        .handle_message(&message(1, GENERAL, "first", true))
        .await;

    let prompt = h.orchestrator.assemble_prompt(ALICE, "second");
    let roles: Vec<Role> = prompt.iter().map(|m| m.role).collect();
    assert_eq!(
        roles,
        vec![Role::System, Role::User, Role::Assistant, Role::User]
    );
    assert_eq!(prompt[0].content, "be brief");
    assert_eq!(prompt[3].content, "second");
}

#[tokio::test]
async fn cooldown_blocks_and_leaves_state_untouched() {
    let h = harness(5, Duration::from_secs(30), ScriptedCompletion::default());
    h.orchestrator
        .handle_message(&message(1, GENERAL, "hello", true))
        .await;

    let cache_before = h.store.cache().read(ALICE);
    let record_before = h.store.interactions().get(ALICE);

    let outcome = h
        .orchestrator
        .handle_message(&message(2, GENERAL, "again", true))
        .await;

    assert!(matches!(outcome, ExchangeOutcome::CooldownActive));
    assert_eq!(h.completion.calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.discord.texts().last().unwrap(), COOLDOWN_NOTICE);
    assert_eq!(h.store.cache().read(ALICE), cache_before);
    assert_eq!(h.store.interactions().get(ALICE), record_before);
}

#[tokio::test(start_paused = true)]
async fn cooldown_expires() {
    let h = harness(5, Duration::from_millis(50), ScriptedCompletion::default());
    h.orchestrator
        .handle_message(&message(1, GENERAL, "hello", true))
        .await;
    assert!(h.store.cooldowns().is_on_cooldown(ALICE));

    tokio::time::sleep(Duration::from_millis(120)).await;

    let outcome = h
        .orchestrator
        .handle_message(&message(2, GENERAL, "again", true))
        .await;
    assert!(outcome.is_replied());
}

#[tokio::test]
async fn failed_completion_leaves_no_trace() {
    let h = harness(
        5,
        Duration::from_secs(2),
        ScriptedCompletion {
            fail: true,
            ..Default::default()
        },
    );

    let outcome = h
        .orchestrator
        .handle_message(&message(1, GENERAL, "hello", true))
        .await;

    assert!(matches!(outcome, ExchangeOutcome::Failed(_)));
    assert!(h.store.cache().read(ALICE).is_empty());
    assert!(!h.store.cooldowns().is_on_cooldown(ALICE));
    assert!(!h.store.interactions().get(ALICE).has_interacted());
    assert_eq!(h.discord.texts().len(), 1);
    assert_ne!(h.discord.texts()[0], COOLDOWN_NOTICE);
}

#[tokio::test(start_paused = true)]
async fn concurrent_messages_from_one_user_are_serialized() {
    let h = harness(
        5,
        Duration::from_secs(30),
        ScriptedCompletion {
            delay: Duration::from_millis(100),
            ..Default::default()
        },
    );

    let first = {
        let orchestrator = h.orchestrator.clone();
        tokio::spawn(async move {
            orchestrator
                .handle_message(&message(1, GENERAL, "one", true))
                .await
        })
    };
    let second = {
        let orchestrator = h.orchestrator.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            orchestrator
                .handle_message(&message(2, GENERAL, "two", true))
                .await
        })
    };

    let first = first.await.unwrap();
    let second = second.await.unwrap();

    assert!(first.is_replied());
    assert!(matches!(second, ExchangeOutcome::CooldownActive));
    assert_eq!(h.completion.calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.store.cache().len(ALICE), 2);
}

#[tokio::test(start_paused = true)]
async fn other_users_are_not_blocked() {
    let h = harness(
        5,
        Duration::from_secs(30),
        ScriptedCompletion {
            delay: Duration::from_millis(50),
            ..Default::default()
        },
    );

    let alice = message(1, GENERAL, "hi", true);
    let mut bob = message(2, GENERAL, "hi", true);
    bob.author_id = 2;
    bob.author_name = "bob".to_string();

    let (a, b) = tokio::join!(
        h.orchestrator.handle_message(&alice),
        h.orchestrator.handle_message(&bob),
    );

    assert!(a.is_replied());
    assert!(b.is_replied());
    assert_eq!(h.store.stats().cached_users, 2);
}
