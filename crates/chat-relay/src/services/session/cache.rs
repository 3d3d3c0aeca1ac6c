use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, info};

use crate::models::chat::{ChatMessage, UserId};

/// Thread-safe per-user rolling history.
///
/// Each user owns at most `max_cache` turns, oldest first. Appends that would
/// exceed the capacity evict from the front, one turn at a time.
#[derive(Clone)]
pub struct ConversationCache {
    /// user_id -> turns, chronological
    storage: Arc<DashMap<UserId, VecDeque<ChatMessage>>>,
    max_cache: usize,
}

impl ConversationCache {
    /// Create an empty cache. A capacity of 0 is raised to 1.
    pub fn new(max_cache: usize) -> Self {
        let max_cache = max_cache.max(1);
        info!("Initializing conversation cache (max_cache={})", max_cache);
        Self {
            storage: Arc::new(DashMap::new()),
            max_cache,
        }
    }

    /// Snapshot of the user's history, oldest first. Empty if unknown.
    pub fn read(&self, user_id: UserId) -> Vec<ChatMessage> {
        self.storage
            .get(&user_id)
            .map(|entry| entry.value().iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Append one turn. Returns the turn evicted to make room, if any.
    pub fn append(&self, user_id: UserId, turn: ChatMessage) -> Option<ChatMessage> {
        let mut entry = self.storage.entry(user_id).or_default();
        Self::push_bounded(entry.value_mut(), turn, self.max_cache)
    }

    /// Append a user turn and the assistant answer as one commit.
    ///
    /// Both turns land under the same entry guard, so no reader ever sees
    /// half an exchange. Returns the evicted turns, oldest first.
    pub fn append_exchange(
        &self,
        user_id: UserId,
        user_turn: ChatMessage,
        assistant_turn: ChatMessage,
    ) -> Vec<ChatMessage> {
        let mut entry = self.storage.entry(user_id).or_default();
        let turns = entry.value_mut();

        let mut evicted = Vec::new();
        for turn in [user_turn, assistant_turn] {
            if let Some(old) = Self::push_bounded(turns, turn, self.max_cache) {
                evicted.push(old);
            }
        }

        debug!(
            "Cached exchange for user {} ({} turns held)",
            user_id,
            turns.len()
        );
        evicted
    }

    fn push_bounded(
        turns: &mut VecDeque<ChatMessage>,
        turn: ChatMessage,
        max_cache: usize,
    ) -> Option<ChatMessage> {
        let evicted = if turns.len() >= max_cache {
            turns.pop_front()
        } else {
            None
        };
        turns.push_back(turn);
        evicted
    }

    /// Number of turns held for a user
    pub fn len(&self, user_id: UserId) -> usize {
        self.storage.get(&user_id).map(|e| e.len()).unwrap_or(0)
    }

    /// True if the user has no cached turns
    pub fn is_empty(&self, user_id: UserId) -> bool {
        self.len(user_id) == 0
    }

    /// Number of users with history
    pub fn user_count(&self) -> usize {
        self.storage.len()
    }
}
