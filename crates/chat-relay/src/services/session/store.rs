use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::cache::ConversationCache;
use super::cooldown::CooldownManager;
use super::tracker::InteractionTracker;
use super::types::SessionStats;
use crate::models::chat::UserId;

/// Owner of all per-user session state.
///
/// Mutations for one user must happen while holding that user's exchange
/// lock (see [`lock_user`](Self::lock_user)).
pub struct SessionStore {
    cache: ConversationCache,
    cooldowns: CooldownManager,
    interactions: InteractionTracker,
    locks: DashMap<UserId, Arc<Mutex<()>>>,
}

impl SessionStore {
    pub fn new(max_cache: usize) -> Self {
        Self {
            cache: ConversationCache::new(max_cache),
            cooldowns: CooldownManager::new(),
            interactions: InteractionTracker::new(),
            locks: DashMap::new(),
        }
    }

    /// Rolling conversation history
    pub fn cache(&self) -> &ConversationCache {
        &self.cache
    }

    /// Per-user cooldowns
    pub fn cooldowns(&self) -> &CooldownManager {
        &self.cooldowns
    }

    /// Last engaged exchange per user
    pub fn interactions(&self) -> &InteractionTracker {
        &self.interactions
    }

    /// Serialize exchanges of one user. Other users are unaffected.
    pub async fn lock_user(&self, user_id: UserId) -> OwnedMutexGuard<()> {
        // Clone the handle out so the map shard isn't held across the await
        let lock = self.locks.entry(user_id).or_default().clone();
        lock.lock_owned().await
    }

    /// Snapshot of map sizes for the stats endpoint
    pub fn stats(&self) -> SessionStats {
        SessionStats {
            cached_users: self.cache.user_count(),
            users_on_cooldown: self.cooldowns.active_count(),
            tracked_users: self.interactions.len(),
        }
    }
}
