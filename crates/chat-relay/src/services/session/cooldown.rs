use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::AbortHandle;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::models::chat::UserId;

struct CooldownEntry {
    generation: u64,
    expires_at: Instant,
    timer: AbortHandle,
}

/// Per-user timed lock between completions.
///
/// A cooldown is a flag, not a counter: arming it again resets the expiry
/// and aborts the previous timer.
pub struct CooldownManager {
    active: Arc<DashMap<UserId, CooldownEntry>>,
    next_generation: AtomicU64,
}

impl CooldownManager {
    pub fn new() -> Self {
        Self {
            active: Arc::new(DashMap::new()),
            next_generation: AtomicU64::new(0),
        }
    }

    pub fn is_on_cooldown(&self, user_id: UserId) -> bool {
        let expired = match self.active.get(&user_id) {
            None => return false,
            Some(entry) => entry.expires_at <= Instant::now(),
        };

        // Timer lost the race or hasn't fired yet; drop lazily
        if expired {
            self.active.remove_if(&user_id, |_, e| e.expires_at <= Instant::now());
            debug!("Cooldown for user {} expired on lookup", user_id);
            return false;
        }
        true
    }

    /// Arm the cooldown and schedule its removal after `duration`.
    ///
    /// Must be called from within a tokio runtime. A zero duration only
    /// clears an existing cooldown.
    pub fn start_cooldown(&self, user_id: UserId, duration: Duration) {
        if duration.is_zero() {
            self.clear(user_id);
            return;
        }

        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let expires_at = Instant::now() + duration;

        let active = Arc::clone(&self.active);
        let timer = tokio::spawn(async move {
            tokio::time::sleep_until(expires_at).await;
            if active
                .remove_if(&user_id, |_, e| e.generation == generation)
                .is_some()
            {
                info!("Cooldown ended for user ID: {}", user_id);
            }
        })
        .abort_handle();

        let previous = self.active.insert(
            user_id,
            CooldownEntry {
                generation,
                expires_at,
                timer,
            },
        );
        if let Some(previous) = previous {
            previous.timer.abort();
        }

        info!("Starting cooldown for user ID: {} ({:?})", user_id, duration);
    }

    /// Drop a cooldown early and abort its timer. No-op if none is active.
    pub fn clear(&self, user_id: UserId) {
        if let Some((_, entry)) = self.active.remove(&user_id) {
            entry.timer.abort();
        }
    }

    /// Number of users currently on cooldown, expired entries included
    /// until their timer or the next lookup removes them
    pub fn active_count(&self) -> usize {
        self.active.len()
    }
}

impl Default for CooldownManager {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for CooldownManager {
    fn drop(&mut self) {
        // Pending timers must not outlive the manager
        for entry in self.active.iter() {
            entry.timer.abort();
        }
    }
}
