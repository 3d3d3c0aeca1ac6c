use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::channel::MessagingClient;
use crate::models::chat::ChannelId;

/// Periodic "still working" signal bound to a scope.
///
/// Signals once immediately, then every `interval`, until dropped.
/// Dropping aborts the task, so every exit path of the owner stops it.
pub struct TypingIndicator {
    task: JoinHandle<()>,
}

impl TypingIndicator {
    pub fn start(
        messaging: Arc<dyn MessagingClient>,
        channel_id: ChannelId,
        interval: Duration,
    ) -> Self {
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                if let Err(e) = messaging.signal_typing(channel_id).await {
                    warn!("Failed to send typing indicator to {}: {}", channel_id, e);
                }
            }
        });
        debug!("Typing indicator started for channel {}", channel_id);
        Self { task }
    }

    pub fn stop(self) {
        drop(self);
    }
}

impl Drop for TypingIndicator {
    fn drop(&mut self) {
        self.task.abort();
    }
}
