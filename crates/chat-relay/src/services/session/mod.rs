//! Per-user session and admission subsystem
//!
//! Decides whether to answer a message and keeps the per-user state
//! that decision depends on:
//! - Rolling conversation history (DashMap, FIFO-bounded)
//! - Cooldown between completions, cleared by a timer
//! - Last engaged time/channel for implicit continuation
//! - Per-user exchange serialization

mod cache;
mod cooldown;
mod gate;
pub mod orchestrator;
mod store;
mod tracker;
mod typing;
pub mod types;

pub use cache::ConversationCache;
pub use cooldown::CooldownManager;
pub use gate::EngagementGate;
pub use orchestrator::{
    CompletionProvider, OrchestratorConfig, SessionOrchestrator, COOLDOWN_NOTICE,
};
pub use store::SessionStore;
pub use tracker::InteractionTracker;
pub use typing::TypingIndicator;
pub use types::{EngagementReason, ExchangeOutcome, InteractionRecord, SessionStats};
