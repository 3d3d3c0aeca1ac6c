pub mod llm_service;
pub mod session;

pub use llm_service::LlmService;
pub use session::{CompletionProvider, SessionOrchestrator, SessionStore};
