use thiserror::Error;

/// Failure reported by the completion service client
#[derive(Error, Debug)]
pub enum CompletionError {
    #[error("Failed to call completion API: {0}")]
    Request(String),

    #[error("Completion API error: {status} - {body}")]
    Api { status: u16, body: String },

    #[error("Malformed completion response: {0}")]
    MalformedResponse(String),
}

/// Why an admitted exchange was aborted.
///
/// Every variant leaves per-user session state exactly as it was before
/// the attempt.
#[derive(Error, Debug)]
pub enum ExchangeFailure {
    #[error("Completion failed: {0}")]
    Completion(#[from] CompletionError),

    #[error("Reply dispatch failed: {0}")]
    Dispatch(String),

    #[error("Unexpected failure: {0}")]
    Unexpected(String),
}

impl ExchangeFailure {
    /// Text relayed back to the user
    pub fn user_message(&self) -> &'static str {
        match self {
            ExchangeFailure::Completion(_) => {
                "Sorry, I couldn't get a response right now. Please try again."
            }
            ExchangeFailure::Dispatch(_) | ExchangeFailure::Unexpected(_) => {
                "An error occurred while processing your message. Please try again."
            }
        }
    }
}
