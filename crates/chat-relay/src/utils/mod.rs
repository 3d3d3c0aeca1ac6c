pub mod error;
pub mod text_split;

pub use error::{CompletionError, ExchangeFailure};
pub use text_split::split_message;
