pub mod error;
pub mod llm;

pub use error::{AppError, Result};
pub use llm::{ChatMessage, CompletionBackend, CompletionClient, Role, SamplingParams};
