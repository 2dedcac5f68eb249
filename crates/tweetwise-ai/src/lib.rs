pub mod client;
pub mod error;
pub mod gateway;
pub mod parse;
pub mod prompts;

pub use client::CompletionClient;
pub use error::AiError;
pub use gateway::{AiGateway, AnalysisOutcome};

/// Analyzable input bounds. Longer than a tweet on purpose: users
/// paste drafts that still need trimming.
pub const MIN_TEXT_LEN: usize = 1;
pub const MAX_TEXT_LEN: usize = 560;
