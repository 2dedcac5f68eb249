use thiserror::Error;

/// Failures talking to the completion API. Model output that fails to
/// parse is NOT an error: the gateway degrades to a safe default
/// instead.
#[derive(Error, Debug)]
pub enum AiError {
    #[error("Completion API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Completion API returned no content")]
    EmptyCompletion,

    #[error("Completion request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<anyhow::Error> for AiError {
    fn from(e: anyhow::Error) -> Self {
        AiError::Internal(e.to_string())
    }
}
