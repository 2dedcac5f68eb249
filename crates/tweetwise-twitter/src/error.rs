use thiserror::Error;

/// Failures of the Twitter integration. Handlers map these onto HTTP
/// statuses; the web callback encodes `code()` into its redirect.
#[derive(Error, Debug)]
pub enum TwitterError {
    #[error("Unknown or already-used OAuth state")]
    InvalidState,

    #[error("OAuth state expired")]
    ExpiredState,

    #[error("Twitter account not connected")]
    NotConnected,

    #[error("Token refresh failed; account disconnected")]
    TokenRefreshFailed,

    #[error("Twitter access revoked; account disconnected")]
    TokensRevoked,

    #[error("Twitter rate limit exceeded")]
    RateLimited,

    #[error("Twitter API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Twitter request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<anyhow::Error> for TwitterError {
    fn from(e: anyhow::Error) -> Self {
        TwitterError::Internal(e.to_string())
    }
}

impl TwitterError {
    /// Stable machine-readable code for JSON bodies and redirect query
    /// parameters.
    pub fn code(&self) -> &'static str {
        match self {
            TwitterError::InvalidState => "invalid_state",
            TwitterError::ExpiredState => "expired_state",
            TwitterError::NotConnected => "not_connected",
            TwitterError::TokenRefreshFailed => "token_refresh_failed",
            TwitterError::TokensRevoked => "tokens_revoked",
            TwitterError::RateLimited => "rate_limited",
            TwitterError::Api { .. } => "twitter_api_error",
            TwitterError::Http(_) => "twitter_unreachable",
            TwitterError::Internal(_) => "internal_error",
        }
    }
}
