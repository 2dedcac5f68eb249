use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

use tweetwise_ai::AiError;
use tweetwise_twitter::TwitterError;

/// Handler-boundary error. Every variant renders as
/// `{ "success": false, "error": ..., "code": ... }` with the matching
/// HTTP status.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("Authentication required")]
    Unauthorized,

    #[error("Twitter account not connected")]
    NotConnected,

    #[error("Not found")]
    NotFound,

    #[error("{0}")]
    Conflict(String),

    #[error("Rate limit exceeded, try again later")]
    RateLimited,

    #[error("Internal server error")]
    Internal,

    /// Twitter failures keep their own machine code so the UI can
    /// react (reconnect prompts etc.).
    #[error("{message}")]
    Twitter {
        status: StatusCode,
        code: &'static str,
        message: String,
    },
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::NotConnected => StatusCode::FORBIDDEN,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Twitter { status, .. } => *status,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "validation_error",
            ApiError::Unauthorized => "unauthorized",
            ApiError::NotConnected => "not_connected",
            ApiError::NotFound => "not_found",
            ApiError::Conflict(_) => "conflict",
            ApiError::RateLimited => "rate_limited",
            ApiError::Internal => "internal_error",
            ApiError::Twitter { code, .. } => code,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({
            "success": false,
            "error": self.to_string(),
            "code": self.code(),
        }));
        (self.status(), body).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        error!("Internal error: {:#}", e);
        ApiError::Internal
    }
}

impl From<TwitterError> for ApiError {
    fn from(e: TwitterError) -> Self {
        let code = e.code();
        let status = match &e {
            TwitterError::InvalidState | TwitterError::ExpiredState => StatusCode::BAD_REQUEST,
            TwitterError::NotConnected
            | TwitterError::TokenRefreshFailed
            | TwitterError::TokensRevoked => StatusCode::FORBIDDEN,
            TwitterError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            TwitterError::Api { status, .. } if *status == 429 => StatusCode::TOO_MANY_REQUESTS,
            TwitterError::Api { .. } | TwitterError::Http(_) | TwitterError::Internal(_) => {
                error!("Twitter integration error: {}", e);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        ApiError::Twitter {
            status,
            code,
            message: e.to_string(),
        }
    }
}

impl From<AiError> for ApiError {
    fn from(e: AiError) -> Self {
        match e {
            AiError::Api { status: 429, .. } => ApiError::RateLimited,
            other => {
                error!("AI gateway error: {}", other);
                ApiError::Internal
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert_eq!(
            ApiError::Validation("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ApiError::Unauthorized.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::NotConnected.status(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::NotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::Conflict("x".into()).status(), StatusCode::CONFLICT);
        assert_eq!(ApiError::RateLimited.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(ApiError::Internal.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn twitter_errors_keep_their_codes() {
        let e: ApiError = TwitterError::ExpiredState.into();
        assert_eq!(e.status(), StatusCode::BAD_REQUEST);
        assert_eq!(e.code(), "expired_state");

        let e: ApiError = TwitterError::TokensRevoked.into();
        assert_eq!(e.status(), StatusCode::FORBIDDEN);
        assert_eq!(e.code(), "tokens_revoked");

        let e: ApiError = TwitterError::Api {
            status: 429,
            message: "slow down".into(),
        }
        .into();
        assert_eq!(e.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[test]
    fn ai_rate_limit_passes_through() {
        let e: ApiError = AiError::Api {
            status: 429,
            message: "quota".into(),
        }
        .into();
        assert_eq!(e.status(), StatusCode::TOO_MANY_REQUESTS);

        let e: ApiError = AiError::EmptyCompletion.into();
        assert_eq!(e.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
