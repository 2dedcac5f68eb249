use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::TweetStatus;

// -- JWT Claims --

/// JWT claims shared by the REST middleware and the auth handlers.
/// Canonical definition lives here in tweetwise-types to eliminate
/// duplication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub success: bool,
    pub user_id: Uuid,
    pub email: String,
    pub token: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResetRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResetConfirmRequest {
    pub token: String,
    pub password: String,
}

// -- Tweets --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateTweetRequest {
    pub content: String,
    /// Only `draft` or `completed` are accepted at creation.
    pub status: Option<TweetStatus>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateTweetRequest {
    pub content: Option<String>,
    pub status: Option<TweetStatus>,
}

#[derive(Debug, Serialize)]
pub struct TweetResponse {
    pub id: Uuid,
    pub content: String,
    pub status: TweetStatus,
    pub scheduled_for: Option<DateTime<Utc>>,
    pub twitter_tweet_id: Option<String>,
    pub sent_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// -- AI suggestions --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AnalyzeRequest {
    pub text: String,
    /// Optional tweet to associate the cached analysis with.
    pub tweet_id: Option<Uuid>,
}

/// A single spelling or grammar correction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Correction {
    pub original: String,
    pub suggestion: String,
    #[serde(default)]
    pub explanation: Option<String>,
}

/// Engagement/clarity assessment of a tweet's text. Scores are always
/// clamped to 1..=10 before leaving the gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Critique {
    pub engagement_score: u8,
    pub clarity_score: u8,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub improvements: Vec<String>,
    #[serde(default)]
    pub overall: String,
}

/// Rewrite variants and hashtag suggestions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Curation {
    #[serde(default)]
    pub variants: Vec<String>,
    #[serde(default)]
    pub hashtags: Vec<String>,
}

// -- Twitter --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PostTweetRequest {
    pub tweet_id: Uuid,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScheduleRequest {
    pub tweet_id: Uuid,
    pub scheduled_for: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CancelScheduleRequest {
    pub tweet_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct TwitterStatusResponse {
    pub success: bool,
    pub connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub twitter_user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}
