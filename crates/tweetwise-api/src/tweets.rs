use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{error, warn};
use uuid::Uuid;

use tweetwise_db::models::TweetRow;
use tweetwise_types::api::{Claims, CreateTweetRequest, TweetResponse, UpdateTweetRequest};
use tweetwise_types::models::TweetStatus;

use crate::error::ApiError;
use crate::{AppState, MAX_TWEET_LEN};

#[derive(Debug, Deserialize)]
pub struct TweetQuery {
    pub status: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: u32,
    /// Cursor-based pagination: pass the `updated_at` of the last
    /// tweet from the previous page.
    pub before: Option<String>,
}

fn default_limit() -> u32 {
    50
}

pub async fn create_tweet(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateTweetRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_content(&req.content)?;

    let status = req.status.unwrap_or(TweetStatus::Draft);
    if !matches!(status, TweetStatus::Draft | TweetStatus::Completed) {
        return Err(ApiError::Validation(
            "New tweets start as draft or completed".into(),
        ));
    }

    let tweet_id = Uuid::new_v4();
    state.db.insert_tweet(
        &tweet_id.to_string(),
        &claims.sub.to_string(),
        &req.content,
        status.as_str(),
    )?;

    let row = state
        .db
        .get_tweet(&tweet_id.to_string(), &claims.sub.to_string())?
        .ok_or(ApiError::Internal)?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "success": true, "tweet": tweet_response(row) })),
    ))
}

pub async fn list_tweets(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<TweetQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let status = match query.status.as_deref() {
        Some(raw) => Some(
            TweetStatus::parse(raw)
                .ok_or_else(|| ApiError::Validation(format!("Unknown status '{raw}'")))?,
        ),
        None => None,
    };

    // Run blocking DB reads off the async runtime
    let db = state.clone();
    let uid = claims.sub.to_string();
    let limit = query.limit.min(100);
    let before = query.before;

    let rows = tokio::task::spawn_blocking(move || {
        db.db
            .list_tweets(&uid, status.map(|s| s.as_str()), limit, before.as_deref())
    })
    .await
    .map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        ApiError::Internal
    })??;

    let tweets: Vec<TweetResponse> = rows.into_iter().map(tweet_response).collect();

    Ok(Json(serde_json::json!({ "success": true, "tweets": tweets })))
}

pub async fn get_tweet(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(tweet_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let row = state
        .db
        .get_tweet(&tweet_id.to_string(), &claims.sub.to_string())?
        .ok_or(ApiError::NotFound)?;

    Ok(Json(serde_json::json!({ "success": true, "tweet": tweet_response(row) })))
}

pub async fn update_tweet(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(tweet_id): Path<Uuid>,
    Json(req): Json<UpdateTweetRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let id = tweet_id.to_string();
    let uid = claims.sub.to_string();

    // distinguish 404 from a guarded-transition conflict
    state.db.get_tweet(&id, &uid)?.ok_or(ApiError::NotFound)?;

    if let Some(content) = &req.content {
        validate_content(content)?;
        if !state.db.update_tweet_content(&id, &uid, content)? {
            return Err(ApiError::Conflict(
                "Only draft or completed tweets can be edited".into(),
            ));
        }
    }

    if let Some(status) = req.status {
        if !matches!(status, TweetStatus::Draft | TweetStatus::Completed) {
            return Err(ApiError::Validation(
                "Use the scheduling endpoints to schedule or post".into(),
            ));
        }
        if !state.db.set_editing_status(&id, &uid, status.as_str())? {
            return Err(ApiError::Conflict(format!(
                "Tweet cannot move to '{status}' from its current status"
            )));
        }
    }

    let row = state.db.get_tweet(&id, &uid)?.ok_or(ApiError::NotFound)?;
    Ok(Json(serde_json::json!({ "success": true, "tweet": tweet_response(row) })))
}

pub async fn delete_tweet(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(tweet_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let deleted = state
        .db
        .delete_tweet(&tweet_id.to_string(), &claims.sub.to_string())?;
    if !deleted {
        return Err(ApiError::NotFound);
    }
    Ok(Json(serde_json::json!({ "success": true })))
}

pub(crate) fn validate_content(content: &str) -> Result<(), ApiError> {
    if content.trim().is_empty() {
        return Err(ApiError::Validation("Tweet content is empty".into()));
    }
    let len = content.chars().count();
    if len > MAX_TWEET_LEN {
        return Err(ApiError::Validation(format!(
            "Tweet is {len} characters; the limit is {MAX_TWEET_LEN}"
        )));
    }
    Ok(())
}

pub(crate) fn tweet_response(row: TweetRow) -> TweetResponse {
    TweetResponse {
        id: row.id.parse().unwrap_or_else(|e| {
            warn!("Corrupt tweet id '{}': {}", row.id, e);
            Uuid::default()
        }),
        content: row.content,
        status: TweetStatus::parse(&row.status).unwrap_or_else(|| {
            warn!("Corrupt status '{}' on tweet '{}'", row.status, row.id);
            TweetStatus::Draft
        }),
        scheduled_for: row.scheduled_for.as_deref().map(|v| parse_ts(v, "scheduled_for", &row.id)),
        twitter_tweet_id: row.twitter_tweet_id,
        sent_at: row.sent_at.as_deref().map(|v| parse_ts(v, "sent_at", &row.id)),
        error_message: row.error_message,
        created_at: parse_ts(&row.created_at, "created_at", &row.id),
        updated_at: parse_ts(&row.updated_at, "updated_at", &row.id),
    }
}

fn parse_ts(value: &str, field: &str, id: &str) -> DateTime<Utc> {
    value.parse::<DateTime<Utc>>().unwrap_or_else(|e| {
        warn!("Corrupt {} '{}' on tweet '{}': {}", field, value, id, e);
        DateTime::default()
    })
}
