use axum::{
    Extension, Json,
    extract::{Query, State},
    response::{IntoResponse, Redirect},
};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use tracing::warn;

use tweetwise_twitter::{TwitterError, oauth};
use tweetwise_types::api::{
    CancelScheduleRequest, Claims, PostTweetRequest, ScheduleRequest, TwitterStatusResponse,
};
use tweetwise_types::models::TweetStatus;

use crate::error::ApiError;
use crate::tweets::{tweet_response, validate_content};
use crate::AppState;

/// How far out a tweet may be scheduled.
const MAX_SCHEDULE_DAYS: i64 = 365;

pub async fn auth_url(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let url = oauth::begin_connect(&state.db, &state.twitter, &claims.sub.to_string())?;
    Ok(Json(serde_json::json!({ "success": true, "auth_url": url })))
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// OAuth redirect target. Arrives unauthenticated; the consumed
/// state row identifies the user. The outcome goes back to the
/// dashboard in query parameters.
pub async fn callback(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
) -> impl IntoResponse {
    let dashboard = format!("{}/dashboard", state.app_url);

    if let Some(error) = query.error {
        warn!(
            %error,
            description = query.error_description.as_deref().unwrap_or(""),
            "Twitter authorization denied"
        );
        return Redirect::to(&format!("{dashboard}?twitter=error&code=access_denied"));
    }

    let (Some(code), Some(oauth_state)) = (query.code, query.state) else {
        return Redirect::to(&format!("{dashboard}?twitter=error&code=invalid_callback"));
    };

    match oauth::complete_connect(&state.db, &state.twitter, &code, &oauth_state).await {
        Ok(profile) => Redirect::to(&format!(
            "{dashboard}?twitter=connected&username={}",
            profile.username
        )),
        Err(e) => {
            warn!("Twitter callback failed: {}", e);
            Redirect::to(&format!("{dashboard}?twitter=error&code={}", e.code()))
        }
    }
}

pub async fn status(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let row = state.db.get_twitter_tokens(&claims.sub.to_string())?;

    let resp = match row {
        Some(row) => TwitterStatusResponse {
            success: true,
            connected: true,
            twitter_user_id: Some(row.twitter_user_id),
            username: Some(row.twitter_username),
            name: Some(row.twitter_name),
            expires_at: row
                .expires_at
                .as_deref()
                .and_then(|v| v.parse::<DateTime<Utc>>().ok()),
        },
        None => TwitterStatusResponse {
            success: true,
            connected: false,
            twitter_user_id: None,
            username: None,
            name: None,
            expires_at: None,
        },
    };

    Ok(Json(resp))
}

pub async fn post_tweet(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<PostTweetRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let id = req.tweet_id.to_string();
    let uid = claims.sub.to_string();

    let row = state.db.get_tweet(&id, &uid)?.ok_or(ApiError::NotFound)?;
    validate_content(&row.content)?;

    let current = TweetStatus::parse(&row.status).unwrap_or(TweetStatus::Draft);
    if !current.can_transition(TweetStatus::Sent) {
        return Err(ApiError::Conflict(format!(
            "A {current} tweet cannot be posted"
        )));
    }

    let access_token = oauth::valid_access_token(&state.db, &state.twitter, &uid)
        .await?
        .ok_or(ApiError::NotConnected)?;

    let external_id = match state.twitter.post_tweet(&access_token, &row.content).await {
        Ok(id) => id,
        Err(e) => {
            // keep the failure on the row for the history panel
            state.db.record_post_error(&id, &uid, &e.to_string())?;
            return Err(handle_post_failure(&state, &uid, e).await);
        }
    };

    if !state.db.mark_sent(&id, &uid, &external_id)? {
        // posted remotely but lost the local race; surface the conflict
        warn!(tweet_id = %id, %external_id, "Tweet posted but status write lost a race");
        return Err(ApiError::Conflict("Tweet status changed concurrently".into()));
    }

    let row = state.db.get_tweet(&id, &uid)?.ok_or(ApiError::Internal)?;
    Ok(Json(serde_json::json!({ "success": true, "tweet": tweet_response(row) })))
}

/// A 401 on posting means the access token went stale between the
/// validity check and the post; the classified error has already
/// disconnected or kept the account as appropriate.
async fn handle_post_failure(state: &AppState, user_id: &str, e: TwitterError) -> ApiError {
    if let TwitterError::Api { status: 401, .. } = e {
        match oauth::refresh_tokens(&state.db, &state.twitter, user_id).await {
            Ok(_) => {
                return ApiError::Conflict("Twitter session refreshed, retry the post".into());
            }
            Err(refresh_err) => return refresh_err.into(),
        }
    }
    e.into()
}

pub async fn schedule(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<ScheduleRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let id = req.tweet_id.to_string();
    let uid = claims.sub.to_string();

    state.db.get_tweet(&id, &uid)?.ok_or(ApiError::NotFound)?;
    validate_schedule_window(req.scheduled_for, Utc::now())?;

    let when = tweetwise_db::timestamp(req.scheduled_for);
    if !state.db.mark_scheduled(&id, &uid, &when)? {
        return Err(ApiError::Conflict("Only draft tweets can be scheduled".into()));
    }

    let row = state.db.get_tweet(&id, &uid)?.ok_or(ApiError::Internal)?;
    Ok(Json(serde_json::json!({ "success": true, "tweet": tweet_response(row) })))
}

pub async fn cancel_schedule(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CancelScheduleRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let id = req.tweet_id.to_string();
    let uid = claims.sub.to_string();

    state.db.get_tweet(&id, &uid)?.ok_or(ApiError::NotFound)?;

    if !state.db.cancel_schedule(&id, &uid)? {
        return Err(ApiError::Conflict("Tweet is not scheduled".into()));
    }

    let row = state.db.get_tweet(&id, &uid)?.ok_or(ApiError::Internal)?;
    Ok(Json(serde_json::json!({ "success": true, "tweet": tweet_response(row) })))
}

/// Idempotent: disconnecting an unconnected account is a success.
pub async fn disconnect(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let removed = oauth::disconnect(&state.db, &claims.sub.to_string())?;
    Ok(Json(serde_json::json!({ "success": true, "was_connected": removed })))
}

/// Connection diagnostics without secret material.
pub async fn debug(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let row = state.db.get_twitter_tokens(&claims.sub.to_string())?;

    let body = match row {
        Some(row) => serde_json::json!({
            "success": true,
            "connected": true,
            "twitter_user_id": row.twitter_user_id,
            "username": row.twitter_username,
            "has_refresh_token": row.refresh_token.is_some(),
            "expires_at": row.expires_at,
            "connected_at": row.created_at,
            "last_refreshed_at": row.updated_at,
        }),
        None => serde_json::json!({ "success": true, "connected": false }),
    };

    Ok(Json(body))
}

fn validate_schedule_window(
    scheduled_for: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<(), ApiError> {
    if scheduled_for <= now {
        return Err(ApiError::Validation(
            "scheduled_for must be in the future".into(),
        ));
    }
    if scheduled_for > now + Duration::days(MAX_SCHEDULE_DAYS) {
        return Err(ApiError::Validation(
            "Tweets cannot be scheduled more than one year ahead".into(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn schedule_window_boundaries() {
        let now = Utc.with_ymd_and_hms(2026, 6, 1, 12, 0, 0).unwrap();

        assert!(validate_schedule_window(now - Duration::minutes(1), now).is_err());
        assert!(validate_schedule_window(now, now).is_err());
        assert!(validate_schedule_window(now + Duration::minutes(5), now).is_ok());
        assert!(validate_schedule_window(now + Duration::days(364), now).is_ok());
        assert!(validate_schedule_window(now + Duration::days(366), now).is_err());
    }
}
