use axum::{Extension, Json, extract::State, response::IntoResponse};
use serde_json::Value;

use tweetwise_ai::{MAX_TEXT_LEN, MIN_TEXT_LEN};
use tweetwise_types::api::{AnalyzeRequest, Claims};
use tweetwise_types::models::SuggestionKind;

use crate::AppState;
use crate::error::ApiError;

pub async fn check_spelling(
    state: State<AppState>,
    claims: Extension<Claims>,
    req: Json<AnalyzeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    analyze(state, claims, SuggestionKind::Spelling, req).await
}

pub async fn check_grammar(
    state: State<AppState>,
    claims: Extension<Claims>,
    req: Json<AnalyzeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    analyze(state, claims, SuggestionKind::Grammar, req).await
}

pub async fn critique(
    state: State<AppState>,
    claims: Extension<Claims>,
    req: Json<AnalyzeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    analyze(state, claims, SuggestionKind::Critique, req).await
}

pub async fn curate(
    state: State<AppState>,
    claims: Extension<Claims>,
    req: Json<AnalyzeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    analyze(state, claims, SuggestionKind::Curation, req).await
}

/// Shared pipeline for all four kinds: length check, optional tweet
/// ownership check, then the gateway (which handles caching and
/// degradation).
async fn analyze(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    kind: SuggestionKind,
    Json(req): Json<AnalyzeRequest>,
) -> Result<Json<Value>, ApiError> {
    validate_text(&req.text)?;

    let tweet_id = match req.tweet_id {
        Some(id) => {
            // only associate the analysis with tweets the caller owns
            state
                .db
                .get_tweet(&id.to_string(), &claims.sub.to_string())?
                .ok_or(ApiError::NotFound)?;
            Some(id.to_string())
        }
        None => None,
    };

    let outcome = state
        .ai
        .analyze(&state.db, kind, &req.text, tweet_id.as_deref())
        .await?;

    let mut body = match outcome.payload {
        Value::Object(map) => map,
        other => {
            // cache rows predating a payload-shape change
            let mut map = serde_json::Map::new();
            map.insert("result".into(), other);
            map
        }
    };
    body.insert("success".into(), Value::Bool(true));
    body.insert("kind".into(), Value::String(kind.as_str().into()));
    body.insert("cached".into(), Value::Bool(outcome.cached));
    body.insert("degraded".into(), Value::Bool(outcome.degraded));

    Ok(Json(Value::Object(body)))
}

fn validate_text(text: &str) -> Result<(), ApiError> {
    let len = text.chars().count();
    if len < MIN_TEXT_LEN {
        return Err(ApiError::Validation("Text is empty".into()));
    }
    if len > MAX_TEXT_LEN {
        return Err(ApiError::Validation(format!(
            "Text is {len} characters; the analysis limit is {MAX_TEXT_LEN}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_length_boundary() {
        assert!(validate_text("a").is_ok());
        assert!(validate_text(&"x".repeat(560)).is_ok());
        assert!(validate_text(&"x".repeat(561)).is_err());
        assert!(validate_text("").is_err());
    }
}
