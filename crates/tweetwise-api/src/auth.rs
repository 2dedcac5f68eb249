use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use chrono::{Duration, Utc};
use jsonwebtoken::{EncodingKey, Header, encode};
use tracing::warn;
use uuid::Uuid;

use tweetwise_types::api::{
    AuthResponse, Claims, LoginRequest, RegisterRequest, ResetConfirmRequest, ResetRequest,
};

use crate::AppState;
use crate::error::ApiError;

const MIN_PASSWORD_LEN: usize = 8;
const RESET_TOKEN_TTL_HOURS: i64 = 1;

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = normalize_email(&req.email);
    if !email_is_valid(&email) {
        return Err(ApiError::Validation("Invalid email address".into()));
    }
    if req.password.len() < MIN_PASSWORD_LEN {
        return Err(ApiError::Validation(
            "Password must be at least 8 characters".into(),
        ));
    }

    if state.db.get_user_by_email(&email)?.is_some() {
        return Err(ApiError::Conflict("Email is already registered".into()));
    }

    let password_hash = hash_password(&req.password)?;
    let user_id = Uuid::new_v4();

    // the UNIQUE constraint backstops the existence check above when
    // two registrations race
    if let Err(e) = state
        .db
        .create_user(&user_id.to_string(), &email, &password_hash)
    {
        if e.to_string().contains("UNIQUE") {
            return Err(ApiError::Conflict("Email is already registered".into()));
        }
        return Err(e.into());
    }

    let token = create_token(&state.jwt_secret, user_id, &email)?;

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            success: true,
            user_id,
            email,
            token,
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = normalize_email(&req.email);

    let user = state
        .db
        .get_user_by_email(&email)?
        .ok_or(ApiError::Unauthorized)?;

    let parsed_hash = PasswordHash::new(&user.password).map_err(|e| {
        warn!(user_id = %user.id, "Stored password hash unreadable: {}", e);
        ApiError::Internal
    })?;

    Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .map_err(|_| ApiError::Unauthorized)?;

    let user_id: Uuid = user.id.parse().map_err(|_| ApiError::Internal)?;
    let token = create_token(&state.jwt_secret, user_id, &user.email)?;

    Ok(Json(AuthResponse {
        success: true,
        user_id,
        email: user.email,
        token,
    }))
}

pub async fn me(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state
        .db
        .get_user_by_id(&claims.sub.to_string())?
        .ok_or(ApiError::NotFound)?;

    Ok(Json(serde_json::json!({
        "success": true,
        "user_id": user.id,
        "email": user.email,
        "twitter_username": user.twitter_username,
        "twitter_name": user.twitter_name,
    })))
}

/// Always answers success so the endpoint cannot be used to probe for
/// registered addresses.
pub async fn reset_request(
    State(state): State<AppState>,
    Json(req): Json<ResetRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = normalize_email(&req.email);

    if let Some(user) = state.db.get_user_by_email(&email)? {
        let token = Uuid::new_v4().to_string();
        let expires_at =
            tweetwise_db::timestamp(Utc::now() + Duration::hours(RESET_TOKEN_TTL_HOURS));
        state.db.set_reset_token(&user.id, &token, &expires_at)?;

        let reset_link = format!("{}/reset?token={}", state.app_url, token);
        if let Err(e) = state.mailer.send_password_reset(&email, &reset_link).await {
            // the token is stored; a support path can still recover
            warn!(%email, "Failed to send reset mail: {:#}", e);
        }
    }

    Ok(Json(serde_json::json!({ "success": true })))
}

pub async fn reset_confirm(
    State(state): State<AppState>,
    Json(req): Json<ResetConfirmRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.password.len() < MIN_PASSWORD_LEN {
        return Err(ApiError::Validation(
            "Password must be at least 8 characters".into(),
        ));
    }

    let user = state
        .db
        .get_user_by_reset_token(&req.token)?
        .ok_or_else(|| ApiError::Validation("Invalid or expired reset token".into()))?;

    let still_valid = user
        .reset_token_expires_at
        .as_deref()
        .and_then(|v| v.parse::<chrono::DateTime<Utc>>().ok())
        .map(|expiry| expiry > Utc::now())
        .unwrap_or(false);
    if !still_valid {
        return Err(ApiError::Validation("Invalid or expired reset token".into()));
    }

    let password_hash = hash_password(&req.password)?;
    state.db.reset_password(&user.id, &password_hash)?;

    Ok(Json(serde_json::json!({ "success": true })))
}

fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| {
            warn!("Password hashing failed: {}", e);
            ApiError::Internal
        })?;
    Ok(hash.to_string())
}

fn create_token(secret: &str, user_id: Uuid, email: &str) -> Result<String, ApiError> {
    let claims = Claims {
        sub: user_id,
        email: email.to_string(),
        exp: (Utc::now() + Duration::days(30)).timestamp() as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| {
        warn!("JWT encoding failed: {}", e);
        ApiError::Internal
    })
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Deliberately loose: the confirmation mail is the real validation.
fn email_is_valid(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !email.contains(char::is_whitespace)
}
