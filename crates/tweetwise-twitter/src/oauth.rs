use chrono::{DateTime, Duration, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use tweetwise_db::Database;

use crate::client::{ProbeOutcome, TokenResponse, TwitterClient, TwitterUser, classify_probe};
use crate::error::TwitterError;
use crate::pkce;

/// Stored OAuth states are only honored for this long.
pub const STATE_TTL_MINUTES: i64 = 10;

/// Refresh slightly early so a token never expires mid-request.
const EXPIRY_SKEW_SECS: i64 = 60;

/// Validity window stamped after a successful probe of a token whose
/// expiry Twitter never told us.
const PROBE_VALIDITY_MINUTES: i64 = 15;

#[derive(Debug, Clone)]
pub struct ConnectedProfile {
    pub twitter_user_id: String,
    pub username: String,
    pub name: String,
}

/// disconnected -> connecting. Stores the state + verifier row (and
/// lazily sweeps expired rows) and returns the authorization URL.
pub fn begin_connect(
    db: &Database,
    client: &TwitterClient,
    user_id: &str,
) -> Result<String, TwitterError> {
    let verifier = pkce::random_token();
    let state = pkce::random_token();
    let challenge = pkce::challenge_s256(&verifier);

    db.insert_oauth_state(&state, user_id, &verifier, &state_cutoff(Utc::now()))?;

    Ok(client.authorize_url(&state, &challenge))
}

/// connecting -> connected. Consumes the state (exactly once), trades
/// the code for tokens, fetches the profile, and stores everything
/// atomically.
pub async fn complete_connect(
    db: &Database,
    client: &TwitterClient,
    code: &str,
    state: &str,
) -> Result<ConnectedProfile, TwitterError> {
    let row = db
        .take_oauth_state(state)?
        .ok_or(TwitterError::InvalidState)?;

    if state_is_expired(&row.created_at, Utc::now()) {
        return Err(TwitterError::ExpiredState);
    }

    let tokens = client.exchange_code(code, &row.code_verifier).await?;
    let profile = client.me(&tokens.access_token).await?;

    store_connection(db, &row.user_id, &tokens, &profile)?;
    info!(user_id = %row.user_id, twitter = %profile.username, "Twitter account connected");

    Ok(ConnectedProfile {
        twitter_user_id: profile.id,
        username: profile.username,
        name: profile.name,
    })
}

/// Returns a usable access token for the user, or None when no tokens
/// are stored (no network traffic in that case). A locally valid
/// expiry is trusted; the remote API is only probed when the window is
/// unknown or has passed and no refresh is possible.
pub async fn valid_access_token(
    db: &Database,
    client: &TwitterClient,
    user_id: &str,
) -> Result<Option<String>, TwitterError> {
    let Some(row) = db.get_twitter_tokens(user_id)? else {
        return Ok(None);
    };

    let now = Utc::now();
    let known_expiry = row.expires_at.as_deref().and_then(parse_ts);

    if let Some(expiry) = known_expiry {
        if expiry - Duration::seconds(EXPIRY_SKEW_SECS) > now {
            return Ok(Some(row.access_token));
        }
        if row.refresh_token.is_some() {
            return refresh_tokens(db, client, user_id).await.map(Some);
        }
        // expired window but nothing to refresh with: fall through and
        // ask Twitter whether the token still works
    }

    match client.me(&row.access_token).await {
        Ok(_) => {
            let window = now + Duration::minutes(PROBE_VALIDITY_MINUTES);
            db.set_token_expiry(user_id, &tweetwise_db::timestamp(window))?;
            Ok(Some(row.access_token))
        }
        Err(TwitterError::Api { status, message }) => {
            match classify_probe(status, &message) {
                ProbeOutcome::NeedsRefresh => {
                    refresh_tokens(db, client, user_id).await.map(Some)
                }
                ProbeOutcome::Revoked => {
                    warn!(user_id, "Twitter reports tokens revoked; disconnecting");
                    db.disconnect_twitter(user_id)?;
                    Err(TwitterError::TokensRevoked)
                }
                ProbeOutcome::Other => Err(TwitterError::Api { status, message }),
            }
        }
        Err(e) => Err(e),
    }
}

/// Trades the stored refresh token for a new pair. Twitter does not
/// always issue refresh tokens; without one the account is
/// disconnected outright, as it is on refresh failure.
pub async fn refresh_tokens(
    db: &Database,
    client: &TwitterClient,
    user_id: &str,
) -> Result<String, TwitterError> {
    let Some(row) = db.get_twitter_tokens(user_id)? else {
        return Err(TwitterError::NotConnected);
    };

    let Some(refresh_token) = row.refresh_token else {
        warn!(user_id, "No refresh token stored; disconnecting");
        db.disconnect_twitter(user_id)?;
        return Err(TwitterError::TokenRefreshFailed);
    };

    match client.refresh(&refresh_token).await {
        Ok(tokens) => {
            let access = tokens.access_token.clone();
            db.upsert_twitter_tokens(
                &Uuid::new_v4().to_string(),
                user_id,
                &tokens.access_token,
                tokens.refresh_token.as_deref(),
                &row.twitter_user_id,
                &row.twitter_username,
                &row.twitter_name,
                expiry_from(&tokens, Utc::now()).as_deref(),
            )?;
            Ok(access)
        }
        Err(e) => {
            warn!(user_id, error = %e, "Token refresh failed; disconnecting");
            db.disconnect_twitter(user_id)?;
            Err(TwitterError::TokenRefreshFailed)
        }
    }
}

/// connected -> disconnected. Idempotent; returns whether tokens were
/// actually removed.
pub fn disconnect(db: &Database, user_id: &str) -> Result<bool, TwitterError> {
    let removed = db.disconnect_twitter(user_id)?;
    if removed {
        info!(user_id, "Twitter account disconnected");
    }
    Ok(removed)
}

fn store_connection(
    db: &Database,
    user_id: &str,
    tokens: &TokenResponse,
    profile: &TwitterUser,
) -> Result<(), TwitterError> {
    db.connect_twitter(
        &Uuid::new_v4().to_string(),
        user_id,
        &tokens.access_token,
        tokens.refresh_token.as_deref(),
        &profile.id,
        &profile.username,
        &profile.name,
        expiry_from(tokens, Utc::now()).as_deref(),
    )?;
    Ok(())
}

fn expiry_from(tokens: &TokenResponse, now: DateTime<Utc>) -> Option<String> {
    tokens
        .expires_in
        .map(|secs| tweetwise_db::timestamp(now + Duration::seconds(secs)))
}

fn state_cutoff(now: DateTime<Utc>) -> String {
    tweetwise_db::timestamp(now - Duration::minutes(STATE_TTL_MINUTES))
}

pub fn state_is_expired(created_at: &str, now: DateTime<Utc>) -> bool {
    match parse_ts(created_at) {
        Some(created) => now - created > Duration::minutes(STATE_TTL_MINUTES),
        // unparseable row: treat as expired rather than honoring it
        None => true,
    }
}

fn parse_ts(value: &str) -> Option<DateTime<Utc>> {
    value.parse::<DateTime<Utc>>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn state_expiry_boundary() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();

        let fresh = tweetwise_db::timestamp(now - Duration::minutes(9));
        assert!(!state_is_expired(&fresh, now));

        let stale = tweetwise_db::timestamp(now - Duration::minutes(11));
        assert!(state_is_expired(&stale, now));

        assert!(state_is_expired("not-a-timestamp", now));
    }

    #[test]
    fn expiry_from_token_response() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let with = TokenResponse {
            access_token: "a".into(),
            refresh_token: None,
            expires_in: Some(7200),
            scope: None,
        };
        assert_eq!(
            expiry_from(&with, now).as_deref(),
            Some("2026-03-01T14:00:00.000Z")
        );

        let without = TokenResponse {
            access_token: "a".into(),
            refresh_token: None,
            expires_in: None,
            scope: None,
        };
        assert!(expiry_from(&without, now).is_none());
    }

    #[tokio::test]
    async fn no_stored_tokens_means_none_without_network() {
        let db = Database::open_in_memory().unwrap();
        let uid = Uuid::new_v4().to_string();
        db.create_user(&uid, "probe@example.com", "$argon2id$x").unwrap();

        // An unroutable API base: any network call would error, so a
        // clean None proves the request was never made.
        let client = TwitterClient::new("id".into(), "secret".into(), "http://cb".into())
            .with_api_base("http://127.0.0.1:1");

        let token = valid_access_token(&db, &client, &uid).await.unwrap();
        assert!(token.is_none());
    }

    #[tokio::test]
    async fn locally_valid_expiry_skips_the_probe() {
        let db = Database::open_in_memory().unwrap();
        let uid = Uuid::new_v4().to_string();
        db.create_user(&uid, "local@example.com", "$argon2id$x").unwrap();

        let future = tweetwise_db::timestamp(Utc::now() + Duration::hours(1));
        db.upsert_twitter_tokens("r1", &uid, "acc", Some("ref"), "42", "wise", "Wise", Some(&future))
            .unwrap();

        let client = TwitterClient::new("id".into(), "secret".into(), "http://cb".into())
            .with_api_base("http://127.0.0.1:1");

        let token = valid_access_token(&db, &client, &uid).await.unwrap();
        assert_eq!(token.as_deref(), Some("acc"));
    }

    #[tokio::test]
    async fn used_state_fails_second_time() {
        let db = Database::open_in_memory().unwrap();
        let uid = Uuid::new_v4().to_string();
        db.create_user(&uid, "once@example.com", "$argon2id$x").unwrap();

        let client = TwitterClient::new("id".into(), "secret".into(), "http://cb".into())
            .with_api_base("http://127.0.0.1:1");

        let url = begin_connect(&db, &client, &uid).unwrap();
        let state = url
            .split("state=")
            .nth(1)
            .and_then(|s| s.split('&').next())
            .unwrap()
            .to_string();

        // First use consumes the state (the subsequent code exchange
        // fails against the unroutable base, which is fine here).
        let first = complete_connect(&db, &client, "code", &state).await;
        assert!(!matches!(first, Err(TwitterError::InvalidState)));

        let second = complete_connect(&db, &client, "code", &state).await;
        assert!(matches!(second, Err(TwitterError::InvalidState)));
    }

    #[tokio::test]
    async fn expired_state_is_rejected() {
        let db = Database::open_in_memory().unwrap();
        let uid = Uuid::new_v4().to_string();
        db.create_user(&uid, "expired@example.com", "$argon2id$x").unwrap();

        let cutoff = state_cutoff(Utc::now());
        db.insert_oauth_state("st-old", &uid, "verifier", &cutoff).unwrap();
        db.with_conn_mut(|conn| {
            conn.execute(
                "UPDATE oauth_states SET created_at = ?1 WHERE state = 'st-old'",
                [tweetwise_db::timestamp(Utc::now() - Duration::minutes(11))],
            )?;
            Ok(())
        })
        .unwrap();

        let client = TwitterClient::new("id".into(), "secret".into(), "http://cb".into())
            .with_api_base("http://127.0.0.1:1");

        let result = complete_connect(&db, &client, "code", "st-old").await;
        assert!(matches!(result, Err(TwitterError::ExpiredState)));
    }

    #[tokio::test]
    async fn refresh_without_refresh_token_disconnects() {
        let db = Database::open_in_memory().unwrap();
        let uid = Uuid::new_v4().to_string();
        db.create_user(&uid, "norefresh@example.com", "$argon2id$x").unwrap();
        db.connect_twitter("r1", &uid, "acc", None, "42", "wise", "Wise", None)
            .unwrap();

        let client = TwitterClient::new("id".into(), "secret".into(), "http://cb".into())
            .with_api_base("http://127.0.0.1:1");

        let result = refresh_tokens(&db, &client, &uid).await;
        assert!(matches!(result, Err(TwitterError::TokenRefreshFailed)));
        assert!(db.get_twitter_tokens(&uid).unwrap().is_none());

        let user = db.get_user_by_id(&uid).unwrap().unwrap();
        assert!(user.twitter_username.is_none());
    }
}
