use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::error::TwitterError;

const DEFAULT_API_BASE: &str = "https://api.twitter.com";
const DEFAULT_AUTHORIZE_URL: &str = "https://twitter.com/i/oauth2/authorize";

/// Scopes requested on connect. `offline.access` is what makes Twitter
/// issue a refresh token, and it still sometimes doesn't.
const SCOPES: &str = "tweet.read tweet.write users.read offline.access";

/// Thin wrapper over the Twitter v2 REST API. No retries; failures are
/// classified and surfaced to the token lifecycle.
pub struct TwitterClient {
    http: reqwest::Client,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    api_base: String,
    authorize_url: String,
}

#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub scope: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TwitterUser {
    pub id: String,
    pub username: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
struct DataEnvelope<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
struct CreatedTweet {
    id: String,
}

/// How a failed credentials probe should be handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    NeedsRefresh,
    Revoked,
    Other,
}

impl TwitterClient {
    pub fn new(client_id: String, client_secret: String, redirect_uri: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            client_id,
            client_secret,
            redirect_uri,
            api_base: DEFAULT_API_BASE.to_string(),
            authorize_url: DEFAULT_AUTHORIZE_URL.to_string(),
        }
    }

    /// Point the client at a different API host (test doubles).
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into();
        self
    }

    /// The user-facing authorization URL for the PKCE flow.
    pub fn authorize_url(&self, state: &str, code_challenge: &str) -> String {
        let url = reqwest::Url::parse_with_params(
            &self.authorize_url,
            &[
                ("response_type", "code"),
                ("client_id", self.client_id.as_str()),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("scope", SCOPES),
                ("state", state),
                ("code_challenge", code_challenge),
                ("code_challenge_method", "S256"),
            ],
        )
        .expect("static authorize URL is valid");
        url.to_string()
    }

    /// Exchanges an authorization code + verifier for a token pair.
    pub async fn exchange_code(
        &self,
        code: &str,
        code_verifier: &str,
    ) -> Result<TokenResponse, TwitterError> {
        let resp = self
            .http
            .post(format!("{}/2/oauth2/token", self.api_base))
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("code_verifier", code_verifier),
                ("client_id", self.client_id.as_str()),
            ])
            .send()
            .await?;
        read_json(resp).await
    }

    /// Exchanges a refresh token for a new pair.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse, TwitterError> {
        let resp = self
            .http
            .post(format!("{}/2/oauth2/token", self.api_base))
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
                ("client_id", self.client_id.as_str()),
            ])
            .send()
            .await?;
        read_json(resp).await
    }

    /// Credentials probe; also the profile fetch after connect.
    pub async fn me(&self, access_token: &str) -> Result<TwitterUser, TwitterError> {
        let resp = self
            .http
            .get(format!("{}/2/users/me", self.api_base))
            .bearer_auth(access_token)
            .send()
            .await?;
        let envelope: DataEnvelope<TwitterUser> = read_json(resp).await?;
        Ok(envelope.data)
    }

    /// Posts a tweet, returning the external tweet id.
    pub async fn post_tweet(&self, access_token: &str, text: &str) -> Result<String, TwitterError> {
        let resp = self
            .http
            .post(format!("{}/2/tweets", self.api_base))
            .bearer_auth(access_token)
            .json(&serde_json::json!({ "text": text }))
            .send()
            .await?;
        let envelope: DataEnvelope<CreatedTweet> = read_json(resp).await?;
        Ok(envelope.data.id)
    }
}

async fn read_json<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, TwitterError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp.json().await?);
    }
    if status.as_u16() == 429 {
        return Err(TwitterError::RateLimited);
    }
    let message = resp.text().await.unwrap_or_default();
    Err(TwitterError::Api {
        status: status.as_u16(),
        message: message.chars().take(500).collect(),
    })
}

/// Sorts a failed probe into refresh / revoked / other by status code
/// and substring match on the error body, mirroring how Twitter words
/// these failures.
pub fn classify_probe(status: u16, message: &str) -> ProbeOutcome {
    let lower = message.to_lowercase();
    if lower.contains("revoked") || lower.contains("suspended") {
        ProbeOutcome::Revoked
    } else if status == 401 || lower.contains("invalid_token") || lower.contains("unauthorized") {
        ProbeOutcome::NeedsRefresh
    } else {
        ProbeOutcome::Other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authorize_url_carries_pkce_params() {
        let client = TwitterClient::new(
            "client-123".into(),
            "secret".into(),
            "https://app.example.com/twitter/callback".into(),
        );
        let url = client.authorize_url("state-abc", "challenge-xyz");

        assert!(url.starts_with("https://twitter.com/i/oauth2/authorize?"));
        assert!(url.contains("response_type=code"));
        assert!(url.contains("client_id=client-123"));
        assert!(url.contains("state=state-abc"));
        assert!(url.contains("code_challenge=challenge-xyz"));
        assert!(url.contains("code_challenge_method=S256"));
        assert!(url.contains("offline.access"));
        // redirect URI is percent-encoded
        assert!(url.contains("redirect_uri=https%3A%2F%2Fapp.example.com%2Ftwitter%2Fcallback"));
    }

    #[test]
    fn probe_classification() {
        assert_eq!(classify_probe(401, "Unauthorized"), ProbeOutcome::NeedsRefresh);
        assert_eq!(
            classify_probe(400, "{\"error\":\"invalid_token\"}"),
            ProbeOutcome::NeedsRefresh
        );
        assert_eq!(
            classify_probe(403, "Your account access has been revoked"),
            ProbeOutcome::Revoked
        );
        assert_eq!(
            classify_probe(403, "User has been suspended"),
            ProbeOutcome::Revoked
        );
        assert_eq!(classify_probe(500, "Internal error"), ProbeOutcome::Other);
    }

    #[test]
    fn token_response_tolerates_missing_refresh_token() {
        let json = r#"{"token_type":"bearer","access_token":"abc","expires_in":7200}"#;
        let parsed: TokenResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.access_token, "abc");
        assert!(parsed.refresh_token.is_none());
        assert_eq!(parsed.expires_in, Some(7200));
    }
}
