use std::env;
use std::fmt::Display;
use std::str::FromStr;

use anyhow::{Context, Result};

/// Process configuration, read once at startup. Missing required
/// variables abort startup instead of failing on first use.
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_path: String,
    pub jwt_secret: String,
    pub app_url: String,
    pub openai_api_key: String,
    pub openai_api_base: Option<String>,
    pub openai_model: Option<String>,
    pub twitter_client_id: String,
    pub twitter_client_secret: String,
    pub twitter_redirect_uri: String,
    pub smtp_host: Option<String>,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
    pub smtp_from: String,
    pub ai_cache_retention_days: i64,
    pub sweep_interval_secs: u64,
}

impl Config {
    pub fn load() -> Result<Self> {
        let app_url = required("TWEETWISE_APP_URL")?;
        let app_url = app_url.trim_end_matches('/').to_string();

        Ok(Self {
            host: with_default("TWEETWISE_HOST", "0.0.0.0"),
            port: parsed("TWEETWISE_PORT", "3000")?,
            database_path: with_default("TWEETWISE_DATABASE_PATH", "tweetwise.db"),
            jwt_secret: required("TWEETWISE_JWT_SECRET")?,
            openai_api_key: required("OPENAI_API_KEY")?,
            openai_api_base: optional("OPENAI_API_BASE"),
            openai_model: optional("OPENAI_MODEL"),
            twitter_client_id: required("TWITTER_CLIENT_ID")?,
            twitter_client_secret: required("TWITTER_CLIENT_SECRET")?,
            twitter_redirect_uri: optional("TWITTER_REDIRECT_URI")
                .unwrap_or_else(|| format!("{app_url}/twitter/callback")),
            smtp_host: optional("SMTP_HOST"),
            smtp_username: optional("SMTP_USERNAME"),
            smtp_password: optional("SMTP_PASSWORD"),
            smtp_from: with_default("SMTP_FROM", "TweetWise <noreply@tweetwise.app>"),
            ai_cache_retention_days: parsed("TWEETWISE_AI_CACHE_RETENTION_DAYS", "30")?,
            sweep_interval_secs: parsed("TWEETWISE_SWEEP_INTERVAL_SECS", "900")?,
            app_url,
        })
    }
}

fn required(key: &str) -> Result<String> {
    env::var(key).with_context(|| format!("Missing required environment variable {key}"))
}

fn optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.is_empty())
}

fn with_default(key: &str, default: &str) -> String {
    optional(key).unwrap_or_else(|| default.to_string())
}

fn parsed<T: FromStr>(key: &str, default: &str) -> Result<T>
where
    T::Err: Display,
{
    with_default(key, default)
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid value for {key}: {e}"))
}
