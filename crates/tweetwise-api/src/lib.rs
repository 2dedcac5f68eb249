pub mod ai;
pub mod auth;
pub mod error;
pub mod mailer;
pub mod middleware;
pub mod tweets;
pub mod twitter;

use std::sync::Arc;

use tweetwise_ai::AiGateway;
use tweetwise_db::Database;
use tweetwise_twitter::TwitterClient;

use crate::mailer::Mailer;

/// Tweet length ceiling enforced at the handler boundary, both for
/// direct creation and for posting to Twitter.
pub const MAX_TWEET_LEN: usize = 280;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub ai: AiGateway,
    pub twitter: TwitterClient,
    pub mailer: Mailer,
    pub jwt_secret: String,
    /// Public base URL of the web app; OAuth callback redirects land
    /// on `{app_url}/dashboard`.
    pub app_url: String,
}
