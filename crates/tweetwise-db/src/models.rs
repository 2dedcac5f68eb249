/// Database row types; these map directly to SQLite rows.
/// Distinct from tweetwise-types API models to keep the DB layer
/// independent; timestamps stay as stored strings here.

pub struct UserRow {
    pub id: String,
    pub email: String,
    pub password: String,
    pub reset_token: Option<String>,
    pub reset_token_expires_at: Option<String>,
    pub twitter_user_id: Option<String>,
    pub twitter_username: Option<String>,
    pub twitter_name: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

pub struct TweetRow {
    pub id: String,
    pub user_id: String,
    pub content: String,
    pub status: String,
    pub scheduled_for: Option<String>,
    pub twitter_tweet_id: Option<String>,
    pub sent_at: Option<String>,
    pub error_message: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

pub struct TwitterTokenRow {
    pub id: String,
    pub user_id: String,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub twitter_user_id: String,
    pub twitter_username: String,
    pub twitter_name: String,
    pub expires_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

pub struct OAuthStateRow {
    pub state: String,
    pub user_id: String,
    pub code_verifier: String,
    pub created_at: String,
}

pub struct AiResponseRow {
    pub id: String,
    pub tweet_id: Option<String>,
    pub kind: String,
    pub request_hash: String,
    pub response: String,
    pub created_at: String,
}
