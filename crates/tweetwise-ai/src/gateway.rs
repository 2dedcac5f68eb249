use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};
use uuid::Uuid;

use tweetwise_db::Database;
use tweetwise_types::models::SuggestionKind;

use crate::client::CompletionClient;
use crate::error::AiError;
use crate::parse::parse_payload;
use crate::prompts;

/// One analysis result as handed to the HTTP layer: the kind-specific
/// payload plus the cache/degradation flags.
#[derive(Debug)]
pub struct AnalysisOutcome {
    pub payload: Value,
    pub cached: bool,
    pub degraded: bool,
}

pub struct AiGateway {
    client: CompletionClient,
}

impl AiGateway {
    pub fn new(client: CompletionClient) -> Self {
        Self { client }
    }

    /// Cache lookup -> completion -> parse -> store. Identical text
    /// always maps to the same request hash, so the second identical
    /// call is served from the cache. Degraded results are never
    /// cached; the next attempt gets a fresh completion.
    pub async fn analyze(
        &self,
        db: &Database,
        kind: SuggestionKind,
        text: &str,
        tweet_id: Option<&str>,
    ) -> Result<AnalysisOutcome, AiError> {
        let hash = request_hash(kind, text);

        if let Some(row) = db.get_ai_response(&hash)? {
            match serde_json::from_str::<Value>(&row.response) {
                Ok(payload) => {
                    debug!(kind = kind.as_str(), "AI cache hit");
                    return Ok(AnalysisOutcome {
                        payload,
                        cached: true,
                        degraded: false,
                    });
                }
                Err(e) => {
                    // corrupt cache row: treat as a miss and overwrite
                    warn!(kind = kind.as_str(), error = %e, "Corrupt AI cache row, refetching");
                }
            }
        }

        let raw = self
            .client
            .complete(
                prompts::system_prompt(kind),
                &prompts::user_prompt(kind, text),
                prompts::temperature(kind),
            )
            .await?;

        let (payload, degraded) = parse_payload(kind, &raw);

        if !degraded {
            db.insert_ai_response(
                &Uuid::new_v4().to_string(),
                tweet_id,
                kind.as_str(),
                &hash,
                &payload.to_string(),
            )?;
        }

        Ok(AnalysisOutcome {
            payload,
            cached: false,
            degraded,
        })
    }
}

/// Cache key: kind-namespaced content hash.
pub fn request_hash(kind: SuggestionKind, text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(kind.as_str().as_bytes());
    hasher.update(b":");
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}
