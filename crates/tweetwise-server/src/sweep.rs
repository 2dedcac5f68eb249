use std::time::Duration;

use chrono::Utc;
use tracing::{info, warn};

use tweetwise_api::AppState;
use tweetwise_twitter::oauth::STATE_TTL_MINUTES;

/// Background task that keeps the DB-backed caches bounded.
///
/// Runs on an interval, pruning AI cache rows past their retention and
/// OAuth state rows past their TTL (the lazy sweep on insert already
/// handles the common case; this catches users who never return).
pub async fn run_sweep_loop(state: AppState, interval_secs: u64, retention_days: i64) {
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));

    loop {
        interval.tick().await;

        match sweep(&state, retention_days) {
            Ok((ai, states)) => {
                if ai > 0 || states > 0 {
                    info!("Sweep: pruned {} AI cache rows, {} OAuth states", ai, states);
                }
            }
            Err(e) => {
                warn!("Sweep error: {}", e);
            }
        }
    }
}

fn sweep(state: &AppState, retention_days: i64) -> anyhow::Result<(usize, usize)> {
    let now = Utc::now();

    let ai_cutoff = tweetwise_db::timestamp(now - chrono::Duration::days(retention_days));
    let ai = state.db.sweep_ai_responses(&ai_cutoff)?;

    let state_cutoff = tweetwise_db::timestamp(now - chrono::Duration::minutes(STATE_TTL_MINUTES));
    let states = state.db.sweep_oauth_states(&state_cutoff)?;

    Ok((ai, states))
}
