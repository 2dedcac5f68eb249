mod config;
mod sweep;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Router, middleware,
    routing::{delete, get, post, put},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use tweetwise_ai::{AiGateway, CompletionClient};
use tweetwise_api::mailer::Mailer;
use tweetwise_api::middleware::require_auth;
use tweetwise_api::{AppState, AppStateInner, ai, auth, tweets, twitter};
use tweetwise_twitter::TwitterClient;

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tweetwise=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let config = Config::load()?;

    // Init database
    let db = tweetwise_db::Database::open(&PathBuf::from(&config.database_path))?;

    // Collaborators
    let ai_gateway = AiGateway::new(CompletionClient::new(
        config.openai_api_key.clone(),
        config.openai_api_base.clone(),
        config.openai_model.clone(),
    ));
    let twitter_client = TwitterClient::new(
        config.twitter_client_id.clone(),
        config.twitter_client_secret.clone(),
        config.twitter_redirect_uri.clone(),
    );
    let mailer = Mailer::new(
        config.smtp_host.as_deref(),
        config.smtp_username.as_deref(),
        config.smtp_password.as_deref(),
        &config.smtp_from,
    )?;

    // Shared state
    let app_state: AppState = Arc::new(AppStateInner {
        db,
        ai: ai_gateway,
        twitter: twitter_client,
        mailer,
        jwt_secret: config.jwt_secret.clone(),
        app_url: config.app_url.clone(),
    });

    // Routes
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/reset/request", post(auth::reset_request))
        .route("/auth/reset/confirm", post(auth::reset_confirm))
        .route("/twitter/callback", get(twitter::callback))
        .with_state(app_state.clone());

    let protected_routes = Router::new()
        .route("/me", get(auth::me))
        .route("/tweets", post(tweets::create_tweet))
        .route("/tweets", get(tweets::list_tweets))
        .route("/tweets/{tweet_id}", get(tweets::get_tweet))
        .route("/tweets/{tweet_id}", put(tweets::update_tweet))
        .route("/tweets/{tweet_id}", delete(tweets::delete_tweet))
        .route("/ai/spelling", post(ai::check_spelling))
        .route("/ai/grammar", post(ai::check_grammar))
        .route("/ai/critique", post(ai::critique))
        .route("/ai/curation", post(ai::curate))
        .route("/twitter/auth", get(twitter::auth_url))
        .route("/twitter/status", get(twitter::status))
        .route("/twitter/post", post(twitter::post_tweet))
        .route("/twitter/schedule", post(twitter::schedule))
        .route("/twitter/schedule/cancel", post(twitter::cancel_schedule))
        .route("/twitter/disconnect", post(twitter::disconnect))
        .route("/twitter/debug", get(twitter::debug))
        .layer(middleware::from_fn_with_state(app_state.clone(), require_auth))
        .with_state(app_state.clone());

    let app = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    // Background maintenance
    tokio::spawn(sweep::run_sweep_loop(
        app_state.clone(),
        config.sweep_interval_secs,
        config.ai_cache_retention_days,
    ));

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("TweetWise server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
