mod app;
mod auth;
mod config;
mod db;
mod error;
mod json;
mod profile;
mod state;
mod users;

use crate::{config::AppConfig, state::AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "user_auth_service=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let config = AppConfig::from_env()?;
    // A database we cannot reach is fatal: bail before binding the listener.
    let state = AppState::init(config).await.map_err(|e| {
        tracing::error!(error = %e, "failed to initialize database");
        e
    })?;

    let config = state.config.clone();
    app::serve(app::build_app(state), &config).await
}
