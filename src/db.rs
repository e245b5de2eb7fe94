use std::time::Duration;

use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::config::DatabaseConfig;

const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_LIFETIME: Duration = Duration::from_secs(5 * 60);

/// Opens the shared pool and checks it can actually run a query.
pub async fn connect(cfg: &DatabaseConfig) -> anyhow::Result<PgPool> {
    tracing::info!(host = %cfg.host, port = cfg.port, "connecting to postgres");

    let db = PgPoolOptions::new()
        .max_connections(cfg.max_connections)
        .max_lifetime(MAX_LIFETIME)
        .acquire_timeout(ACQUIRE_TIMEOUT)
        .connect(&cfg.connection_url())
        .await
        .context("connect to database")?;

    verify_connection(&db).await?;
    tracing::info!("connected to database");
    Ok(db)
}

async fn verify_connection(db: &PgPool) -> anyhow::Result<()> {
    let check = sqlx::query_scalar::<_, i32>("SELECT 1").fetch_one(db);
    let one = tokio::time::timeout(ACQUIRE_TIMEOUT, check)
        .await
        .context("database connectivity check timed out")?
        .context("database connectivity check failed")?;
    anyhow::ensure!(one == 1, "unexpected connectivity check result");
    Ok(())
}
