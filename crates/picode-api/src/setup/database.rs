//! PostgreSQL connection for the code pool

use std::time::Duration;

use anyhow::{Context, Result};
use picode_core::{Config, PoolBackend};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

/// Connect to PostgreSQL and apply migrations. Returns `None` for the
/// in-memory pool backend.
pub async fn setup_database(config: &Config) -> Result<Option<PgPool>> {
    if config.pool_backend() == PoolBackend::Memory {
        tracing::info!("In-memory pool backend selected, skipping database setup");
        return Ok(None);
    }

    let database_url = config
        .database_url()
        .context("DATABASE_URL must be set when POOL_BACKEND=postgres")?;

    tracing::info!("Connecting to code pool database");
    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections())
        .acquire_timeout(Duration::from_secs(config.db_timeout_seconds()))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .connect(database_url)
        .await
        .context("Failed to connect to database")?;

    tracing::info!(
        max_connections = config.db_max_connections(),
        "Code pool database connected"
    );

    picode_db::run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;

    Ok(Some(pool))
}
