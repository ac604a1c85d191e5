//! Application setup and initialization
//!
//! Everything `main` needs to go from a loaded [`Config`] to a router,
//! split by concern so integration tests can assemble the same pieces.

pub mod database;
pub mod routes;
pub mod server;
pub mod services;
pub mod storage;

use std::sync::Arc;

use anyhow::{Context, Result};
use picode_core::Config;
use picode_infra::telemetry::LogFormat;

use crate::state::AppState;

/// Initialize the entire application
pub async fn initialize_app(config: Config) -> Result<(Arc<AppState>, axum::Router)> {
    // Validate configuration first - fail fast on misconfiguration
    config.validate().context("Configuration validation failed")?;

    picode_infra::init_telemetry(LogFormat::for_environment(config.environment()))
        .map_err(|e| anyhow::anyhow!("Failed to initialize telemetry: {}", e))?;

    tracing::info!(
        environment = %config.environment(),
        pool_backend = %config.pool_backend(),
        "Configuration loaded and validated successfully"
    );

    let pg_pool = database::setup_database(&config).await?;
    let storage = storage::setup_storage(&config).await?;
    let state = services::initialize_services(&config, pg_pool, storage).await?;
    let router = routes::setup_routes(&config, state.clone()).await?;

    Ok((state, router))
}
