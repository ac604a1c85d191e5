//! Health check handler and response types.

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use picode_core::PoolStats;
use serde::Serialize;
use utoipa::ToSchema;

use crate::state::AppState;

const CHECK_TIMEOUT: Duration = Duration::from_secs(5);

/// Run an async check with timeout; returns "healthy", "timeout", or "unhealthy: {error}".
async fn run_check<F, E>(timeout: Duration, f: F) -> String
where
    F: Future<Output = Result<(), E>>,
    E: Display,
{
    match tokio::time::timeout(timeout, f).await {
        Ok(Ok(())) => "healthy".to_string(),
        Ok(Err(e)) => format!("unhealthy: {}", e),
        Err(_) => "timeout".to_string(),
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// `healthy` or `degraded`.
    pub status: String,
    pub database: String,
    pub storage: String,
    /// Pool row counts, absent when the pool could not be read.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pool: Option<PoolStats>,
    /// Codes this process can still materialize.
    pub keyspace_remaining: usize,
    /// Codes currently held by in-flight uploads of this process.
    pub leased: usize,
}

/// Liveness plus pool statistics.
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Service healthy", body = HealthResponse),
        (status = 503, description = "Pool or storage unavailable", body = HealthResponse)
    )
)]
pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let pool = state.pool.clone();
    let database = run_check(CHECK_TIMEOUT, async move { pool.health_check().await }).await;

    let storage = state.storage.clone();
    let fallback = state.config.fallback_image().to_string();
    let storage_status = run_check(CHECK_TIMEOUT, async move {
        match storage.exists(&fallback).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(format!("placeholder {} is missing", fallback)),
            Err(e) => Err(e.to_string()),
        }
    })
    .await;

    let stats = match tokio::time::timeout(CHECK_TIMEOUT, state.pool.stats()).await {
        Ok(Ok(stats)) => Some(stats),
        Ok(Err(e)) => {
            tracing::error!(error = %e, "Failed to read pool statistics");
            None
        }
        Err(_) => None,
    };

    let healthy = database == "healthy" && storage_status == "healthy";
    let response = HealthResponse {
        status: if healthy { "healthy" } else { "degraded" }.to_string(),
        database,
        storage: storage_status,
        pool: stats,
        keyspace_remaining: state.allocator.cursor().remaining(),
        leased: state.allocator.leased(),
    };

    let status_code = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(response))
}
