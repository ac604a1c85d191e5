//! Service wiring

use std::sync::Arc;

use anyhow::{Context, Result};
use picode_core::{AllocationCursor, Config};
use picode_db::create_code_pool;
use picode_services::{IngestionPipeline, IngestionSettings, NameAllocator, Storage};
use sqlx::PgPool;

use crate::state::AppState;

/// Build the pool, the allocation cursor and the services on top of them.
///
/// The keyspace is shuffled once here and shared by every request for the
/// lifetime of the process.
pub async fn initialize_services(
    config: &Config,
    pg_pool: Option<PgPool>,
    storage: Arc<dyn Storage>,
) -> Result<Arc<AppState>> {
    let pool = create_code_pool(config.pool_backend(), pg_pool)
        .context("Failed to create code pool")?;

    let cursor = tokio::task::spawn_blocking(AllocationCursor::shuffled)
        .await
        .context("Failed to shuffle keyspace")?;
    tracing::info!(keyspace_size = cursor.len(), "Keyspace shuffled");

    let allocator = Arc::new(NameAllocator::new(
        pool.clone(),
        Arc::new(cursor),
        config.allocation_batch_size(),
        config.allocation_max_attempts(),
    ));

    let ingestion = Arc::new(IngestionPipeline::new(
        allocator.clone(),
        storage.clone(),
        IngestionSettings::from_config(config),
    ));

    Ok(Arc::new(AppState {
        config: config.clone(),
        pool,
        storage,
        allocator,
        ingestion,
    }))
}
