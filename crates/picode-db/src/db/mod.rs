//! Code pool repositories
//!
//! [`CodePool`] abstracts the durable allocation state. PostgreSQL is the
//! production backend; the in-memory pool serves development and tests.

mod code_pool;
mod memory;
mod postgres;

pub use code_pool::CodePool;
pub use memory::InMemoryCodePool;
pub use postgres::PostgresCodePool;

use std::sync::Arc;

use picode_core::{AppError, PoolBackend};
use sqlx::PgPool;

/// Build the configured pool backend.
///
/// `pg` must be provided for the Postgres backend.
pub fn create_code_pool(
    backend: PoolBackend,
    pg: Option<PgPool>,
) -> Result<Arc<dyn CodePool>, AppError> {
    match (backend, pg) {
        (PoolBackend::Postgres, Some(pool)) => {
            tracing::info!("Initializing PostgreSQL code pool");
            Ok(Arc::new(PostgresCodePool::new(pool)))
        }
        (PoolBackend::Postgres, None) => Err(AppError::Internal(
            "Postgres code pool requires a database connection".to_string(),
        )),
        (PoolBackend::Memory, _) => {
            tracing::warn!("Using in-memory code pool, allocations are lost on restart");
            Ok(Arc::new(InMemoryCodePool::new()))
        }
    }
}
