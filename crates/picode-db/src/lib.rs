//! Picode DB Library
//!
//! Persistence for the code pool and the schema migrations that create it.

pub mod db;

pub use db::{create_code_pool, CodePool, InMemoryCodePool, PostgresCodePool};

use picode_core::AppError;
use sqlx::PgPool;

/// Apply the embedded migrations from the workspace `migrations/` directory.
pub async fn run_migrations(pool: &PgPool) -> Result<(), AppError> {
    sqlx::migrate!("../../migrations")
        .run(pool)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to run migrations: {}", e)))?;

    tracing::info!("Database migrations completed");
    Ok(())
}
