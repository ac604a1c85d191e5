//! PostgreSQL code pool: the `image_codes` table.
//!
//! Several processes may share one table. `find_free_code` therefore
//! reserves the row it returns by setting `leased_until`, and skips rows
//! whose reservation has not expired yet. An upload that gives up without
//! claiming leaves the reservation to run out on its own.

use std::time::Duration;

use chrono::{DateTime, Utc};
use picode_core::models::{PoolRow, PoolStats, UploaderInfo};
use picode_core::{AppError, Code};
use sqlx::{PgPool, Postgres};

use super::code_pool::CodePool;

/// How long a returned free code stays reserved for its caller.
pub const DEFAULT_LEASE_TTL: Duration = Duration::from_secs(300);

#[derive(Clone)]
pub struct PostgresCodePool {
    pool: PgPool,
    lease_ttl: Duration,
}

impl PostgresCodePool {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            lease_ttl: DEFAULT_LEASE_TTL,
        }
    }

    /// Must outlast the slowest upload between lookup and claim.
    pub fn with_lease_ttl(mut self, lease_ttl: Duration) -> Self {
        self.lease_ttl = lease_ttl;
        self
    }
}

fn code_strings(codes: &[Code]) -> Vec<String> {
    codes.iter().map(|code| code.to_string()).collect()
}

#[async_trait::async_trait]
impl CodePool for PostgresCodePool {
    #[tracing::instrument(skip(self, exclude), fields(db.table = "image_codes", db.operation = "update", excluded = exclude.len()))]
    async fn find_free_code(&self, exclude: &[Code]) -> Result<Option<Code>, AppError> {
        let name: Option<String> = sqlx::query_scalar::<Postgres, String>(
            r#"
            UPDATE image_codes
            SET leased_until = NOW() + make_interval(secs => $2)
            WHERE name = (
                SELECT name
                FROM image_codes
                WHERE free = TRUE
                  AND (leased_until IS NULL OR leased_until < NOW())
                  AND name::text <> ALL($1::text[])
                ORDER BY random()
                LIMIT 1
                FOR UPDATE SKIP LOCKED
            )
            RETURNING name::text
            "#,
        )
        .bind(code_strings(exclude))
        .bind(self.lease_ttl.as_secs_f64())
        .fetch_optional(&self.pool)
        .await?;

        name.map(|name| {
            Code::parse(name.trim()).map_err(|e| {
                AppError::Internal(format!("Malformed code {:?} in image_codes: {}", name, e))
            })
        })
        .transpose()
    }

    #[tracing::instrument(skip(self, codes), fields(db.table = "image_codes", db.operation = "insert", batch = codes.len()))]
    async fn materialize(&self, codes: &[Code]) -> Result<u64, AppError> {
        if codes.is_empty() {
            return Ok(0);
        }

        let result = sqlx::query(
            r#"
            INSERT INTO image_codes (name, free)
            SELECT name, TRUE FROM UNNEST($1::text[]) AS t(name)
            ON CONFLICT (name) DO NOTHING
            "#,
        )
        .bind(code_strings(codes))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    #[tracing::instrument(skip(self, uploader), fields(db.table = "image_codes", db.operation = "update", code = %code))]
    async fn claim(
        &self,
        code: &Code,
        uploader: &UploaderInfo,
        at: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE image_codes
            SET free = FALSE, claimed_at = $2, uploader = $3, leased_until = NULL
            WHERE name = $1 AND free = TRUE
            "#,
        )
        .bind(code.as_str())
        .bind(at)
        .bind(uploader.address.as_deref())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    #[tracing::instrument(skip(self), fields(db.table = "image_codes", db.operation = "select", code = %code))]
    async fn get(&self, code: &Code) -> Result<Option<PoolRow>, AppError> {
        let row = sqlx::query_as::<Postgres, PoolRow>(
            r#"
            SELECT name::text AS name, created_at, claimed_at, view_count, uploader, free
            FROM image_codes
            WHERE name = $1
            "#,
        )
        .bind(code.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    #[tracing::instrument(skip(self), fields(db.table = "image_codes", db.operation = "update", code = %code))]
    async fn record_view(&self, code: &Code) -> Result<(), AppError> {
        sqlx::query("UPDATE image_codes SET view_count = view_count + 1 WHERE name = $1 AND free = FALSE")
            .bind(code.as_str())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    #[tracing::instrument(skip(self), fields(db.table = "image_codes", db.operation = "aggregate"))]
    async fn stats(&self) -> Result<PoolStats, AppError> {
        let (materialized, free, claimed): (i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT
                COUNT(*),
                COUNT(*) FILTER (WHERE free),
                COUNT(*) FILTER (WHERE NOT free)
            FROM image_codes
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(PoolStats {
            materialized,
            free,
            claimed,
        })
    }

    async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
