//! Pool row model: durable allocation state of one code.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// One materialized code.
///
/// Rows are created free. `free` flips to false exactly once, when an
/// upload claims the code, and never flips back.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct PoolRow {
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub claimed_at: Option<DateTime<Utc>>,
    pub view_count: i64,
    pub uploader: Option<String>,
    pub free: bool,
}

/// Aggregate counters over the pool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PoolStats {
    /// Rows created so far.
    pub materialized: i64,
    /// Rows available for allocation.
    pub free: i64,
    /// Rows bound to an uploaded image.
    pub claimed: i64,
}
