use chrono::{DateTime, Utc};
use picode_core::models::{PoolRow, PoolStats, UploaderInfo};
use picode_core::{AppError, Code};

/// Durable record of materialized codes and whether each is free or claimed.
///
/// Implementations must tolerate concurrent callers. In particular `claim`
/// is a conditional update: of several callers racing for one free row,
/// exactly one observes `true`.
#[async_trait::async_trait]
pub trait CodePool: Send + Sync {
    /// Pick one free row, in no fixed order, skipping the codes in `exclude`.
    ///
    /// Backends shared between processes reserve the returned row so that
    /// no other process is handed the same code before it expires.
    async fn find_free_code(&self, exclude: &[Code]) -> Result<Option<Code>, AppError>;

    /// Insert free rows for every code not already present.
    ///
    /// Existing rows are left untouched, so a claimed row is never freed
    /// again. Returns the number of rows actually inserted.
    async fn materialize(&self, codes: &[Code]) -> Result<u64, AppError>;

    /// Mark a free row as claimed. Returns `false` if the row is missing or
    /// was already claimed.
    async fn claim(
        &self,
        code: &Code,
        uploader: &UploaderInfo,
        at: DateTime<Utc>,
    ) -> Result<bool, AppError>;

    async fn get(&self, code: &Code) -> Result<Option<PoolRow>, AppError>;

    /// Bump the view counter of a claimed row. Unknown codes are ignored.
    async fn record_view(&self, code: &Code) -> Result<(), AppError>;

    async fn stats(&self) -> Result<PoolStats, AppError>;

    /// Check connectivity with the backing store.
    async fn health_check(&self) -> Result<(), AppError>;
}
