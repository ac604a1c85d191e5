//! In-process code pool.
//!
//! Not durable: every row is lost on restart. Used for local development
//! and by the test suites.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use picode_core::models::{PoolRow, PoolStats, UploaderInfo};
use picode_core::{AppError, Code};
use rand::seq::IteratorRandom;
use tokio::sync::Mutex;

use super::code_pool::CodePool;

#[derive(Default)]
pub struct InMemoryCodePool {
    rows: Mutex<HashMap<Code, PoolRow>>,
}

impl InMemoryCodePool {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl CodePool for InMemoryCodePool {
    async fn find_free_code(&self, exclude: &[Code]) -> Result<Option<Code>, AppError> {
        let rows = self.rows.lock().await;
        let excluded: HashSet<&Code> = exclude.iter().collect();

        let picked = rows
            .values()
            .filter(|row| row.free)
            .filter_map(|row| Code::parse(&row.name).ok())
            .filter(|code| !excluded.contains(code))
            .choose(&mut rand::rng());

        Ok(picked)
    }

    async fn materialize(&self, codes: &[Code]) -> Result<u64, AppError> {
        let mut rows = self.rows.lock().await;
        let now = Utc::now();
        let mut inserted = 0;

        for code in codes {
            if rows.contains_key(code) {
                continue;
            }
            rows.insert(
                code.clone(),
                PoolRow {
                    name: code.to_string(),
                    created_at: now,
                    claimed_at: None,
                    view_count: 0,
                    uploader: None,
                    free: true,
                },
            );
            inserted += 1;
        }

        Ok(inserted)
    }

    async fn claim(
        &self,
        code: &Code,
        uploader: &UploaderInfo,
        at: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let mut rows = self.rows.lock().await;
        match rows.get_mut(code) {
            Some(row) if row.free => {
                row.free = false;
                row.claimed_at = Some(at);
                row.uploader = uploader.address.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn get(&self, code: &Code) -> Result<Option<PoolRow>, AppError> {
        Ok(self.rows.lock().await.get(code).cloned())
    }

    async fn record_view(&self, code: &Code) -> Result<(), AppError> {
        if let Some(row) = self.rows.lock().await.get_mut(code) {
            if !row.free {
                row.view_count += 1;
            }
        }
        Ok(())
    }

    async fn stats(&self) -> Result<PoolStats, AppError> {
        let rows = self.rows.lock().await;
        let free = rows.values().filter(|row| row.free).count() as i64;
        let materialized = rows.len() as i64;

        Ok(PoolStats {
            materialized,
            free,
            claimed: materialized - free,
        })
    }

    async fn health_check(&self) -> Result<(), AppError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn codes(names: &[&str]) -> Vec<Code> {
        names.iter().map(|s| Code::parse(s).unwrap()).collect()
    }

    #[tokio::test]
    async fn test_empty_pool_has_no_free_code() {
        let pool = InMemoryCodePool::new();
        assert!(pool.find_free_code(&[]).await.unwrap().is_none());
        assert_eq!(pool.stats().await.unwrap(), PoolStats::default());
    }

    #[tokio::test]
    async fn test_materialize_then_find() {
        let pool = InMemoryCodePool::new();
        let batch = codes(&["bakul", "mirot", "sefuz"]);
        assert_eq!(pool.materialize(&batch).await.unwrap(), 3);

        let found = pool.find_free_code(&[]).await.unwrap().unwrap();
        assert!(batch.contains(&found));

        let stats = pool.stats().await.unwrap();
        assert_eq!(stats.materialized, 3);
        assert_eq!(stats.free, 3);
        assert_eq!(stats.claimed, 0);
    }

    #[tokio::test]
    async fn test_find_respects_exclusions() {
        let pool = InMemoryCodePool::new();
        let batch = codes(&["bakul", "mirot"]);
        pool.materialize(&batch).await.unwrap();

        let found = pool.find_free_code(&batch[..1]).await.unwrap();
        assert_eq!(found, Some(batch[1].clone()));
        assert!(pool.find_free_code(&batch).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_materialize_is_idempotent_and_keeps_claims() {
        let pool = InMemoryCodePool::new();
        let batch = codes(&["bakul", "mirot"]);
        pool.materialize(&batch).await.unwrap();

        let uploader = UploaderInfo::from_address("203.0.113.9");
        assert!(pool.claim(&batch[0], &uploader, Utc::now()).await.unwrap());

        assert_eq!(pool.materialize(&batch).await.unwrap(), 0);

        let row = pool.get(&batch[0]).await.unwrap().unwrap();
        assert!(!row.free);
        assert_eq!(row.uploader.as_deref(), Some("203.0.113.9"));
        assert_eq!(pool.stats().await.unwrap().materialized, 2);
    }

    #[tokio::test]
    async fn test_claim_is_conditional() {
        let pool = InMemoryCodePool::new();
        let batch = codes(&["bakul"]);
        pool.materialize(&batch).await.unwrap();

        let uploader = UploaderInfo::anonymous();
        assert!(pool.claim(&batch[0], &uploader, Utc::now()).await.unwrap());
        assert!(!pool.claim(&batch[0], &uploader, Utc::now()).await.unwrap());

        let missing = Code::parse("tovix").unwrap();
        assert!(!pool.claim(&missing, &uploader, Utc::now()).await.unwrap());
        assert!(pool.find_free_code(&[]).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_concurrent_claims_have_one_winner() {
        let pool = Arc::new(InMemoryCodePool::new());
        let code = Code::parse("bakul").unwrap();
        pool.materialize(std::slice::from_ref(&code)).await.unwrap();

        let handles: Vec<_> = (0..20)
            .map(|_| {
                let pool = Arc::clone(&pool);
                let code = code.clone();
                tokio::spawn(async move {
                    pool.claim(&code, &UploaderInfo::anonymous(), Utc::now())
                        .await
                        .unwrap()
                })
            })
            .collect();

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn test_record_view_counts_claimed_rows_only() {
        let pool = InMemoryCodePool::new();
        let batch = codes(&["bakul", "mirot"]);
        pool.materialize(&batch).await.unwrap();
        pool.claim(&batch[0], &UploaderInfo::anonymous(), Utc::now())
            .await
            .unwrap();

        pool.record_view(&batch[0]).await.unwrap();
        pool.record_view(&batch[0]).await.unwrap();
        pool.record_view(&batch[1]).await.unwrap();
        pool.record_view(&Code::parse("tovix").unwrap()).await.unwrap();

        assert_eq!(pool.get(&batch[0]).await.unwrap().unwrap().view_count, 2);
        assert_eq!(pool.get(&batch[1]).await.unwrap().unwrap().view_count, 0);
    }
}
