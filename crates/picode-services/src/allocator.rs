//! Name allocation
//!
//! The allocator hands out codes that are free in the pool. When the pool
//! has no free row left it grows it lazily: the next batch of the shuffled
//! keyspace is taken from the cursor and materialized, then the lookup is
//! retried. The pool only ever holds as many rows as were needed.
//!
//! Allocation does not claim. The caller writes its artifacts first and
//! claims afterwards through [`NameAllocator::claim`]; until then the code
//! is held by a [`CodeLease`] so no other caller in this process picks it.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use picode_core::models::UploaderInfo;
use picode_core::{AllocationCursor, AppError, Code, KeyspaceError};
use picode_db::CodePool;

type LeaseSet = Arc<Mutex<HashSet<Code>>>;

fn lock(leases: &LeaseSet) -> MutexGuard<'_, HashSet<Code>> {
    leases.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Exclusive in-process hold on a free code.
///
/// Dropping the lease releases the code whether or not it was claimed. A
/// released, unclaimed code stays free in the pool and is picked up again
/// by a later allocation.
#[derive(Debug)]
pub struct CodeLease {
    code: Code,
    leases: LeaseSet,
}

impl CodeLease {
    pub fn code(&self) -> &Code {
        &self.code
    }
}

impl Drop for CodeLease {
    fn drop(&mut self) {
        lock(&self.leases).remove(&self.code);
    }
}

pub struct NameAllocator {
    pool: Arc<dyn CodePool>,
    cursor: Arc<AllocationCursor>,
    leases: LeaseSet,
    batch_size: usize,
    max_attempts: u32,
}

impl NameAllocator {
    pub fn new(
        pool: Arc<dyn CodePool>,
        cursor: Arc<AllocationCursor>,
        batch_size: usize,
        max_attempts: u32,
    ) -> Self {
        Self {
            pool,
            cursor,
            leases: Arc::new(Mutex::new(HashSet::new())),
            batch_size: batch_size.max(1),
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn pool(&self) -> &Arc<dyn CodePool> {
        &self.pool
    }

    pub fn cursor(&self) -> &AllocationCursor {
        &self.cursor
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Number of codes currently leased in this process.
    pub fn leased(&self) -> usize {
        lock(&self.leases).len()
    }

    /// Lease a code that is free in the pool.
    ///
    /// Fails with `KeyspaceExhausted` once the pool has no free row and the
    /// cursor has nothing left to materialize, and with `AllocationFailed`
    /// when other callers keep taking every freshly materialized code.
    #[tracing::instrument(skip(self), fields(allocator.batch_size = self.batch_size))]
    pub async fn allocate(&self) -> Result<CodeLease, AppError> {
        let mut contended: u32 = 0;

        loop {
            let exclude: Vec<Code> = lock(&self.leases).iter().cloned().collect();

            if let Some(code) = self.pool.find_free_code(&exclude).await? {
                if let Some(lease) = self.try_lease(code) {
                    tracing::debug!(code = %lease.code(), "Leased free code");
                    return Ok(lease);
                }
                // leased by another task after the snapshot above
                contended += 1;
            } else {
                let batch = self.next_batch()?;
                let inserted = self.pool.materialize(&batch).await?;

                tracing::info!(
                    batch_size = batch.len(),
                    inserted,
                    remaining = self.cursor.remaining(),
                    "No free codes in pool, materializing batch"
                );

                // rows that already existed cost nothing; the cursor bounds this
                if inserted == 0 {
                    continue;
                }
                contended += 1;
            }

            if contended > self.max_attempts {
                tracing::warn!(attempts = contended, "Giving up on code allocation");
                return Err(AppError::AllocationFailed {
                    attempts: contended,
                });
            }
        }
    }

    /// Claim the leased code for `uploader`. Returns `false` if another
    /// process claimed it first.
    #[tracing::instrument(skip(self, lease), fields(code = %lease.code()))]
    pub async fn claim(&self, lease: &CodeLease, uploader: &UploaderInfo) -> Result<bool, AppError> {
        self.pool.claim(lease.code(), uploader, Utc::now()).await
    }

    fn try_lease(&self, code: Code) -> Option<CodeLease> {
        if !lock(&self.leases).insert(code.clone()) {
            return None;
        }
        Some(CodeLease {
            code,
            leases: Arc::clone(&self.leases),
        })
    }

    /// Next batch from the cursor, shortened to whatever is left of the
    /// keyspace.
    fn next_batch(&self) -> Result<Vec<Code>, AppError> {
        loop {
            let remaining = self.cursor.remaining();
            if remaining == 0 {
                return Err(KeyspaceError::Exhausted {
                    requested: self.batch_size,
                    remaining,
                }
                .into());
            }

            match self.cursor.take(self.batch_size.min(remaining)) {
                Ok(batch) => return Ok(batch),
                // another caller advanced the cursor in between
                Err(KeyspaceError::Exhausted { .. }) => continue,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use chrono::DateTime;
    use picode_core::code::encode;
    use picode_core::models::{PoolRow, PoolStats};
    use picode_db::InMemoryCodePool;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    /// In-memory pool that counts materialize calls.
    #[derive(Default)]
    struct CountingPool {
        inner: InMemoryCodePool,
        materialize_calls: AtomicUsize,
        materialized_codes: Mutex<Vec<Code>>,
    }

    #[async_trait::async_trait]
    impl CodePool for CountingPool {
        async fn find_free_code(&self, exclude: &[Code]) -> Result<Option<Code>, AppError> {
            self.inner.find_free_code(exclude).await
        }

        async fn materialize(&self, codes: &[Code]) -> Result<u64, AppError> {
            self.materialize_calls.fetch_add(1, Ordering::SeqCst);
            self.materialized_codes
                .lock()
                .unwrap()
                .extend(codes.iter().cloned());
            self.inner.materialize(codes).await
        }

        async fn claim(
            &self,
            code: &Code,
            uploader: &UploaderInfo,
            at: DateTime<Utc>,
        ) -> Result<bool, AppError> {
            self.inner.claim(code, uploader, at).await
        }

        async fn get(&self, code: &Code) -> Result<Option<PoolRow>, AppError> {
            self.inner.get(code).await
        }

        async fn record_view(&self, code: &Code) -> Result<(), AppError> {
            self.inner.record_view(code).await
        }

        async fn stats(&self) -> Result<PoolStats, AppError> {
            self.inner.stats().await
        }

        async fn health_check(&self) -> Result<(), AppError> {
            Ok(())
        }
    }

    fn seeded_cursor() -> Arc<AllocationCursor> {
        let mut rng = StdRng::seed_from_u64(7);
        Arc::new(AllocationCursor::new(
            picode_core::code::generate_permutation(&mut rng),
        ))
    }

    fn tiny_cursor(codes: &[&str]) -> Arc<AllocationCursor> {
        let packed = codes
            .iter()
            .map(|s| encode(&Code::parse(s).unwrap()))
            .collect();
        Arc::new(AllocationCursor::new(packed))
    }

    #[tokio::test]
    async fn test_empty_pool_materializes_one_batch() {
        let pool = Arc::new(CountingPool::default());
        let allocator = NameAllocator::new(pool.clone(), seeded_cursor(), 100, 8);

        let lease = allocator.allocate().await.unwrap();

        assert_eq!(pool.materialize_calls.load(Ordering::SeqCst), 1);
        let batch = pool.materialized_codes.lock().unwrap().clone();
        assert_eq!(batch.len(), 100);
        assert!(batch.contains(lease.code()));

        // allocation alone does not claim
        let row = pool.get(lease.code()).await.unwrap().unwrap();
        assert!(row.free);

        assert!(allocator
            .claim(&lease, &UploaderInfo::from_address("10.0.0.1"))
            .await
            .unwrap());
        let row = pool.get(lease.code()).await.unwrap().unwrap();
        assert!(!row.free);
        assert_eq!(row.uploader.as_deref(), Some("10.0.0.1"));
        assert!(row.claimed_at.is_some());
    }

    #[tokio::test]
    async fn test_second_allocation_reuses_existing_rows() {
        let pool = Arc::new(CountingPool::default());
        let allocator = NameAllocator::new(pool.clone(), seeded_cursor(), 100, 8);

        let first = allocator.allocate().await.unwrap();
        let second = allocator.allocate().await.unwrap();

        assert_ne!(first.code(), second.code());
        assert_eq!(pool.materialize_calls.load(Ordering::SeqCst), 1);
        assert_eq!(allocator.cursor().issued(), 100);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_allocations_are_distinct() {
        let pool: Arc<dyn CodePool> = Arc::new(InMemoryCodePool::new());
        let allocator = Arc::new(NameAllocator::new(pool.clone(), seeded_cursor(), 100, 8));

        let handles: Vec<_> = (0..50)
            .map(|i| {
                let allocator = Arc::clone(&allocator);
                tokio::spawn(async move {
                    let lease = allocator.allocate().await.unwrap();
                    let uploader = UploaderInfo::from_address(format!("10.0.0.{}", i));
                    assert!(allocator.claim(&lease, &uploader).await.unwrap());
                    lease.code().clone()
                })
            })
            .collect();

        let codes: Vec<Code> = futures::future::join_all(handles)
            .await
            .into_iter()
            .map(|result| result.unwrap())
            .collect();
        let distinct: HashSet<&Code> = codes.iter().collect();

        assert_eq!(distinct.len(), 50);
        assert_eq!(pool.stats().await.unwrap().claimed, 50);
        assert_eq!(allocator.leased(), 0);
    }

    #[tokio::test]
    async fn test_live_lease_is_excluded() {
        let pool: Arc<dyn CodePool> = Arc::new(InMemoryCodePool::new());
        let allocator = NameAllocator::new(pool, tiny_cursor(&["bakul", "mirot"]), 2, 8);

        let first = allocator.allocate().await.unwrap();
        let second = allocator.allocate().await.unwrap();
        assert_ne!(first.code(), second.code());
        assert_eq!(allocator.leased(), 2);
    }

    #[tokio::test]
    async fn test_dropped_lease_frees_code() {
        let pool: Arc<dyn CodePool> = Arc::new(InMemoryCodePool::new());
        let allocator = NameAllocator::new(pool.clone(), tiny_cursor(&["bakul"]), 1, 8);

        let lease = allocator.allocate().await.unwrap();
        assert_eq!(lease.code().as_str(), "bakul");
        drop(lease);
        assert_eq!(allocator.leased(), 0);

        let again = allocator.allocate().await.unwrap();
        assert_eq!(again.code().as_str(), "bakul");
        assert!(pool.get(again.code()).await.unwrap().unwrap().free);
    }

    #[tokio::test]
    async fn test_exhausted_keyspace_is_explicit() {
        let pool: Arc<dyn CodePool> = Arc::new(InMemoryCodePool::new());
        let allocator = NameAllocator::new(pool, tiny_cursor(&["bakul", "mirot", "sefan"]), 2, 8);

        let mut leases = Vec::new();
        for _ in 0..3 {
            let lease = allocator.allocate().await.unwrap();
            assert!(allocator
                .claim(&lease, &UploaderInfo::anonymous())
                .await
                .unwrap());
            leases.push(lease);
        }
        assert_eq!(allocator.cursor().remaining(), 0);

        match allocator.allocate().await {
            Err(AppError::KeyspaceExhausted(_)) => {}
            other => panic!("expected KeyspaceExhausted, got {:?}", other.map(|l| l.code().clone())),
        }
    }

    #[tokio::test]
    async fn test_already_present_rows_do_not_count_as_attempts() {
        let pool: Arc<dyn CodePool> = Arc::new(InMemoryCodePool::new());
        let claimed = ["bakul", "mirot", "sefan", "tokeb"];
        for name in claimed {
            let code = Code::parse(name).unwrap();
            pool.materialize(std::slice::from_ref(&code)).await.unwrap();
            pool.claim(&code, &UploaderInfo::anonymous(), Utc::now())
                .await
                .unwrap();
        }

        // a restarted process whose cursor starts over already-claimed codes
        let cursor = tiny_cursor(&["bakul", "mirot", "sefan", "tokeb", "wuzyx"]);
        let allocator = NameAllocator::new(pool, cursor, 1, 1);

        let lease = allocator.allocate().await.unwrap();
        assert_eq!(lease.code().as_str(), "wuzyx");
    }
}
