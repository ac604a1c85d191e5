//! Allocation cursor over the shuffled keyspace.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::{decode, generate_permutation, Code};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyspaceError {
    #[error("keyspace exhausted: requested {requested} codes, {remaining} remaining")]
    Exhausted { requested: usize, remaining: usize },
}

/// Process-wide pointer into a shuffled permutation of the keyspace.
///
/// Built once at startup and shared by handle. `take` advances the offset
/// with a compare-and-swap, so concurrent callers always receive disjoint
/// ranges. The cursor never wraps: once the permutation is spent every
/// further `take` fails.
pub struct AllocationCursor {
    permutation: Box<[u32]>,
    offset: AtomicUsize,
}

impl AllocationCursor {
    pub fn new(permutation: Vec<u32>) -> Self {
        Self {
            permutation: permutation.into_boxed_slice(),
            offset: AtomicUsize::new(0),
        }
    }

    /// Cursor over a freshly shuffled keyspace.
    pub fn shuffled() -> Self {
        Self::new(generate_permutation(&mut rand::rng()))
    }

    /// Hand out the next `n` codes and advance past them.
    pub fn take(&self, n: usize) -> Result<Vec<Code>, KeyspaceError> {
        let len = self.permutation.len();
        let start = self
            .offset
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |offset| {
                offset.checked_add(n).filter(|&end| end <= len)
            })
            .map_err(|offset| KeyspaceError::Exhausted {
                requested: n,
                remaining: len - offset,
            })?;

        Ok(self.permutation[start..start + n]
            .iter()
            .map(|&packed| decode(packed))
            .collect())
    }

    /// Codes not yet handed out.
    pub fn remaining(&self) -> usize {
        self.permutation.len() - self.offset.load(Ordering::Acquire)
    }

    pub fn issued(&self) -> usize {
        self.offset.load(Ordering::Acquire)
    }

    pub fn len(&self) -> usize {
        self.permutation.len()
    }

    pub fn is_empty(&self) -> bool {
        self.permutation.is_empty()
    }
}

impl fmt::Debug for AllocationCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AllocationCursor")
            .field("len", &self.permutation.len())
            .field("issued", &self.issued())
            .finish()
    }
}
