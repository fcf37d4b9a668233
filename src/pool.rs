//! Fixed-capacity concurrency gate for render jobs.
//!
//! Capacity is `workers * threads_per_worker`, fixed at startup. A slot must
//! be held for the whole life of a job; requests beyond capacity are refused
//! immediately rather than queued, so the caller can signal "retry later".

use std::sync::Arc;

use tokio::sync::{Semaphore, TryAcquireError};

use crate::error::{RenderError, Result};

#[derive(Debug, Clone)]
pub struct RenderPool {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

/// A held render slot. Dropping it returns the slot to the pool, so release
/// happens on every exit path, including panics.
#[derive(Debug)]
pub struct RenderSlot {
    _permit: tokio::sync::OwnedSemaphorePermit,
}

impl RenderPool {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "render pool capacity must be positive");
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Slots currently free.
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Claim a slot without waiting. Fails with `Capacity` when the pool is
    /// exhausted.
    pub fn try_acquire(&self) -> Result<RenderSlot> {
        match self.semaphore.clone().try_acquire_owned() {
            Ok(permit) => Ok(RenderSlot { _permit: permit }),
            Err(TryAcquireError::NoPermits) => Err(RenderError::Capacity),
            // The semaphore is never closed while the pool is alive.
            Err(TryAcquireError::Closed) => {
                Err(RenderError::Internal("render pool closed".to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_is_reported() {
        let pool = RenderPool::new(3);
        assert_eq!(pool.capacity(), 3);
        assert_eq!(pool.available(), 3);
    }

    #[test]
    fn slot_is_returned_on_drop() {
        let pool = RenderPool::new(1);
        let slot = pool.try_acquire().unwrap();
        assert_eq!(pool.available(), 0);
        drop(slot);
        assert_eq!(pool.available(), 1);
    }

    #[test]
    fn acquire_beyond_capacity_is_refused() {
        let pool = RenderPool::new(2);
        let _a = pool.try_acquire().unwrap();
        let _b = pool.try_acquire().unwrap();
        assert!(matches!(pool.try_acquire(), Err(RenderError::Capacity)));
    }
}
