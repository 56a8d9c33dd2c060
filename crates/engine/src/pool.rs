// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker slot pool
//!
//! Fixed-capacity admission control for processing tasks. A [`WorkerSlot`]
//! is the permission to run one task; it returns to its pool when dropped,
//! so a task that fails or panics still gives its slot back.

use crate::error::PoolError;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, OwnedSemaphorePermit, Semaphore};

static NEXT_POOL_ID: AtomicU64 = AtomicU64::new(1);

/// Bounded pool of worker slots, cheap to clone
#[derive(Clone)]
pub struct WorkerPool {
    inner: Arc<PoolInner>,
}

struct PoolInner {
    id: u64,
    capacity: usize,
    permits: Arc<Semaphore>,
    /// Slots handed out and not yet returned
    outstanding: watch::Sender<usize>,
    high_water: AtomicUsize,
}

impl WorkerPool {
    /// Create a pool with `capacity` slots (at least 1)
    pub fn new(capacity: usize) -> Result<Self, PoolError> {
        if capacity == 0 || capacity > Semaphore::MAX_PERMITS {
            return Err(PoolError::InvariantViolation(format!(
                "capacity must be between 1 and {}, got {}",
                Semaphore::MAX_PERMITS,
                capacity
            )));
        }
        let (outstanding, _) = watch::channel(0);
        Ok(Self {
            inner: Arc::new(PoolInner {
                id: NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed),
                capacity,
                permits: Arc::new(Semaphore::new(capacity)),
                outstanding,
                high_water: AtomicUsize::new(0),
            }),
        })
    }

    /// Wait until a slot is free and take it.
    ///
    /// Fails only once the pool has been closed.
    pub async fn acquire(&self) -> Result<WorkerSlot, PoolError> {
        let permit = Arc::clone(&self.inner.permits)
            .acquire_owned()
            .await
            .map_err(|_| PoolError::Closed)?;

        let mut count = 0;
        self.inner.outstanding.send_modify(|n| {
            *n += 1;
            count = *n;
        });
        // The slot exists from here on, so an error path below still returns it
        let slot = WorkerSlot {
            pool: Arc::clone(&self.inner),
            _permit: permit,
        };

        if count > self.inner.capacity {
            tracing::error!(
                count,
                capacity = self.inner.capacity,
                "more slots outstanding than capacity"
            );
            return Err(PoolError::InvariantViolation(format!(
                "{} slots outstanding with capacity {}",
                count, self.inner.capacity
            )));
        }

        self.inner.high_water.fetch_max(count, Ordering::Relaxed);
        Ok(slot)
    }

    /// Return a slot explicitly.
    ///
    /// Dropping the slot has the same effect; this form checks that the slot
    /// was issued by this pool.
    pub fn release(&self, slot: WorkerSlot) -> Result<(), PoolError> {
        if slot.pool.id != self.inner.id {
            tracing::error!(
                pool = self.inner.id,
                slot_pool = slot.pool.id,
                "slot released to a pool that did not issue it"
            );
            return Err(PoolError::InvariantViolation(format!(
                "slot from pool {} released to pool {}",
                slot.pool.id, self.inner.id
            )));
        }
        if self.outstanding() == 0 {
            return Err(PoolError::InvariantViolation(
                "release with no outstanding slots".to_string(),
            ));
        }
        drop(slot);
        Ok(())
    }

    /// Refuse all further acquisitions; waiters fail with [`PoolError::Closed`]
    pub fn close(&self) {
        self.inner.permits.close();
    }

    /// Wait until every outstanding slot has been returned
    pub async fn wait_idle(&self) {
        let mut rx = self.inner.outstanding.subscribe();
        // The sender lives as long as the pool, so this only ends at zero
        let _ = rx.wait_for(|n| *n == 0).await;
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    pub fn outstanding(&self) -> usize {
        *self.inner.outstanding.borrow()
    }

    pub fn available(&self) -> usize {
        self.inner.permits.available_permits()
    }

    /// Largest number of slots ever outstanding at once
    pub fn high_water_mark(&self) -> usize {
        self.inner.high_water.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("id", &self.inner.id)
            .field("capacity", &self.inner.capacity)
            .field("outstanding", &self.outstanding())
            .finish()
    }
}

/// Permission to run one processing task
#[must_use = "dropping a slot releases it immediately"]
pub struct WorkerSlot {
    pool: Arc<PoolInner>,
    // Returned to the semaphore after the counter is decremented in drop
    _permit: OwnedSemaphorePermit,
}

impl Drop for WorkerSlot {
    fn drop(&mut self) {
        self.pool.outstanding.send_modify(|n| match n.checked_sub(1) {
            Some(next) => *n = next,
            None => tracing::error!(pool = self.pool.id, "slot count underflow"),
        });
    }
}

impl std::fmt::Debug for WorkerSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerSlot")
            .field("pool", &self.pool.id)
            .finish()
    }
}

#[cfg(test)]
#[path = "pool_tests.rs"]
mod tests;
