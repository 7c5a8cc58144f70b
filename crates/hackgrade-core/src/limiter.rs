//! Process-wide cap on in-flight backend calls.
//!
//! Built once per process and handed to every component that talks to the
//! backend. Clones share the same permits.

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::error::{GradeError, GradeResult};

/// Default number of concurrent backend calls.
pub const DEFAULT_MAX_CONCURRENT_CALLS: usize = 6;

#[derive(Debug, Clone)]
pub struct ConcurrencyLimiter {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

impl ConcurrencyLimiter {
    pub fn new(capacity: usize) -> GradeResult<Self> {
        if capacity == 0 {
            return Err(GradeError::Config {
                message: "max_concurrent_calls must be at least 1".to_string(),
            });
        }
        Ok(Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Permits currently free.
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    pub fn in_flight(&self) -> usize {
        self.capacity - self.available()
    }

    /// Wait for a slot. The slot is returned when the permit drops.
    pub async fn acquire(&self) -> GradeResult<OwnedSemaphorePermit> {
        self.semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| GradeError::Config {
                message: format!("concurrency limiter closed: {e}"),
            })
    }
}

impl Default for ConcurrencyLimiter {
    fn default() -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(DEFAULT_MAX_CONCURRENT_CALLS)),
            capacity: DEFAULT_MAX_CONCURRENT_CALLS,
        }
    }
}
