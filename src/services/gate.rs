//! Concurrency Gate
//!
//! Bounds simultaneous executor runs engine-wide. Acquisition is fair
//! (FIFO) and a permit is held for the whole run, internal retries
//! included, so the cap covers total upstream exposure rather than call
//! count. Dropping the permit releases the slot on every exit path,
//! cancellation included.

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::debug;

use crate::utils::error::{EngineError, EngineResult};

/// Counting gate guarding all calls into the executor.
#[derive(Clone)]
pub struct ConcurrencyGate {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

/// Held for the duration of one executor run.
pub struct GatePermit {
    _permit: OwnedSemaphorePermit,
}

impl ConcurrencyGate {
    pub fn new(capacity: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// Wait for a slot. Queued callers are admitted in arrival order.
    pub async fn acquire(&self) -> EngineResult<GatePermit> {
        let waiting = self.semaphore.available_permits() == 0;
        if waiting {
            debug!(capacity = self.capacity, "concurrency gate full, queueing");
        }

        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| EngineError::internal("concurrency gate closed"))?;

        Ok(GatePermit { _permit: permit })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Slots currently free.
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }
}
