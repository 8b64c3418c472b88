//! Admission Controller (C5).
//!
//! A counting gate around a `tokio::sync::Semaphore`: up to `maxConcurrent`
//! holders at once, with new arrivals willing to wait up to `queueWaitSec`
//! for a slot before giving up. The acquired `OwnedSemaphorePermit` *is* the
//! admission ticket — its `Drop` impl is the release, which makes
//! double-release a type-level impossibility rather than something that has
//! to be checked at runtime.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// A single-use capability granting one in-flight slot. Dropping it returns
/// the slot to the gate.
pub struct AdmissionTicket {
    _permit: OwnedSemaphorePermit,
}

/// Returned when a request could not be admitted within its queue-wait
/// budget, either because the gate stayed full or because the caller's own
/// cancellation signal fired first.
#[derive(Debug, thiserror::Error)]
pub enum BusyError {
    #[error("no admission slot became available within the queue-wait budget")]
    QueueWaitExceeded,
    #[error("the caller cancelled while waiting for an admission slot")]
    Cancelled,
}

/// Bounded-concurrency gate. Cheap to clone (wraps an `Arc`).
#[derive(Clone)]
pub struct AdmissionController {
    semaphore: Arc<Semaphore>,
    queue_wait: Duration,
}

impl AdmissionController {
    pub fn new(max_concurrent: usize, queue_wait: Duration) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrent.max(1))),
            queue_wait,
        }
    }

    /// Try to admit one holder, waiting up to `queueWaitSec` and honoring
    /// the passed-in cancellation future. Ordering among waiters is not
    /// guaranteed to be FIFO — only liveness is (no permit is ever left
    /// idle while a waiter exists).
    pub async fn try_enter(&self) -> Result<AdmissionTicket, BusyError> {
        self.try_enter_cancellable(std::future::pending()).await
    }

    pub async fn try_enter_cancellable(
        &self,
        cancel: impl std::future::Future<Output = ()>,
    ) -> Result<AdmissionTicket, BusyError> {
        tokio::select! {
            biased;
            permit = self.semaphore.clone().acquire_owned() => {
                let permit = permit.expect("semaphore is never closed");
                Ok(AdmissionTicket { _permit: permit })
            }
            _ = tokio::time::sleep(self.queue_wait) => Err(BusyError::QueueWaitExceeded),
            _ = cancel => Err(BusyError::Cancelled),
        }
    }

    /// Number of slots currently free. Exposed for tests and diagnostics.
    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }
}
