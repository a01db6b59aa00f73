//! Bounded-concurrency dispatch with FIFO admission
//!
//! Admits at most `capacity` concurrently-running operations. Callers past
//! the bound wait in a FIFO backlog; the backlog itself is unbounded, no
//! operation is ever rejected or dropped, and a failing operation delivers
//! its error to its own caller only. Admission order is submission order;
//! completion order is whatever the operations' own durations dictate.

use std::future::Future;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::debug;

/// Snapshot of dispatch queue activity
#[derive(Debug, Clone)]
pub struct DispatchQueueMetrics {
    /// Total operations that have been admitted since construction
    pub total_dispatched: u64,
    /// Operations currently executing
    pub current_running: usize,
    /// Operations currently waiting for admission
    pub current_queued: usize,
    /// Concurrency bound
    pub capacity: usize,
}

impl DispatchQueueMetrics {
    /// Current utilization as a fraction (0.0 to 1.0)
    #[must_use]
    pub fn utilization(&self) -> f64 {
        self.current_running as f64 / self.capacity as f64
    }
}

/// FIFO admission queue with a fixed concurrency bound.
///
/// Tokio's [`Semaphore`] queues waiters fairly, which is what preserves
/// submission order for admission without an external scheduler loop or
/// recursive backlog draining.
///
/// # Examples
///
/// ```rust
/// use agentbox_common::resilience::DispatchQueue;
///
/// # async fn example() {
/// let queue = DispatchQueue::new(5);
/// let value = queue.run(|| async { 2 + 2 }).await;
/// assert_eq!(value, 4);
/// # }
/// ```
pub struct DispatchQueue {
    semaphore: Arc<Semaphore>,
    capacity: usize,
    running: Arc<AtomicUsize>,
    queued: Arc<AtomicUsize>,
    total_dispatched: Arc<AtomicU64>,
}

impl DispatchQueue {
    /// Create a queue admitting at most `capacity` concurrent operations.
    ///
    /// # Panics
    /// Panics if `capacity` is zero; the bound is fixed for the queue's
    /// lifetime and a zero bound would deadlock every submission.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "dispatch queue capacity must be greater than 0");
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
            running: Arc::new(AtomicUsize::new(0)),
            queued: Arc::new(AtomicUsize::new(0)),
            total_dispatched: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Run an operation under the concurrency bound.
    ///
    /// Waits (FIFO) for admission, executes the operation, and releases the
    /// slot when the operation settles. The outcome, success or failure, is
    /// returned to this caller and no one else; a failure does not stall
    /// admission of later submissions.
    pub async fn run<F, Fut, T>(&self, operation: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        self.queued.fetch_add(1, Ordering::Relaxed);
        // The semaphore is owned by this queue and never closed.
        #[allow(clippy::expect_used)]
        let permit = self.semaphore.acquire().await.expect("dispatch queue semaphore closed");
        self.queued.fetch_sub(1, Ordering::Relaxed);

        self.running.fetch_add(1, Ordering::Relaxed);
        self.total_dispatched.fetch_add(1, Ordering::Relaxed);
        debug!(running = self.running.load(Ordering::Relaxed), "dispatch queue admitted operation");

        let result = operation().await;

        self.running.fetch_sub(1, Ordering::Relaxed);
        drop(permit);

        result
    }

    /// Concurrency bound this queue was built with
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Operations currently executing
    #[must_use]
    pub fn current_running(&self) -> usize {
        self.running.load(Ordering::Relaxed)
    }

    /// Operations currently waiting for admission
    #[must_use]
    pub fn current_queued(&self) -> usize {
        self.queued.load(Ordering::Relaxed)
    }

    /// Snapshot of queue activity
    #[must_use]
    pub fn metrics(&self) -> DispatchQueueMetrics {
        DispatchQueueMetrics {
            total_dispatched: self.total_dispatched.load(Ordering::Acquire),
            current_running: self.current_running(),
            current_queued: self.current_queued(),
            capacity: self.capacity,
        }
    }
}

impl Clone for DispatchQueue {
    fn clone(&self) -> Self {
        Self {
            semaphore: Arc::clone(&self.semaphore),
            capacity: self.capacity,
            running: Arc::clone(&self.running),
            queued: Arc::clone(&self.queued),
            total_dispatched: Arc::clone(&self.total_dispatched),
        }
    }
}

impl std::fmt::Debug for DispatchQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchQueue")
            .field("capacity", &self.capacity)
            .field("current_running", &self.current_running())
            .field("current_queued", &self.current_queued())
            .finish()
    }
}
