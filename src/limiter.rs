//! Global admission cap for concurrent operations
//!
//! [`ConcurrencyLimiter`] is a clonable handle around a fair semaphore. Every
//! clone shares the same permits, so handing the limiter to several table
//! downloads still enforces one process-wide cap.

use crate::error::{Error, Result};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Bounds the number of in-flight tasks to a fixed maximum
///
/// Waiters are admitted in FIFO order as permits free up (tokio's semaphore
/// is fair). A task's own outcome is returned to its caller untouched; a
/// failing task releases its slot exactly like a succeeding one.
#[derive(Clone, Debug)]
pub struct ConcurrencyLimiter {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

impl ConcurrencyLimiter {
    /// Create a limiter admitting at most `capacity` tasks (clamped to at least 1)
    ///
    /// # Examples
    ///
    /// ```
    /// use airtable_backup::limiter::ConcurrencyLimiter;
    ///
    /// let limiter = ConcurrencyLimiter::new(20);
    /// assert_eq!(limiter.capacity(), 20);
    /// assert_eq!(limiter.in_flight(), 0);
    /// ```
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// Maximum number of concurrently admitted tasks
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of tasks currently admitted and running
    pub fn in_flight(&self) -> usize {
        self.capacity - self.semaphore.available_permits()
    }

    /// Wait for a free slot, then drive `task` to completion while holding it
    ///
    /// The slot is released when `task` finishes or when the returned future
    /// is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LimiterClosed`] if the limiter was closed while waiting.
    pub async fn run<F, T>(&self, task: F) -> Result<T>
    where
        F: Future<Output = T>,
    {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| Error::LimiterClosed)?;
        Ok(task.await)
    }

    /// Stop admitting tasks; queued and future callers get [`Error::LimiterClosed`]
    pub fn close(&self) {
        self.semaphore.close();
    }
}
