//! Delayed re-delivery of suspended task attempts.

use crate::backend::BackendError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use task_core::TaskRequest;

/// A request waiting in the queue, identified by the lock it was enqueued under.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedTask {
    pub lock_id: String,
    pub request: TaskRequest,
    /// Earliest time the request may be delivered.
    pub ready_at: DateTime<Utc>,
}

impl QueuedTask {
    pub fn is_ready(&self, now: DateTime<Utc>) -> bool {
        self.ready_at <= now
    }
}

/// Queue of task requests scheduled for a future time.
///
/// A delivered request stays locked until [`TaskQueue::mark_done`] releases
/// it, so no two workers invoke the same attempt at once.
#[async_trait]
pub trait TaskQueue: Send + Sync {
    /// Schedule `request` for delivery at or after `ready_at`; returns the lock ID.
    async fn enqueue(
        &self,
        request: TaskRequest,
        ready_at: DateTime<Utc>,
    ) -> Result<String, BackendError>;

    /// Take up to `limit` requests whose `ready_at` has passed, oldest first.
    async fn poll_ready(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<QueuedTask>, BackendError>;

    /// Release a delivered request.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::NotFound` if `lock_id` is not currently delivered.
    async fn mark_done(&self, lock_id: &str) -> Result<(), BackendError>;

    /// Number of requests not yet delivered.
    async fn pending(&self) -> Result<usize, BackendError>;
}
