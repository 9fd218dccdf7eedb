//! Single-step host driver.
//!
//! Takes a delivered request off the queue, restores the attempt's state
//! document, runs the operator once and records whatever happened: the
//! attempt completes, is scheduled again, or fails.

use crate::operator::{Operator, TaskExecutor};
use chrono::{DateTime, TimeDelta, Utc};
use std::sync::Arc;
use task_core::{Clock, ErrorDocument, Outcome, SystemClock, TaskRequest, TaskResult};
use task_persistence::{BackendError, QueuedTask, StateBackend, StateRecord, TaskQueue};

/// What one invocation did to the attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum InvocationStatus {
    Completed(TaskResult),
    /// Suspended and re-enqueued under a new lock.
    Scheduled {
        lock_id: String,
        ready_at: DateTime<Utc>,
        retry_interval_seconds: u64,
    },
    Failed(ErrorDocument),
}

/// Drives task invocations against a state backend and a task queue.
///
/// # Example
///
/// ```rust,ignore
/// use task_persistence::{InMemoryBackend, InMemoryTaskQueue};
/// use task_runtime::{TaskDriver, TaskExecutor};
///
/// let driver = TaskDriver::new(InMemoryBackend::new(), InMemoryTaskQueue::new());
/// driver.submit(request).await?;
///
/// let mut executor = TaskExecutor::new(MyOperator::default());
/// for task in driver.poll_ready(16).await? {
///     let status = driver.invoke(&mut executor, task).await?;
/// }
/// ```
pub struct TaskDriver<B, Q> {
    backend: Arc<B>,
    queue: Arc<Q>,
    clock: Arc<dyn Clock>,
}

impl<B, Q> TaskDriver<B, Q>
where
    B: StateBackend,
    Q: TaskQueue,
{
    pub fn new(backend: B, queue: Q) -> Self {
        Self {
            backend: Arc::new(backend),
            queue: Arc::new(queue),
            clock: Arc::new(SystemClock),
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn queue(&self) -> &Q {
        &self.queue
    }

    /// Enqueue the first invocation of an attempt, ready now.
    pub async fn submit(&self, request: TaskRequest) -> anyhow::Result<String> {
        let attempt_id = request.attempt_id.clone();
        let lock_id = self.queue.enqueue(request, self.clock.now()).await?;
        tracing::info!(attempt_id = %attempt_id, lock_id = %lock_id, "Submitted task");
        Ok(lock_id)
    }

    /// Requests whose retry interval has elapsed.
    pub async fn poll_ready(&self, limit: usize) -> anyhow::Result<Vec<QueuedTask>> {
        Ok(self.queue.poll_ready(self.clock.now(), limit).await?)
    }

    /// Run one delivered request and record the outcome.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend or the queue fails. Task failures
    /// are reported as [`InvocationStatus::Failed`], not as errors.
    pub async fn invoke<O>(
        &self,
        executor: &mut TaskExecutor<O>,
        task: QueuedTask,
    ) -> anyhow::Result<InvocationStatus>
    where
        O: Operator,
    {
        let QueuedTask {
            lock_id,
            mut request,
            ..
        } = task;
        let attempt_id = request.attempt_id.clone();

        let previous = match self.backend.load_state(&attempt_id).await {
            Ok(record) => Some(record),
            Err(BackendError::NotFound(_)) => None,
            Err(e) => return Err(e.into()),
        };
        if let Some(record) = &previous {
            tracing::debug!(
                attempt_id = %attempt_id,
                suspensions = record.suspensions,
                "Restored task state"
            );
            request.last_state_params = record.state.clone();
        }

        let status = match executor.run(&request) {
            Ok(Outcome::Completed(result)) => {
                self.forget_state(&attempt_id).await?;
                tracing::info!(attempt_id = %attempt_id, "Task completed");
                InvocationStatus::Completed(result)
            }
            Ok(Outcome::Suspended(suspension)) => {
                let now = self.clock.now();
                let record = match previous {
                    Some(mut record) => {
                        record.advance(suspension.state.clone(), now);
                        record
                    }
                    None => StateRecord::new(attempt_id.clone(), suspension.state.clone())
                        .with_updated_at(now),
                };
                self.backend.save_state(record).await?;

                let interval = suspension.retry_interval_seconds;
                let ready_at = now
                    .checked_add_signed(delay(interval))
                    .unwrap_or(DateTime::<Utc>::MAX_UTC);
                let next_lock = self
                    .queue
                    .enqueue(request.with_state(suspension.state), ready_at)
                    .await?;
                tracing::debug!(
                    attempt_id = %attempt_id,
                    lock_id = %next_lock,
                    interval,
                    %ready_at,
                    "Task scheduled"
                );
                InvocationStatus::Scheduled {
                    lock_id: next_lock,
                    ready_at,
                    retry_interval_seconds: interval,
                }
            }
            Err(failure) => {
                self.forget_state(&attempt_id).await?;
                tracing::info!(attempt_id = %attempt_id, error = %failure, "Task attempt failed");
                InvocationStatus::Failed(failure.error)
            }
        };

        self.queue.mark_done(&lock_id).await?;
        Ok(status)
    }

    async fn forget_state(&self, attempt_id: &str) -> Result<(), BackendError> {
        match self.backend.delete_state(attempt_id).await {
            Ok(()) | Err(BackendError::NotFound(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }
}

fn delay(seconds: u64) -> TimeDelta {
    i64::try_from(seconds)
        .ok()
        .and_then(TimeDelta::try_seconds)
        .unwrap_or(TimeDelta::MAX)
}
