//! Checkpointed retry and polling for long-running tasks.
//!
//! A task invocation never blocks waiting for an external system. Instead
//! it records its progress in the task state document and suspends; the
//! host persists the document and invokes the task again after the
//! requested interval.
//!
//! - [`RetryExecutor`]: retries a failing operation with exponential backoff.
//! - [`PollingWaiter`]: re-checks a condition with exponential backoff and an
//!   optional deadline.
//! - [`TaskExecutor`]: runs an [`Operator`] for one invocation and applies
//!   the task-level `_retry` policy.
//! - [`TaskDriver`]: a minimal host loop over a state backend and a queue.
//!
//! # Example
//!
//! ```rust,ignore
//! impl Operator for ExportOperator {
//!     fn run_task(&mut self, ctx: &mut OperatorContext<'_>) -> Result<TaskResult, TaskError> {
//!         let job_id: String = retry_executor(&mut ctx.state, "submit")
//!             .with_error_message("Failed to submit export")
//!             .run_once(|_| self.client.submit(&self.query).map_err(TaskError::other))?;
//!
//!         polling_waiter(&mut ctx.state, "wait")
//!             .with_timeout(Some(Duration::from_secs(3600)))
//!             .with_wait_message(format!("Export {job_id} still running"))
//!             .await_once(|_| self.client.finished(&job_id).map_err(TaskError::other))?;
//!
//!         Ok(TaskResult::builder().store_param("job_id", json!(job_id)).build())
//!     }
//! }
//! ```

pub mod executor;
pub mod operator;
pub mod retry_control;

mod runner;

// Re-exports
pub use executor::{PollingWaiter, RetryExecutor, polling_waiter, retry_executor};
pub use operator::{Operator, OperatorContext, TaskExecutor, TaskFailure};
pub use retry_control::{RetryControl, RetryIntervalType};
pub use runner::{InvocationStatus, TaskDriver};

pub use task_persistence as persistence;
