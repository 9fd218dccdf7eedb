//! Checkpointed retry of a fallible operation.
//!
//! A [`RetryExecutor`] never sleeps. When the operation fails with a
//! retryable error it bumps the attempt counter in its own scope and
//! suspends the whole task for the backoff interval; the host re-invokes the
//! task later and the executor runs the operation again.
//!
//! Scope layout under `state_key`:
//!
//! | key         | meaning                                          |
//! |-------------|--------------------------------------------------|
//! | `retry`     | failed attempts so far, cleared on success       |
//! | `done`      | `run_once` has completed                         |
//! | `result`    | memoized `run_once` result                       |
//! | `operation` | nested scope handed to the operation             |

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt::{Debug, Display};
use std::sync::Arc;
use task_core::{DurationInterval, TaskError, TaskState};

const RETRY: &str = "retry";
const DONE: &str = "done";
const RESULT: &str = "result";
const OPERATION: &str = "operation";

pub const DEFAULT_RETRY_INTERVAL: DurationInterval = DurationInterval::from_secs(1, 30);
pub const DEFAULT_ERROR_MESSAGE: &str = "Operation failed";
const BACKOFF_BASE: f64 = 2.0;

/// Decides whether a failed attempt is worth another try.
pub type RetryPredicate = Arc<dyn Fn(&anyhow::Error) -> bool + Send + Sync>;

type ErrorMessageFn = Arc<dyn Fn(&anyhow::Error) -> String + Send + Sync>;

/// Shorthand for [`RetryExecutor::new`].
pub fn retry_executor<'s, 'a>(
    state: &'s mut TaskState<'a>,
    state_key: impl Into<String>,
) -> RetryExecutor<'s, 'a> {
    RetryExecutor::new(state, state_key)
}

/// Runs an operation, turning retryable failures into suspensions.
///
/// With no predicates every failure is retried. Once predicates are added,
/// a failure is retried only if at least one of them matches; otherwise the
/// executor gives up and returns [`TaskError::Failed`].
///
/// # Example
///
/// ```rust,ignore
/// let job_id: String = retry_executor(ctx.state(), "submit")
///     .with_error_message("Failed to submit job")
///     .retry_if_error::<ApiError, _>(|e| e.is_transient())
///     .run_once(|_| client.submit(&spec).map_err(TaskError::other))?;
/// ```
pub struct RetryExecutor<'s, 'a> {
    state: &'s mut TaskState<'a>,
    state_key: String,
    retry_interval: DurationInterval,
    retry_predicates: Vec<RetryPredicate>,
    error_message: ErrorMessageFn,
}

impl<'s, 'a> RetryExecutor<'s, 'a> {
    pub fn new(state: &'s mut TaskState<'a>, state_key: impl Into<String>) -> Self {
        Self {
            state,
            state_key: state_key.into(),
            retry_interval: DEFAULT_RETRY_INTERVAL,
            retry_predicates: Vec::new(),
            error_message: Arc::new(|_| DEFAULT_ERROR_MESSAGE.to_string()),
        }
    }

    #[must_use]
    pub fn with_retry_interval(mut self, retry_interval: DurationInterval) -> Self {
        self.retry_interval = retry_interval;
        self
    }

    /// Retry when `predicate` holds for the failure.
    #[must_use]
    pub fn retry_if<P>(mut self, predicate: P) -> Self
    where
        P: Fn(&anyhow::Error) -> bool + Send + Sync + 'static,
    {
        self.retry_predicates.push(Arc::new(predicate));
        self
    }

    /// Retry when the failure is an `E` and `predicate` holds for it.
    #[must_use]
    pub fn retry_if_error<E, P>(self, predicate: P) -> Self
    where
        E: Display + Debug + Send + Sync + 'static,
        P: Fn(&E) -> bool + Send + Sync + 'static,
    {
        self.retry_if(move |error| error.downcast_ref::<E>().is_some_and(&predicate))
    }

    /// Retry when `predicate` does not hold for the failure.
    #[must_use]
    pub fn retry_unless<P>(self, predicate: P) -> Self
    where
        P: Fn(&anyhow::Error) -> bool + Send + Sync + 'static,
    {
        self.retry_if(move |error| !predicate(error))
    }

    /// Retry unless the failure is an `E` for which `predicate` holds.
    #[must_use]
    pub fn retry_unless_error<E, P>(self, predicate: P) -> Self
    where
        E: Display + Debug + Send + Sync + 'static,
        P: Fn(&E) -> bool + Send + Sync + 'static,
    {
        self.retry_unless(move |error| error.downcast_ref::<E>().is_some_and(&predicate))
    }

    #[must_use]
    pub fn with_error_message(self, message: impl Into<String>) -> Self {
        let message = message.into();
        self.with_error_message_fn(move |_| message.clone())
    }

    /// Build the log and failure message from the error being handled.
    #[must_use]
    pub fn with_error_message_fn<F>(mut self, message: F) -> Self
    where
        F: Fn(&anyhow::Error) -> String + Send + Sync + 'static,
    {
        self.error_message = Arc::new(message);
        self
    }

    /// Run `operation` in the nested `operation` scope.
    ///
    /// # Errors
    ///
    /// - [`TaskError::Suspended`] when the failure is retried, or when the
    ///   operation itself suspends.
    /// - [`TaskError::Failed`] when no predicate matched the failure.
    /// - Any other terminal error raised by the operation, unchanged.
    pub fn run<T, F>(mut self, operation: F) -> Result<T, TaskError>
    where
        F: FnOnce(&mut TaskState<'_>) -> Result<T, TaskError>,
    {
        self.execute(operation)
    }

    /// Like [`run`](Self::run), but the result is persisted and returned
    /// without running `operation` again once it has succeeded.
    pub fn run_once<T, F>(mut self, operation: F) -> Result<T, TaskError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(&mut TaskState<'_>) -> Result<T, TaskError>,
    {
        {
            let mut retry_state = self.state.nested_state(&self.state_key);
            let params = retry_state.params();
            if params.get_or(DONE, false)? {
                return Ok(params.get_nullable(RESULT)?);
            }
        }

        let result = self.execute(operation)?;

        let mut retry_state = self.state.nested_state(&self.state_key);
        let mut params = retry_state.params();
        params.set(RESULT, &result)?;
        params.set(DONE, true)?;
        Ok(result)
    }

    pub fn run_action<F>(self, action: F) -> Result<(), TaskError>
    where
        F: FnOnce(&mut TaskState<'_>) -> Result<(), TaskError>,
    {
        self.run(action)
    }

    pub fn run_once_action<F>(self, action: F) -> Result<(), TaskError>
    where
        F: FnOnce(&mut TaskState<'_>) -> Result<(), TaskError>,
    {
        self.run_once(action)
    }

    fn execute<T, F>(&mut self, operation: F) -> Result<T, TaskError>
    where
        F: FnOnce(&mut TaskState<'_>) -> Result<T, TaskError>,
    {
        let mut retry_state = self.state.nested_state(&self.state_key);
        let result = {
            let mut operation_state = retry_state.nested_state(OPERATION);
            operation(&mut operation_state)
        };

        let error = match result {
            Ok(value) => {
                retry_state.params().remove(RETRY);
                return Ok(value);
            }
            Err(e @ TaskError::Suspended(_))
            | Err(e @ TaskError::Failed { .. })
            | Err(e @ TaskError::PollingTimeout { .. })
            | Err(e @ TaskError::Config(_)) => return Err(e),
            Err(TaskError::State(e)) => anyhow::Error::new(e),
            Err(TaskError::Other(e)) => e,
        };

        let message = (self.error_message)(&error);
        if !should_retry(&self.retry_predicates, &error) {
            tracing::warn!(state_key = %self.state_key, error = %error, "{}: giving up", message);
            return Err(TaskError::Failed {
                message,
                source: error,
            });
        }

        let mut params = retry_state.params();
        let attempt: u32 = params.get_or(RETRY, 0)?;
        params.set(RETRY, attempt.saturating_add(1))?;
        let interval = self.retry_interval.backoff_seconds(attempt, BACKOFF_BASE);
        tracing::warn!(
            state_key = %self.state_key,
            attempt,
            interval,
            error = %error,
            "{}: retrying in {} seconds",
            message,
            interval
        );
        Err(retry_state.suspend(interval).into())
    }
}

fn should_retry(predicates: &[RetryPredicate], error: &anyhow::Error) -> bool {
    predicates.is_empty() || predicates.iter().any(|predicate| predicate(error))
}
