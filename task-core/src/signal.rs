//! The suspension signal and the per-invocation outcome.
//!
//! A task invocation either completes or suspends. Suspending means "stop
//! this call stack, store the carried document, call me again after the
//! carried interval". The host scheduler understands nothing else.

use crate::error::{ErrorDocument, TaskError};
use crate::state::Document;
use serde::{Deserialize, Serialize};

/// "Try me again after N seconds, here is my new state."
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suspension {
    /// Minimum delay before the host re-invokes the task.
    pub retry_interval_seconds: u64,
    /// The full root document, to be handed back verbatim next time.
    pub state: Document,
    /// Failure that caused a whole-task retry, if that is why we suspend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<ErrorDocument>,
}

impl Suspension {
    pub fn new(retry_interval_seconds: u64, state: Document) -> Self {
        Self {
            retry_interval_seconds,
            state,
            cause: None,
        }
    }

    /// Attach the failure that triggered this suspension.
    #[must_use]
    pub fn with_cause(mut self, cause: ErrorDocument) -> Self {
        self.cause = Some(cause);
        self
    }
}

impl From<Suspension> for TaskError {
    fn from(suspension: Suspension) -> Self {
        TaskError::Suspended(suspension)
    }
}

/// Result vocabulary of one invocation as seen by the host.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    /// The task finished; no further invocation is needed.
    Completed(T),
    /// The task wants to be invoked again later.
    Suspended(Suspension),
}

impl<T> Outcome<T> {
    pub fn is_completed(&self) -> bool {
        matches!(self, Outcome::Completed(_))
    }

    pub fn is_suspended(&self) -> bool {
        matches!(self, Outcome::Suspended(_))
    }

    pub fn completed(self) -> Option<T> {
        match self {
            Outcome::Completed(value) => Some(value),
            Outcome::Suspended(_) => None,
        }
    }

    pub fn suspension(&self) -> Option<&Suspension> {
        match self {
            Outcome::Completed(_) => None,
            Outcome::Suspended(suspension) => Some(suspension),
        }
    }

    pub fn map<U, F>(self, f: F) -> Outcome<U>
    where
        F: FnOnce(T) -> U,
    {
        match self {
            Outcome::Completed(value) => Outcome::Completed(f(value)),
            Outcome::Suspended(suspension) => Outcome::Suspended(suspension),
        }
    }

    /// Split a task result into the host outcome, pulling suspensions out
    /// of the error channel.
    pub fn from_result(result: Result<T, TaskError>) -> Result<Self, TaskError> {
        match result {
            Ok(value) => Ok(Outcome::Completed(value)),
            Err(TaskError::Suspended(suspension)) => Ok(Outcome::Suspended(suspension)),
            Err(e) => Err(e),
        }
    }
}
