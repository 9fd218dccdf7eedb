//! Error types for task-core.

use crate::durations::format_duration;
use crate::signal::Suspension;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A typed read or write of a state key failed.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    /// The persisted value does not decode into the requested type.
    #[error("Failed to read state key '{key}'")]
    Decode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    /// The value cannot be represented as JSON.
    #[error("Failed to write state key '{key}'")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// The static task configuration is missing a key or holds a bad value.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required config key '{0}'")]
    Missing(String),
    #[error("Invalid value for config key '{key}': {reason}")]
    Invalid { key: String, reason: String },
}

impl ConfigError {
    pub fn invalid(key: impl Into<String>, reason: impl ToString) -> Self {
        Self::Invalid {
            key: key.into(),
            reason: reason.to_string(),
        }
    }
}

/// Everything an invocation can end with besides a normal return.
///
/// `Suspended` is not a failure: it is the signal that tells the host to
/// persist the carried document and invoke the task again later. Every
/// other variant is an error in the usual sense.
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    /// Stop now and resume after the carried interval with the carried state.
    #[error("Task suspended, retrying in {}s", .0.retry_interval_seconds)]
    Suspended(Suspension),
    /// A retry executor gave up on an operation.
    #[error("{message}")]
    Failed {
        message: String,
        #[source]
        source: anyhow::Error,
    },
    /// A polling waiter passed its overall deadline.
    #[error("{message}: polling timed out after {}", display_timeout(.timeout))]
    PollingTimeout { message: String, timeout: Duration },
    #[error(transparent)]
    State(#[from] StateError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Any failure raised by operation code.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl TaskError {
    /// Shorthand for wrapping an arbitrary error raised by operation code.
    pub fn other<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Other(anyhow::Error::new(error))
    }

    pub fn is_suspended(&self) -> bool {
        matches!(self, TaskError::Suspended(_))
    }

    /// Stable, lowercase name of the variant, used in error documents.
    pub fn kind(&self) -> &'static str {
        match self {
            TaskError::Suspended(_) => "suspended",
            TaskError::Failed { .. } => "failed",
            TaskError::PollingTimeout { .. } => "polling_timeout",
            TaskError::State(_) => "state",
            TaskError::Config(_) => "config",
            TaskError::Other(_) => "other",
        }
    }
}

fn display_timeout(timeout: &Duration) -> String {
    format_duration(*timeout)
}

/// Structured, serializable rendering of a failure for task history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDocument {
    pub message: String,
    pub kind: String,
    /// Messages of the underlying causes, outermost first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub causes: Vec<String>,
}

impl ErrorDocument {
    pub fn from_task_error(error: &TaskError) -> Self {
        let mut causes = Vec::new();
        let mut source = std::error::Error::source(error);
        while let Some(cause) = source {
            causes.push(cause.to_string());
            source = cause.source();
        }
        Self {
            message: error.to_string(),
            kind: error.kind().to_string(),
            causes,
        }
    }
}
