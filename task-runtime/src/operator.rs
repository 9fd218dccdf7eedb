//! The boundary between task code and the host.
//!
//! An [`Operator`] implements the task logic. A [`TaskExecutor`] runs it
//! for one invocation and translates what happens into the host
//! vocabulary: a completed [`TaskResult`], a [`Suspension`], or a terminal
//! [`TaskFailure`]. Failures that escape the operator are retried at task
//! level according to the `_retry` option (see [`RetryControl`]).

use crate::retry_control::RetryControl;
use serde_json::Value;
use task_core::{
    ErrorDocument, Outcome, Suspension, TaskConfig, TaskError, TaskReport, TaskRequest,
    TaskResult, TaskState,
};

/// Task logic run by a [`TaskExecutor`].
pub trait Operator {
    /// Run one invocation.
    ///
    /// Return [`TaskError::Suspended`] (usually via an executor or waiter)
    /// to be invoked again later with the state written so far.
    fn run_task(&mut self, ctx: &mut OperatorContext<'_>) -> Result<TaskResult, TaskError>;

    /// Top-level state keys dropped before a task-level retry, so the next
    /// attempt redoes that work instead of resuming it.
    fn reset_state_keys_on_retry(&self) -> Vec<String> {
        Vec::new()
    }

    /// Whether a missing `_retry` option means "retry a few times".
    fn retry_enabled_by_default(&self) -> bool {
        false
    }
}

/// What an operator sees during one invocation.
///
/// Fields are public so the state can be lent to an executor while the
/// config and report are still in use.
pub struct OperatorContext<'a> {
    pub task_name: &'a str,
    pub config: &'a TaskConfig,
    pub state: TaskState<'a>,
    pub report: TaskReport,
}

impl<'a> OperatorContext<'a> {
    pub fn new(task_name: &'a str, config: &'a TaskConfig, state: TaskState<'a>) -> Self {
        Self {
            task_name,
            config,
            state,
            report: TaskReport::default(),
        }
    }

    pub fn state(&mut self) -> &mut TaskState<'a> {
        &mut self.state
    }

    /// Record something the task read, for lineage.
    pub fn add_input(&mut self, record: Value) {
        self.report.inputs.push(record);
    }

    /// Record something the task wrote, for lineage.
    pub fn add_output(&mut self, record: Value) {
        self.report.outputs.push(record);
    }
}

/// Terminal failure of a task attempt.
#[derive(Debug, thiserror::Error)]
#[error("{}", .error.message)]
pub struct TaskFailure {
    /// Serializable rendering for task history.
    pub error: ErrorDocument,
    #[source]
    pub source: TaskError,
}

impl TaskFailure {
    pub fn new(source: TaskError) -> Self {
        Self {
            error: ErrorDocument::from_task_error(&source),
            source,
        }
    }
}

/// Runs an [`Operator`] for one invocation.
pub struct TaskExecutor<O> {
    operator: O,
}

impl<O: Operator> TaskExecutor<O> {
    pub fn new(operator: O) -> Self {
        Self { operator }
    }

    pub fn operator(&self) -> &O {
        &self.operator
    }

    pub fn into_inner(self) -> O {
        self.operator
    }

    /// Run the operator against `request`.
    ///
    /// # Errors
    ///
    /// Returns `TaskFailure` when the operator failed and task-level retry
    /// is exhausted or misconfigured. `_retry` is only read after a failure.
    pub fn run(&mut self, request: &TaskRequest) -> Result<Outcome<TaskResult>, TaskFailure> {
        let mut document = request.last_state_params.clone();
        let (result, report) = {
            let mut ctx = OperatorContext::new(
                &request.task_name,
                &request.config,
                TaskState::of(&mut document),
            );
            let result = self.operator.run_task(&mut ctx);
            (result, ctx.report)
        };

        let error = match result {
            Ok(mut task_result) => {
                task_result.report.inputs.extend(report.inputs);
                task_result.report.outputs.extend(report.outputs);
                return Ok(Outcome::Completed(task_result));
            }
            Err(TaskError::Suspended(suspension)) => {
                tracing::debug!(
                    attempt_id = %request.attempt_id,
                    task_name = %request.task_name,
                    interval = suspension.retry_interval_seconds,
                    "Task suspended"
                );
                return Ok(Outcome::Suspended(suspension));
            }
            Err(e) => e,
        };

        let retry = RetryControl::prepare(
            &request.config,
            &request.last_state_params,
            self.operator.retry_enabled_by_default(),
        )
        .map_err(|e| {
            tracing::error!(
                attempt_id = %request.attempt_id,
                task_name = %request.task_name,
                error = %error,
                "Task failed with an invalid retry option"
            );
            TaskFailure::new(e.into())
        })?;

        let failure = TaskFailure::new(error);
        if retry.evaluate() {
            let mut next_state = retry.next_retry_state_params();
            for key in self.operator.reset_state_keys_on_retry() {
                next_state.remove(&key);
            }
            let interval = retry.next_retry_interval();
            tracing::warn!(
                attempt_id = %request.attempt_id,
                task_name = %request.task_name,
                retry_count = retry.retry_count(),
                retry_limit = retry.retry_limit(),
                error = %failure.source,
                "Task failed, retrying in {} seconds",
                interval
            );
            return Ok(Outcome::Suspended(
                Suspension::new(interval, next_state).with_cause(failure.error),
            ));
        }

        tracing::error!(
            attempt_id = %request.attempt_id,
            task_name = %request.task_name,
            kind = %failure.error.kind,
            error = %failure.source,
            "Task failed"
        );
        Err(failure)
    }
}
