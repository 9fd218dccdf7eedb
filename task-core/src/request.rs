//! What the host hands to a task invocation and what it gets back.

use crate::config::TaskConfig;
use crate::state::Document;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One invocation's input: static config plus the previously persisted document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRequest {
    /// Identifies the task attempt; stable across invocations.
    pub attempt_id: String,
    pub task_name: String,
    #[serde(default)]
    pub config: TaskConfig,
    /// Empty on the first invocation of an attempt.
    #[serde(default)]
    pub last_state_params: Document,
}

impl TaskRequest {
    pub fn new(
        attempt_id: impl Into<String>,
        task_name: impl Into<String>,
        config: TaskConfig,
    ) -> Self {
        Self {
            attempt_id: attempt_id.into(),
            task_name: task_name.into(),
            config,
            last_state_params: Document::new(),
        }
    }

    #[must_use]
    pub fn with_state(mut self, state: Document) -> Self {
        self.last_state_params = state;
        self
    }
}

/// Records of what a task read and wrote, for lineage display.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskReport {
    #[serde(default)]
    pub inputs: Vec<Value>,
    #[serde(default)]
    pub outputs: Vec<Value>,
}

impl TaskReport {
    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty() && self.outputs.is_empty()
    }
}

/// Successful result of a task, including parameters carried forward to
/// downstream tasks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    /// Dynamically generated child tasks, empty when none.
    #[serde(default)]
    pub subtask_config: Document,
    /// Parameters visible to child tasks of this one.
    #[serde(default)]
    pub export_params: Document,
    /// Parameters visible to all following tasks.
    #[serde(default)]
    pub store_params: Document,
    /// Stored parameters to drop before applying `store_params`.
    #[serde(default)]
    pub reset_store_params: Vec<String>,
    #[serde(default)]
    pub report: TaskReport,
}

impl TaskResult {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn builder() -> TaskResultBuilder {
        TaskResultBuilder::default()
    }
}

#[derive(Debug, Default)]
pub struct TaskResultBuilder {
    result: TaskResult,
}

impl TaskResultBuilder {
    #[must_use]
    pub fn subtask_config(mut self, config: Document) -> Self {
        self.result.subtask_config = config;
        self
    }

    #[must_use]
    pub fn export_param(mut self, key: impl Into<String>, value: Value) -> Self {
        self.result.export_params.insert(key.into(), value);
        self
    }

    #[must_use]
    pub fn store_param(mut self, key: impl Into<String>, value: Value) -> Self {
        self.result.store_params.insert(key.into(), value);
        self
    }

    #[must_use]
    pub fn reset_store_param(mut self, key: impl Into<String>) -> Self {
        self.result.reset_store_params.push(key.into());
        self
    }

    #[must_use]
    pub fn input(mut self, record: Value) -> Self {
        self.result.report.inputs.push(record);
        self
    }

    #[must_use]
    pub fn output(mut self, record: Value) -> Self {
        self.result.report.outputs.push(record);
        self
    }

    pub fn build(self) -> TaskResult {
        self.result
    }
}
