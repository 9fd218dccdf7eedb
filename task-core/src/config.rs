//! Read-only view of a task's static configuration.

use crate::durations::parse_duration;
use crate::error::ConfigError;
use crate::state::Document;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// Static task configuration as written by the workflow author.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskConfig {
    params: Document,
}

impl TaskConfig {
    pub fn new(params: Document) -> Self {
        Self { params }
    }

    /// Wrap a JSON value, which must be an object (or `null` for empty).
    pub fn from_value(value: Value) -> Result<Self, ConfigError> {
        match value {
            Value::Object(params) => Ok(Self { params }),
            Value::Null => Ok(Self::default()),
            other => Err(ConfigError::invalid(
                "<root>",
                format!("expected an object, got {other}"),
            )),
        }
    }

    pub fn has(&self, key: &str) -> bool {
        self.params.contains_key(key)
    }

    /// The raw JSON value stored under `key`.
    pub fn raw(&self, key: &str) -> Option<&Value> {
        self.params.get(key)
    }

    pub fn get<T>(&self, key: &str) -> Result<T, ConfigError>
    where
        T: DeserializeOwned,
    {
        self.get_optional(key)?
            .ok_or_else(|| ConfigError::Missing(key.to_string()))
    }

    pub fn get_optional<T>(&self, key: &str) -> Result<Option<T>, ConfigError>
    where
        T: DeserializeOwned,
    {
        match self.params.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => serde_json::from_value(value.clone())
                .map(Some)
                .map_err(|e| ConfigError::invalid(key, e)),
        }
    }

    pub fn get_or<T>(&self, key: &str, default: T) -> Result<T, ConfigError>
    where
        T: DeserializeOwned,
    {
        Ok(self.get_optional(key)?.unwrap_or(default))
    }

    /// The object stored under `key`, or an empty config when absent.
    pub fn get_nested(&self, key: &str) -> Result<TaskConfig, ConfigError> {
        match self.params.get(key) {
            None | Some(Value::Null) => Ok(TaskConfig::default()),
            Some(Value::Object(params)) => Ok(TaskConfig::new(params.clone())),
            Some(other) => Err(ConfigError::invalid(
                key,
                format!("expected an object, got {other}"),
            )),
        }
    }

    /// Read a duration given as whole seconds or as text like `"1h 30m"`.
    pub fn get_duration(&self, key: &str) -> Result<Option<Duration>, ConfigError> {
        match self.params.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Number(n)) => n
                .as_u64()
                .map(|secs| Some(Duration::from_secs(secs)))
                .ok_or_else(|| ConfigError::invalid(key, "expected non-negative seconds")),
            Some(Value::String(text)) => parse_duration(text)
                .map(Some)
                .map_err(|e| ConfigError::invalid(key, e)),
            Some(other) => Err(ConfigError::invalid(
                key,
                format!("expected a duration, got {other}"),
            )),
        }
    }

    pub fn as_map(&self) -> &Document {
        &self.params
    }
}
