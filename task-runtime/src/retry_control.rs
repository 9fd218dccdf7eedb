//! Task-level retry configured by the workflow author through `_retry`.
//!
//! Accepted shapes:
//!
//! ```text
//! _retry: 3
//! _retry: "3"
//! _retry:
//!   limit: 3
//!   interval: 10            # seconds, or a duration like "1m 30s"
//!   max_interval: 5m
//!   interval_type: exponential   # or constant (the default)
//! ```

use serde_json::Value;
use std::str::FromStr;
use task_core::{ConfigError, Document, TaskConfig};

pub const RETRY_CONFIG_KEY: &str = "_retry";
pub const RETRY_COUNT_KEY: &str = "retry_count";
/// Limit used when `_retry` is absent and the operator enables retry by default.
pub const DEFAULT_RETRY_LIMIT: u32 = 3;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RetryIntervalType {
    #[default]
    Constant,
    Exponential,
}

impl FromStr for RetryIntervalType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "constant" => Ok(Self::Constant),
            "exponential" => Ok(Self::Exponential),
            _ => Err(ConfigError::invalid(
                "_retry.interval_type",
                format!("expected 'constant' or 'exponential', got '{s}'"),
            )),
        }
    }
}

/// Outer retry decision for one failed invocation.
#[derive(Debug, Clone)]
pub struct RetryControl {
    retry_limit: u32,
    retry_count: u32,
    retry_interval: u64,
    max_retry_interval: Option<u64>,
    interval_type: RetryIntervalType,
    state_params: Document,
}

impl RetryControl {
    /// Read the retry policy from `config` and the attempts so far from
    /// `state_params`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when `_retry` has an unsupported shape or value.
    pub fn prepare(
        config: &TaskConfig,
        state_params: &Document,
        enable_by_default: bool,
    ) -> Result<Self, ConfigError> {
        let retry_count = state_params
            .get(RETRY_COUNT_KEY)
            .and_then(Value::as_u64)
            .map_or(0, |n| u32::try_from(n).unwrap_or(u32::MAX));

        let mut control = Self {
            retry_limit: if enable_by_default {
                DEFAULT_RETRY_LIMIT
            } else {
                0
            },
            retry_count,
            retry_interval: 0,
            max_retry_interval: None,
            interval_type: RetryIntervalType::Constant,
            state_params: state_params.clone(),
        };

        match config.raw(RETRY_CONFIG_KEY) {
            None | Some(Value::Null) => {}
            Some(value @ (Value::Number(_) | Value::String(_))) => {
                control.retry_limit = parse_limit(RETRY_CONFIG_KEY, value)?;
            }
            Some(Value::Object(_)) => {
                let retry = config.get_nested(RETRY_CONFIG_KEY)?;
                let limit = retry
                    .raw("limit")
                    .ok_or_else(|| ConfigError::Missing("_retry.limit".to_string()))?;
                control.retry_limit = parse_limit("_retry.limit", limit)?;
                control.retry_interval = retry
                    .get_duration("interval")?
                    .map_or(0, |d| d.as_secs());
                control.max_retry_interval =
                    retry.get_duration("max_interval")?.map(|d| d.as_secs());
                if let Some(interval_type) = retry.get_optional::<String>("interval_type")? {
                    control.interval_type = interval_type.parse()?;
                }
            }
            Some(other) => {
                return Err(ConfigError::invalid(
                    RETRY_CONFIG_KEY,
                    format!("expected a number or an object, got {other}"),
                ));
            }
        }

        Ok(control)
    }

    /// Whether another whole-task attempt is allowed.
    pub fn evaluate(&self) -> bool {
        self.retry_count < self.retry_limit
    }

    pub fn next_retry_interval(&self) -> u64 {
        match self.interval_type {
            RetryIntervalType::Constant => self.retry_interval,
            RetryIntervalType::Exponential => {
                let grown = 2u64
                    .checked_pow(self.retry_count)
                    .and_then(|factor| self.retry_interval.checked_mul(factor))
                    .unwrap_or(u64::MAX);
                match self.max_retry_interval {
                    Some(max) => grown.min(max),
                    None => grown,
                }
            }
        }
    }

    /// The state document to resume with, with the attempt counter bumped.
    pub fn next_retry_state_params(&self) -> Document {
        let mut next = self.state_params.clone();
        next.insert(
            RETRY_COUNT_KEY.to_string(),
            Value::from(self.retry_count.saturating_add(1)),
        );
        next
    }

    pub fn retry_limit(&self) -> u32 {
        self.retry_limit
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn interval_type(&self) -> RetryIntervalType {
        self.interval_type
    }
}

fn parse_limit(key: &str, value: &Value) -> Result<u32, ConfigError> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .ok_or_else(|| ConfigError::invalid(key, format!("expected a retry count, got {n}"))),
        Value::String(text) => text
            .trim()
            .parse()
            .map_err(|_| ConfigError::invalid(key, format!("expected a retry count, got '{text}'"))),
        other => Err(ConfigError::invalid(
            key,
            format!("expected a retry count, got {other}"),
        )),
    }
}
