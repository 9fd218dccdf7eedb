//! Checkpointed polling for a condition that becomes true eventually.
//!
//! Scope layout under `state_key`:
//!
//! | key          | meaning                                         |
//! |--------------|-------------------------------------------------|
//! | `start_time` | epoch millis of the first check                 |
//! | `iteration`  | "not ready" answers so far                      |
//! | `result`     | memoized `await_once` result                    |
//! | `operation`  | nested scope handed to the operation            |

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use task_core::durations::format_duration;
use task_core::{Clock, DurationInterval, SystemClock, TaskError, TaskState};

const START_TIME: &str = "start_time";
const ITERATION: &str = "iteration";
const RESULT: &str = "result";
const OPERATION: &str = "operation";

pub const DEFAULT_POLL_INTERVAL: DurationInterval = DurationInterval::from_secs(1, 30);
pub const DEFAULT_EXPONENTIAL_BASE: f64 = 2.0;
pub const DEFAULT_WAIT_MESSAGE: &str = "Operation failed";

/// Shorthand for [`PollingWaiter::new`].
pub fn polling_waiter<'s, 'a>(
    state: &'s mut TaskState<'a>,
    state_key: impl Into<String>,
) -> PollingWaiter<'s, 'a> {
    PollingWaiter::new(state, state_key)
}

/// Checks a condition once per invocation and suspends until it holds.
///
/// Errors raised by the check are not retried here; wrap the check in a
/// [`RetryExecutor`](super::RetryExecutor) for that.
pub struct PollingWaiter<'s, 'a> {
    state: &'s mut TaskState<'a>,
    state_key: String,
    poll_interval: DurationInterval,
    exponential_base: f64,
    timeout: Option<Duration>,
    wait_message: String,
    clock: Arc<dyn Clock>,
}

impl<'s, 'a> PollingWaiter<'s, 'a> {
    pub fn new(state: &'s mut TaskState<'a>, state_key: impl Into<String>) -> Self {
        Self {
            state,
            state_key: state_key.into(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            exponential_base: DEFAULT_EXPONENTIAL_BASE,
            timeout: None,
            wait_message: DEFAULT_WAIT_MESSAGE.to_string(),
            clock: Arc::new(SystemClock),
        }
    }

    #[must_use]
    pub fn with_poll_interval(mut self, poll_interval: DurationInterval) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    #[must_use]
    pub fn with_exponential_base(mut self, exponential_base: f64) -> Self {
        self.exponential_base = exponential_base;
        self
    }

    /// Give up with [`TaskError::PollingTimeout`] once this much time has
    /// passed since the first check. `None` waits forever.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_wait_message(mut self, message: impl Into<String>) -> Self {
        self.wait_message = message.into();
        self
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Run the check; `Ok(None)` means "not ready yet".
    ///
    /// # Errors
    ///
    /// - [`TaskError::Suspended`] while the check says "not ready".
    /// - [`TaskError::PollingTimeout`] once the timeout has passed.
    /// - Any error raised by the check, unchanged.
    pub fn await_ready<T, F>(mut self, operation: F) -> Result<T, TaskError>
    where
        F: FnOnce(&mut TaskState<'_>) -> Result<Option<T>, TaskError>,
    {
        self.poll(operation)
    }

    /// Like [`await_ready`](Self::await_ready), but the value is persisted and
    /// returned without checking again once it has been seen.
    pub fn await_once<T, F>(mut self, operation: F) -> Result<T, TaskError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(&mut TaskState<'_>) -> Result<Option<T>, TaskError>,
    {
        {
            let mut poll_state = self.state.nested_state(&self.state_key);
            if let Some(result) = poll_state.params().get(RESULT)? {
                return Ok(result);
            }
        }

        let result = self.poll(operation)?;

        self.state
            .nested_state(&self.state_key)
            .params()
            .set(RESULT, &result)?;
        Ok(result)
    }

    fn poll<T, F>(&mut self, operation: F) -> Result<T, TaskError>
    where
        F: FnOnce(&mut TaskState<'_>) -> Result<Option<T>, TaskError>,
    {
        let now = self.clock.now().timestamp_millis();
        let mut poll_state = self.state.nested_state(&self.state_key);

        let start_time = match poll_state.params().get::<i64>(START_TIME)? {
            Some(start_time) => start_time,
            None => {
                poll_state.params().set(START_TIME, now)?;
                now
            }
        };

        if let Some(timeout) = self.timeout {
            let elapsed = now.saturating_sub(start_time);
            let limit = i64::try_from(timeout.as_millis()).unwrap_or(i64::MAX);
            if elapsed >= limit {
                tracing::warn!(
                    state_key = %self.state_key,
                    elapsed_ms = elapsed,
                    "{}: polling timed out after {}",
                    self.wait_message,
                    format_duration(timeout)
                );
                return Err(TaskError::PollingTimeout {
                    message: self.wait_message.clone(),
                    timeout,
                });
            }
        }

        let checked = {
            let mut operation_state = poll_state.nested_state(OPERATION);
            operation(&mut operation_state)?
        };

        let mut params = poll_state.params();
        match checked {
            Some(value) => {
                params.remove(OPERATION);
                params.remove(ITERATION);
                params.remove(START_TIME);
                Ok(value)
            }
            None => {
                let iteration: u32 = params.get_or(ITERATION, 0)?;
                params.set(ITERATION, iteration.saturating_add(1))?;
                let interval = self
                    .poll_interval
                    .backoff_seconds(iteration, self.exponential_base);
                tracing::info!(
                    state_key = %self.state_key,
                    iteration,
                    interval,
                    "{}: checking again in {}",
                    self.wait_message,
                    format_duration(Duration::from_secs(interval))
                );
                Err(poll_state.suspend(interval).into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::retry_executor;
    use anyhow::anyhow;
    use serde_json::{Value, json};
    use std::cell::Cell;
    use task_core::{Document, ManualClock, Suspension};

    fn suspension<T: std::fmt::Debug>(result: Result<T, TaskError>) -> Suspension {
        match result {
            Err(TaskError::Suspended(suspension)) => suspension,
            other => panic!("expected suspension, got {other:?}"),
        }
    }

    fn document(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            other => panic!("not an object: {other}"),
        }
    }

    #[test]
    fn test_ready_on_first_check() {
        let clock = ManualClock::default();
        let mut doc = Document::new();
        let mut state = TaskState::of(&mut doc);
        let value = polling_waiter(&mut state, "exists")
            .with_clock(Arc::new(clock))
            .await_ready(|_| Ok(Some("ok")))
            .unwrap();
        assert_eq!(value, "ok");
        assert_eq!(doc, document(json!({"exists": {}})));
    }

    #[test]
    fn test_backoff_until_ready_then_cleans_up() {
        let clock = ManualClock::default();
        let mut doc = Document::new();
        let mut intervals = Vec::new();
        let answers = [None, None, None, Some(17)];

        for answer in answers {
            let mut state = TaskState::of(&mut doc);
            let result = polling_waiter(&mut state, "job")
                .with_clock(Arc::new(clock.clone()))
                .with_poll_interval(DurationInterval::from_secs(5, 60))
                .await_ready(|s| {
                    let mut params = s.params();
                    let checks: u32 = params.get_or("checks", 0)?;
                    params.set("checks", checks + 1)?;
                    Ok(answer)
                });
            match result {
                Err(TaskError::Suspended(suspension)) => {
                    intervals.push(suspension.retry_interval_seconds);
                    assert_eq!(
                        suspension.state["job"]["operation"]["checks"],
                        json!(intervals.len())
                    );
                    doc = suspension.state;
                    clock.advance(Duration::from_secs(suspension.retry_interval_seconds));
                }
                Ok(value) => assert_eq!(value, 17),
                Err(e) => panic!("unexpected {e:?}"),
            }
        }

        assert_eq!(intervals, vec![5, 10, 20]);
        assert_eq!(doc, document(json!({"job": {}})));
    }

    #[test]
    fn test_start_time_is_fixed_at_first_check() {
        let clock = ManualClock::default();
        clock.advance(Duration::from_secs(100));
        let mut doc = Document::new();

        for _ in 0..3 {
            let mut state = TaskState::of(&mut doc);
            let result: Result<(), _> = polling_waiter(&mut state, "job")
                .with_clock(Arc::new(clock.clone()))
                .await_ready(|_| Ok(None));
            doc = suspension(result).state;
            clock.advance(Duration::from_secs(7));
        }

        assert_eq!(doc["job"]["start_time"], 100_000);
        assert_eq!(doc["job"]["iteration"], 3);
    }

    #[test]
    fn test_timeout_is_terminal() {
        let clock = ManualClock::default();
        let mut doc = Document::new();
        let checks = Cell::new(0);

        let run = |doc: &mut Document| {
            let mut state = TaskState::of(doc);
            polling_waiter(&mut state, "exists")
                .with_clock(Arc::new(clock.clone()))
                .with_wait_message("Object 'b/k' does not yet exist")
                .with_timeout(Some(Duration::from_secs(10)))
                .await_ready(|_| -> Result<Option<()>, TaskError> {
                    checks.set(checks.get() + 1);
                    Ok(None)
                })
        };

        doc = suspension(run(&mut doc)).state;
        clock.advance(Duration::from_secs(9));
        doc = suspension(run(&mut doc)).state;
        clock.advance(Duration::from_secs(1));

        match run(&mut doc) {
            Err(TaskError::PollingTimeout { message, timeout }) => {
                assert_eq!(message, "Object 'b/k' does not yet exist");
                assert_eq!(timeout, Duration::from_secs(10));
            }
            other => panic!("expected timeout, got {other:?}"),
        }
        assert_eq!(checks.get(), 2);
    }

    #[test]
    fn test_check_errors_propagate_unchanged() {
        let mut doc = Document::new();
        let mut state = TaskState::of(&mut doc);
        let result: Result<(), _> = polling_waiter(&mut state, "exists")
            .with_clock(Arc::new(ManualClock::default()))
            .await_ready(|_| Err(anyhow!("access denied").into()));
        match result {
            Err(TaskError::Other(e)) => assert_eq!(e.to_string(), "access denied"),
            other => panic!("unexpected {other:?}"),
        }
        assert!(doc["exists"].get("iteration").is_none());
    }

    #[test]
    fn test_await_once_memoizes() {
        let clock = ManualClock::default();
        let mut doc = Document::new();
        let checks = Cell::new(0);

        for _ in 0..2 {
            let mut state = TaskState::of(&mut doc);
            let value: String = polling_waiter(&mut state, "status")
                .with_clock(Arc::new(clock.clone()))
                .await_once(|_| {
                    checks.set(checks.get() + 1);
                    Ok(Some("SUCCEEDED".to_string()))
                })
                .unwrap();
            assert_eq!(value, "SUCCEEDED");
        }

        assert_eq!(checks.get(), 1);
        assert_eq!(doc["status"]["result"], "SUCCEEDED");
    }

    #[test]
    fn test_await_once_treats_null_result_as_absent() {
        let mut doc = document(json!({"status": {"result": null}}));
        let mut state = TaskState::of(&mut doc);
        let value: u32 = polling_waiter(&mut state, "status")
            .with_clock(Arc::new(ManualClock::default()))
            .await_once(|_| Ok(Some(3)))
            .unwrap();
        assert_eq!(value, 3);
        assert_eq!(doc["status"]["result"], 3);
    }

    #[test]
    fn test_retry_inside_waiter_keeps_both_counters() {
        let clock = ManualClock::default();
        let mut doc = Document::new();
        let mut state = TaskState::of(&mut doc);
        let result: Result<(), _> = polling_waiter(&mut state, "wait")
            .with_clock(Arc::new(clock))
            .await_ready(|s| {
                retry_executor(s, "status")
                    .run(|_| Err(anyhow!("503 from status endpoint").into()))
            });

        let suspension = suspension(result);
        assert_eq!(suspension.retry_interval_seconds, 1);
        assert_eq!(suspension.state["wait"]["operation"]["status"]["retry"], 1);
        assert!(suspension.state["wait"].get("iteration").is_none());
        assert_eq!(suspension.state["wait"]["start_time"], 0);
    }

    #[test]
    fn test_sibling_waiter_and_executor_are_isolated() {
        let clock = ManualClock::default();
        let mut doc = Document::new();

        for round in 1..=3u32 {
            let before = doc.get("call").cloned();
            let mut state = TaskState::of(&mut doc);
            let result: Result<(), _> = polling_waiter(&mut state, "wait")
                .with_clock(Arc::new(clock.clone()))
                .await_ready(|_| Ok(None));
            doc = suspension(result).state;
            assert_eq!(doc.get("call").cloned(), before);
            assert_eq!(doc["wait"]["iteration"], round);

            let before = doc.get("wait").cloned();
            let mut state = TaskState::of(&mut doc);
            let result: Result<u32, _> = retry_executor(&mut state, "call")
                .run_once(|_| Err(anyhow!("503 from upstream").into()));
            doc = suspension(result).state;
            assert_eq!(doc.get("wait").cloned(), before);
            assert_eq!(doc["call"]["retry"], round);
        }

        let mut state = TaskState::of(&mut doc);
        let value: u32 = retry_executor(&mut state, "call")
            .run_once(|_| Ok(7))
            .unwrap();
        let label: String = polling_waiter(&mut state, "wait")
            .with_clock(Arc::new(clock.clone()))
            .await_once(|_| Ok(Some("ready".to_string())))
            .unwrap();
        assert_eq!((value, label.as_str()), (7, "ready"));
        assert_eq!(
            doc,
            document(json!({
                "call": {"done": true, "result": 7, "operation": {}},
                "wait": {"result": "ready"}
            }))
        );
    }

    #[test]
    fn test_fractional_exponential_base() {
        let clock = ManualClock::default();
        let mut doc = Document::new();
        let mut intervals = Vec::new();
        for _ in 0..3 {
            let mut state = TaskState::of(&mut doc);
            let result: Result<(), _> = polling_waiter(&mut state, "job")
                .with_clock(Arc::new(clock.clone()))
                .with_poll_interval(DurationInterval::from_secs(10, 300))
                .with_exponential_base(1.5)
                .await_ready(|_| Ok(None));
            let suspension = suspension(result);
            intervals.push(suspension.retry_interval_seconds);
            doc = suspension.state;
        }
        assert_eq!(intervals, vec![10, 15, 22]);
    }
}
