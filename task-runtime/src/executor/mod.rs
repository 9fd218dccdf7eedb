//! Operation-level executors that checkpoint their progress in task state.
//!
//! Both executors bind to a named key of a [`TaskState`](task_core::TaskState)
//! and keep their bookkeeping under it, so any number of them can coexist in
//! one task, side by side or nested inside each other's operations.

mod polling;
mod retry;

pub use polling::{
    DEFAULT_EXPONENTIAL_BASE, DEFAULT_POLL_INTERVAL, DEFAULT_WAIT_MESSAGE, PollingWaiter,
    polling_waiter,
};
pub use retry::{
    DEFAULT_ERROR_MESSAGE, DEFAULT_RETRY_INTERVAL, RetryExecutor, RetryPredicate, retry_executor,
};
