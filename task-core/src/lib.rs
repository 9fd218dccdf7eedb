//! Persisted state, suspension signal and error taxonomy shared by the
//! retry executor, the polling waiter and the task execution wrapper.

pub mod clock;
pub mod config;
pub mod durations;
pub mod error;
pub mod interval;
pub mod request;
pub mod signal;
pub mod state;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::TaskConfig;
pub use error::{ConfigError, ErrorDocument, StateError, TaskError};
pub use interval::DurationInterval;
pub use request::{TaskReport, TaskRequest, TaskResult};
pub use signal::{Outcome, Suspension};
pub use state::{Document, Params, TaskState};
