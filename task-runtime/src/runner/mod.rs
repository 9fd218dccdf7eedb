mod driver;

pub use driver::{InvocationStatus, TaskDriver};
