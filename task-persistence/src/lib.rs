//! Host-side collaborators for resumable tasks.
//!
//! Task code never touches these directly. A task invocation returns either
//! a completed result or a suspension carrying its whole state document; the
//! host then has to:
//!
//! - **StateBackend**: keep the latest document per task attempt so the next
//!   invocation receives exactly what the previous one suspended with.
//! - **TaskQueue**: re-deliver the attempt no earlier than the requested
//!   retry interval.
//!
//! Both come with in-memory implementations that are suitable for tests and
//! single-process hosts.
//!
//! # Example
//!
//! ```rust,ignore
//! use task_persistence::{InMemoryBackend, StateBackend, StateRecord};
//!
//! let backend = InMemoryBackend::new();
//! backend.save_state(StateRecord::new("attempt-1", document)).await?;
//! let restored = backend.load_state("attempt-1").await?;
//! ```
//!
//! # Implementing Custom Backends
//!
//! Implement [`StateBackend`] and [`TaskQueue`] over durable storage. Saves
//! must overwrite; a suspended attempt only ever needs its newest document.

pub mod backend;
pub mod in_memory;
pub mod queue;
pub mod record;

pub use backend::{BackendError, StateBackend};
pub use in_memory::{InMemoryBackend, InMemoryTaskQueue};
pub use queue::{QueuedTask, TaskQueue};
pub use record::StateRecord;
