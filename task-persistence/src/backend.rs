//! Storage trait for persisted task state documents.

use crate::record::StateRecord;
use async_trait::async_trait;

/// Error type for backend operations.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// No record for the given key.
    #[error("Not found: {0}")]
    NotFound(String),
    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// Backend-specific error.
    #[error("Backend error: {0}")]
    Backend(String),
}

impl From<serde_json::Error> for BackendError {
    fn from(e: serde_json::Error) -> Self {
        BackendError::Serialization(e.to_string())
    }
}

/// Trait for persistent storage of task state documents.
///
/// The host saves a record every time an invocation suspends and hands the
/// stored document back on the next invocation of the same attempt.
///
/// # Example
///
/// ```rust,ignore
/// use task_persistence::{InMemoryBackend, StateBackend, StateRecord};
///
/// let backend = InMemoryBackend::new();
/// backend.save_state(StateRecord::new("attempt-1", document)).await?;
/// let record = backend.load_state("attempt-1").await?;
/// ```
#[async_trait]
pub trait StateBackend: Send + Sync {
    /// Save a state record, overwriting any record for the same attempt.
    ///
    /// # Errors
    ///
    /// Returns `BackendError` if the record cannot be saved.
    async fn save_state(&self, record: StateRecord) -> Result<(), BackendError>;

    /// Load the state record of an attempt.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::NotFound` if nothing was saved for `attempt_id`.
    async fn load_state(&self, attempt_id: &str) -> Result<StateRecord, BackendError>;

    /// Delete the state record of an attempt.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::NotFound` if nothing was saved for `attempt_id`.
    async fn delete_state(&self, attempt_id: &str) -> Result<(), BackendError>;

    /// List attempt IDs that have a saved record.
    async fn list_states(&self) -> Result<Vec<String>, BackendError>;
}
