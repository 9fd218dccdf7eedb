//! The unit of persistence: one attempt's latest state document.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use task_core::Document;

/// Latest persisted document of a suspended task attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateRecord {
    pub attempt_id: String,
    /// Root document exactly as the last invocation suspended with it.
    pub state: Document,
    /// Number of times this attempt has suspended so far.
    #[serde(default)]
    pub suspensions: u64,
    pub updated_at: DateTime<Utc>,
}

impl StateRecord {
    pub fn new(attempt_id: impl Into<String>, state: Document) -> Self {
        Self {
            attempt_id: attempt_id.into(),
            state,
            suspensions: 0,
            updated_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn with_updated_at(mut self, updated_at: DateTime<Utc>) -> Self {
        self.updated_at = updated_at;
        self
    }

    /// Replace the document after another suspension.
    pub fn advance(&mut self, state: Document, updated_at: DateTime<Utc>) {
        self.state = state;
        self.suspensions += 1;
        self.updated_at = updated_at;
    }

    /// Encode for storage backends that keep opaque bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}
