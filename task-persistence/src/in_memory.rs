//! In-memory implementations of StateBackend and TaskQueue.
//!
//! State lives in HashMaps behind `Arc<RwLock<_>>`, so clones share it.
//! Useful for testing and as a reference implementation.

use crate::backend::{BackendError, StateBackend};
use crate::queue::{QueuedTask, TaskQueue};
use crate::record::StateRecord;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use task_core::TaskRequest;

fn lock_error(e: impl std::fmt::Display) -> BackendError {
    BackendError::Backend(format!("Lock error: {}", e))
}

/// In-memory backend that stores state records in a HashMap.
///
/// # Example
///
/// ```rust,ignore
/// use task_persistence::{InMemoryBackend, StateBackend, StateRecord};
///
/// let backend = InMemoryBackend::new();
/// backend.save_state(StateRecord::new("attempt-1", document)).await?;
/// ```
#[derive(Clone, Default)]
pub struct InMemoryBackend {
    records: Arc<RwLock<HashMap<String, StateRecord>>>,
}

impl InMemoryBackend {
    /// Create a new in-memory backend.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateBackend for InMemoryBackend {
    async fn save_state(&self, record: StateRecord) -> Result<(), BackendError> {
        let mut records = self.records.write().map_err(lock_error)?;
        records.insert(record.attempt_id.clone(), record);
        Ok(())
    }

    async fn load_state(&self, attempt_id: &str) -> Result<StateRecord, BackendError> {
        let records = self.records.read().map_err(lock_error)?;
        records
            .get(attempt_id)
            .cloned()
            .ok_or_else(|| BackendError::NotFound(attempt_id.to_string()))
    }

    async fn delete_state(&self, attempt_id: &str) -> Result<(), BackendError> {
        let mut records = self.records.write().map_err(lock_error)?;
        records
            .remove(attempt_id)
            .ok_or_else(|| BackendError::NotFound(attempt_id.to_string()))
            .map(|_| ())
    }

    async fn list_states(&self) -> Result<Vec<String>, BackendError> {
        let records = self.records.read().map_err(lock_error)?;
        Ok(records.keys().cloned().collect())
    }
}

#[derive(Default)]
struct QueueInner {
    next_lock: u64,
    pending: Vec<QueuedTask>,
    delivered: HashMap<String, QueuedTask>,
}

/// In-memory delay queue.
#[derive(Clone, Default)]
pub struct InMemoryTaskQueue {
    inner: Arc<RwLock<QueueInner>>,
}

impl InMemoryTaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock IDs delivered by `poll_ready` and not yet marked done.
    pub fn delivered(&self) -> Result<Vec<String>, BackendError> {
        let inner = self.inner.read().map_err(lock_error)?;
        Ok(inner.delivered.keys().cloned().collect())
    }
}

#[async_trait]
impl TaskQueue for InMemoryTaskQueue {
    async fn enqueue(
        &self,
        request: TaskRequest,
        ready_at: DateTime<Utc>,
    ) -> Result<String, BackendError> {
        let mut inner = self.inner.write().map_err(lock_error)?;
        inner.next_lock += 1;
        let lock_id = format!("lock-{}", inner.next_lock);
        tracing::trace!(lock_id = %lock_id, attempt_id = %request.attempt_id, %ready_at, "Enqueued task");
        inner.pending.push(QueuedTask {
            lock_id: lock_id.clone(),
            request,
            ready_at,
        });
        Ok(lock_id)
    }

    async fn poll_ready(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<QueuedTask>, BackendError> {
        let mut inner = self.inner.write().map_err(lock_error)?;
        // Stable sort keeps enqueue order among equal ready times.
        inner.pending.sort_by_key(|task| task.ready_at);
        let ready = inner
            .pending
            .iter()
            .take_while(|task| task.is_ready(now))
            .take(limit)
            .count();
        let taken: Vec<QueuedTask> = inner.pending.drain(..ready).collect();
        for task in &taken {
            inner.delivered.insert(task.lock_id.clone(), task.clone());
        }
        Ok(taken)
    }

    async fn mark_done(&self, lock_id: &str) -> Result<(), BackendError> {
        let mut inner = self.inner.write().map_err(lock_error)?;
        inner
            .delivered
            .remove(lock_id)
            .ok_or_else(|| BackendError::NotFound(lock_id.to_string()))
            .map(|_| ())
    }

    async fn pending(&self) -> Result<usize, BackendError> {
        let inner = self.inner.read().map_err(lock_error)?;
        Ok(inner.pending.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use task_core::{Document, TaskConfig};

    fn request(attempt_id: &str) -> TaskRequest {
        TaskRequest::new(attempt_id, "+task", TaskConfig::default())
    }

    #[tokio::test]
    async fn test_save_and_load_state() {
        let backend = InMemoryBackend::new();
        let mut state = Document::new();
        state.insert("poll".to_string(), json!({"iteration": 2}));

        backend
            .save_state(StateRecord::new("attempt-1", state.clone()))
            .await
            .unwrap();
        let loaded = backend.load_state("attempt-1").await.unwrap();
        assert_eq!(loaded.state, state);
        assert_eq!(backend.list_states().await.unwrap(), vec!["attempt-1"]);
    }

    #[tokio::test]
    async fn test_save_overwrites() {
        let backend = InMemoryBackend::new();
        backend
            .save_state(StateRecord::new("attempt-1", Document::new()))
            .await
            .unwrap();
        let mut state = Document::new();
        state.insert("retry".to_string(), json!(1));
        backend
            .save_state(StateRecord::new("attempt-1", state.clone()))
            .await
            .unwrap();
        assert_eq!(backend.load_state("attempt-1").await.unwrap().state, state);
        assert_eq!(backend.list_states().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_state() {
        let backend = InMemoryBackend::new();
        assert!(matches!(
            backend.load_state("nope").await,
            Err(BackendError::NotFound(_))
        ));
        assert!(matches!(
            backend.delete_state("nope").await,
            Err(BackendError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_clones_share_storage() {
        let backend = InMemoryBackend::new();
        let other = backend.clone();
        backend
            .save_state(StateRecord::new("attempt-1", Document::new()))
            .await
            .unwrap();
        other.delete_state("attempt-1").await.unwrap();
        assert!(backend.list_states().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_queue_delivers_only_ready_tasks() {
        let queue = InMemoryTaskQueue::new();
        let now = Utc::now();
        queue
            .enqueue(request("later"), now + chrono::Duration::seconds(30))
            .await
            .unwrap();
        let lock_id = queue.enqueue(request("now"), now).await.unwrap();

        let ready = queue.poll_ready(now, 10).await.unwrap();
        assert_eq!(ready.len(), 1);
        assert_eq!(ready[0].lock_id, lock_id);
        assert_eq!(ready[0].request.attempt_id, "now");
        assert_eq!(queue.pending().await.unwrap(), 1);

        let ready = queue
            .poll_ready(now + chrono::Duration::seconds(30), 10)
            .await
            .unwrap();
        assert_eq!(ready[0].request.attempt_id, "later");
        assert_eq!(queue.pending().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_queue_orders_by_ready_time_and_limits() {
        let queue = InMemoryTaskQueue::new();
        let now = Utc::now();
        queue
            .enqueue(request("b"), now - chrono::Duration::seconds(1))
            .await
            .unwrap();
        queue
            .enqueue(request("a"), now - chrono::Duration::seconds(5))
            .await
            .unwrap();
        queue.enqueue(request("c"), now).await.unwrap();

        let ready = queue.poll_ready(now, 2).await.unwrap();
        let ids: Vec<_> = ready.iter().map(|t| t.request.attempt_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_mark_done_releases_lock() {
        let queue = InMemoryTaskQueue::new();
        let now = Utc::now();
        let lock_id = queue.enqueue(request("a"), now).await.unwrap();

        assert!(matches!(
            queue.mark_done(&lock_id).await,
            Err(BackendError::NotFound(_))
        ));

        queue.poll_ready(now, 1).await.unwrap();
        assert_eq!(queue.delivered().unwrap(), vec![lock_id.clone()]);
        queue.mark_done(&lock_id).await.unwrap();
        assert!(queue.delivered().unwrap().is_empty());
    }
}
