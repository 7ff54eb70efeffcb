//! Checkpoints: persisted snapshots of a session keyed by thread identifier.
//!
//! The engine writes one after every node execution. Only the latest checkpoint per
//! thread is kept; resuming a thread means loading it, never replaying history.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;

use crate::interview::engine::Node;
use crate::models::session::SessionState;

#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("Checkpoint serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub thread_id: String,
    pub state: SessionState,
    /// Node the workflow will run next; `None` once the interview has finished.
    pub next: Option<Node>,
    /// Number of node executions this thread has completed.
    pub step: u64,
    pub saved_at: DateTime<Utc>,
}

impl Checkpoint {
    pub fn new(thread_id: &str, state: SessionState, next: Option<Node>, step: u64) -> Self {
        Self {
            thread_id: thread_id.to_string(),
            state,
            next,
            step,
            saved_at: Utc::now(),
        }
    }

    pub fn awaiting_response(&self) -> bool {
        self.next == Some(Node::EvaluateResponse)
    }

    pub fn to_json(&self) -> Result<String, CheckpointError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(raw: &str) -> Result<Self, CheckpointError> {
        Ok(serde_json::from_str(raw)?)
    }
}

/// Storage for checkpoints. Implementations must isolate threads from each other;
/// callers serialize writes to any single thread.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn save(&self, checkpoint: Checkpoint) -> Result<(), CheckpointError>;

    async fn load(&self, thread_id: &str) -> Result<Option<Checkpoint>, CheckpointError>;
}

/// Process-lifetime checkpoint store. Snapshots are kept in their JSON form, the same
/// bytes an external store would hold, so a state that cannot round-trip fails on save.
#[derive(Default)]
pub struct InMemoryCheckpointStore {
    checkpoints: RwLock<HashMap<String, String>>,
}

impl InMemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CheckpointStore for InMemoryCheckpointStore {
    async fn save(&self, checkpoint: Checkpoint) -> Result<(), CheckpointError> {
        let raw = checkpoint.to_json()?;
        debug!(
            "Checkpoint saved for thread {} at step {} ({} bytes)",
            checkpoint.thread_id,
            checkpoint.step,
            raw.len()
        );
        self.checkpoints
            .write()
            .await
            .insert(checkpoint.thread_id, raw);
        Ok(())
    }

    async fn load(&self, thread_id: &str) -> Result<Option<Checkpoint>, CheckpointError> {
        match self.checkpoints.read().await.get(thread_id) {
            Some(raw) => Checkpoint::from_json(raw).map(Some),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::session::Turn;
    use crate::taxonomy::Taxonomy;
    use std::sync::Arc;

    fn state_with(content: &str) -> SessionState {
        SessionState::new(Arc::new(Taxonomy::default())).with_turn(Turn::interviewer(content))
    }

    #[tokio::test]
    async fn test_save_replaces_previous_checkpoint() {
        let store = InMemoryCheckpointStore::new();
        store
            .save(Checkpoint::new("t1", state_with("first"), Some(Node::GenerateQuestion), 1))
            .await
            .unwrap();
        store
            .save(Checkpoint::new("t1", state_with("second"), Some(Node::EvaluateResponse), 2))
            .await
            .unwrap();

        let loaded = store.load("t1").await.unwrap().unwrap();
        assert_eq!(loaded.step, 2);
        assert!(loaded.awaiting_response());
        assert_eq!(loaded.state.transcript[0].content, "second");
    }

    #[tokio::test]
    async fn test_threads_are_isolated() {
        let store = Arc::new(InMemoryCheckpointStore::new());
        let mut handles = Vec::new();
        for i in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let id = format!("thread-{i}");
                store
                    .save(Checkpoint::new(&id, state_with(&id), None, i))
                    .await
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        for i in 0..8 {
            let id = format!("thread-{i}");
            let loaded = store.load(&id).await.unwrap().unwrap();
            assert_eq!(loaded.state.transcript[0].content, id);
            assert_eq!(loaded.step, i);
        }
        assert!(store.load("thread-missing").await.unwrap().is_none());
    }

    #[test]
    fn test_checkpoint_json_preserves_everything() {
        let checkpoint = Checkpoint::new("t1", state_with("q"), Some(Node::EvaluateResponse), 2);
        let restored = Checkpoint::from_json(&checkpoint.to_json().unwrap()).unwrap();
        assert_eq!(restored, checkpoint);
    }

    #[test]
    fn test_checkpoint_from_garbage_is_an_error() {
        assert!(matches!(
            Checkpoint::from_json("{\"thread_id\": 5}"),
            Err(CheckpointError::Serialization(_))
        ));
    }
}
