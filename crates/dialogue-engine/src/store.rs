//! Session persistence with optimistic versioning.
//!
//! Topic state is read, evolved and written back once per turn. Two turns
//! racing on the same session would otherwise lose an update, so every
//! stored state carries a version and `save` is a conditional write.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;

use dialogue_topics::TopicState;

/// Errors from a session store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The stored version moved since it was read
    #[error("Version conflict for session {session_id}: expected {expected}, found {actual}")]
    VersionConflict {
        session_id: String,
        expected: u64,
        actual: u64,
    },

    /// Backend failure reported by a store implementation
    #[error("Store backend error: {0}")]
    Backend(String),
}

/// A topic state together with its write version.
///
/// Version 0 means the session has never been written.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VersionedState {
    pub version: u64,
    pub state: TopicState,
}

/// Persistence collaborator for per-session topic state.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Load the state of a session, `None` for a new session.
    async fn load(&self, session_id: &str) -> Result<Option<VersionedState>, StoreError>;

    /// Write `state` if the stored version still equals `expected_version`.
    ///
    /// Returns the new version. Use `expected_version = 0` for a session
    /// that has never been written.
    async fn save(
        &self,
        session_id: &str,
        expected_version: u64,
        state: TopicState,
    ) -> Result<u64, StoreError>;

    /// Remove a session. Returns whether it existed.
    async fn delete(&self, session_id: &str) -> Result<bool, StoreError>;
}

/// Session store backed by an in-process map.
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, VersionedState>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored sessions.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn load(&self, session_id: &str) -> Result<Option<VersionedState>, StoreError> {
        Ok(self.sessions.read().await.get(session_id).cloned())
    }

    async fn save(
        &self,
        session_id: &str,
        expected_version: u64,
        state: TopicState,
    ) -> Result<u64, StoreError> {
        let mut sessions = self.sessions.write().await;
        let actual = sessions.get(session_id).map(|s| s.version).unwrap_or(0);
        if actual != expected_version {
            return Err(StoreError::VersionConflict {
                session_id: session_id.to_string(),
                expected: expected_version,
                actual,
            });
        }

        let version = actual + 1;
        sessions.insert(session_id.to_string(), VersionedState { version, state });
        debug!(session_id = %session_id, version = version, "Saved session state");
        Ok(version)
    }

    async fn delete(&self, session_id: &str) -> Result<bool, StoreError> {
        Ok(self.sessions.write().await.remove(session_id).is_some())
    }
}
