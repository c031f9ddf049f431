//! Session Storage
//!
//! The storage port the interview service persists sessions through. Each
//! load and save is atomic for one record; there are no cross-record
//! transactions. Saves carry the session revision so that a stale writer is
//! refused instead of overwriting newer state.

pub mod file;

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::interview::CandidateSession;

pub use file::JsonFileSessionStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("session {id} was saved concurrently (stored revision {stored}, attempted {attempted})")]
    Conflict { id: Uuid, stored: u64, attempted: u64 },
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load_session(&self, id: Uuid) -> Result<Option<CandidateSession>, StoreError>;

    /// Replace the stored record. Fails with [`StoreError::Conflict`] unless
    /// `session.revision` is newer than the stored one.
    async fn save_session(&self, session: &CandidateSession) -> Result<(), StoreError>;
}

fn check_revision(id: Uuid, stored: Option<u64>, attempted: u64) -> Result<(), StoreError> {
    match stored {
        Some(stored) if stored >= attempted => Err(StoreError::Conflict { id, stored, attempted }),
        _ => Ok(()),
    }
}

/// Process-local store, used in tests and offline runs.
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<Uuid, CandidateSession>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn load_session(&self, id: Uuid) -> Result<Option<CandidateSession>, StoreError> {
        Ok(self.sessions.read().await.get(&id).cloned())
    }

    async fn save_session(&self, session: &CandidateSession) -> Result<(), StoreError> {
        let mut sessions = self.sessions.write().await;
        check_revision(session.id, sessions.get(&session.id).map(|s| s.revision), session.revision)?;
        sessions.insert(session.id, session.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_round_trip() {
        let store = InMemorySessionStore::new();
        let mut session = CandidateSession::new();
        session.revision = 1;
        store.save_session(&session).await.unwrap();

        let loaded = store.load_session(session.id).await.unwrap().unwrap();
        assert_eq!(loaded, session);
        assert!(store.load_session(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_stale_revision_rejected() {
        let store = InMemorySessionStore::new();
        let mut session = CandidateSession::new();
        session.revision = 2;
        store.save_session(&session).await.unwrap();

        session.revision = 2;
        let err = store.save_session(&session).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict { stored: 2, attempted: 2, .. }));
        assert_eq!(store.len().await, 1);
    }
}
