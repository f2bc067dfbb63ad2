//! In-memory session storage.

use std::{
    collections::HashMap,
    sync::RwLock,
    time::{SystemTime, UNIX_EPOCH},
};

use async_trait::async_trait;
use sandbox_agent_core::traits::{
    Session, SessionFilter, SessionId, SessionStatus, SessionStorage, StorageError,
};
use uuid::Uuid;

/// In-memory storage implementation.
///
/// Useful for development and single-process deployments.
/// Data is lost on restart.
pub struct MemoryStorage {
    sessions: RwLock<HashMap<SessionId, Session>>,
}

impl MemoryStorage {
    /// Create a new in-memory storage.
    #[must_use]
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

fn now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

#[async_trait]
impl SessionStorage for MemoryStorage {
    async fn create(&self, prompt: &str) -> Result<SessionId, StorageError> {
        let id = Uuid::new_v4();
        let timestamp = now();

        let session = Session {
            id,
            prompt: prompt.to_string(),
            status: SessionStatus::Pending,
            created_at: timestamp,
            updated_at: timestamp,
        };

        self.sessions
            .write()
            .map_err(|e| StorageError::Internal(e.to_string()))?
            .insert(id, session);

        Ok(id)
    }

    async fn get(&self, id: SessionId) -> Result<Option<Session>, StorageError> {
        Ok(self
            .sessions
            .read()
            .map_err(|e| StorageError::Internal(e.to_string()))?
            .get(&id)
            .cloned())
    }

    async fn update_status(&self, id: SessionId, status: SessionStatus) -> Result<(), StorageError> {
        let mut sessions = self
            .sessions
            .write()
            .map_err(|e| StorageError::Internal(e.to_string()))?;

        let session = sessions.get_mut(&id).ok_or(StorageError::NotFound(id))?;

        session.status = status;
        session.updated_at = now();

        Ok(())
    }

    async fn list(&self, filter: SessionFilter) -> Result<Vec<Session>, StorageError> {
        let sessions = self
            .sessions
            .read()
            .map_err(|e| StorageError::Internal(e.to_string()))?;

        let mut result: Vec<Session> = sessions
            .values()
            .filter(|s| filter.status.is_none_or(|status| s.status == status))
            .cloned()
            .collect();

        // Sort by created_at descending
        result.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        if let Some(limit) = filter.limit {
            result.truncate(limit);
        }

        Ok(result)
    }
}
