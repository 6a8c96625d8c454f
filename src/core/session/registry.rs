use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use super::{CallSession, SessionError, SessionResult};

/// Process-wide table of active calls keyed by call id.
///
/// Each operation is a single atomic map access; calls never observe each other's
/// sessions except through these operations.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: DashMap<String, Arc<CallSession>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new session in the `Connecting` state.
    pub fn create(
        &self,
        call_id: &str,
        media_stream_id: &str,
    ) -> SessionResult<Arc<CallSession>> {
        match self.sessions.entry(call_id.to_string()) {
            Entry::Occupied(_) => Err(SessionError::DuplicateSession(call_id.to_string())),
            Entry::Vacant(slot) => {
                let session = Arc::new(CallSession::new(call_id, media_stream_id));
                slot.insert(session.clone());
                tracing::debug!(call_id = %call_id, "Session registered");
                Ok(session)
            }
        }
    }

    pub fn get(&self, call_id: &str) -> SessionResult<Arc<CallSession>> {
        self.sessions
            .get(call_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| SessionError::NotFound(call_id.to_string()))
    }

    /// Remove a session, returning it if it was present.
    pub fn remove(&self, call_id: &str) -> Option<Arc<CallSession>> {
        let removed = self.sessions.remove(call_id).map(|(_, session)| session);
        if removed.is_some() {
            tracing::debug!(call_id = %call_id, "Session removed");
        }
        removed
    }

    pub fn contains(&self, call_id: &str) -> bool {
        self.sessions.contains_key(call_id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
