// Conversation store
//
// Owns every session of one user plus the active-session pointer.
// Invariants: at least one session exists, and the active pointer always
// refers to a stored session. The store is a plain value owned by the caller, so tests can run
// any number of independent stores.

use uuid::Uuid;

use crate::error::{AgentError, Result};
use crate::session::Session;

/// In-memory conversation store
///
/// Sessions are kept in creation order; `active` indexes into `sessions`.
#[derive(Debug, Clone)]
pub struct ConversationStore {
    sessions: Vec<Session>,
    active: usize,
}

impl ConversationStore {
    /// Create a store holding one empty, active session
    pub fn new() -> Self {
        Self {
            sessions: vec![Session::new()],
            active: 0,
        }
    }

    /// Create a new session and make it active
    pub fn create_session(&mut self) -> Uuid {
        let session = Session::new();
        let id = session.id;
        self.sessions.push(session);
        self.active = self.sessions.len() - 1;
        tracing::debug!(session_id = %id, "Created session");
        id
    }

    pub fn active_id(&self) -> Uuid {
        self.sessions[self.active].id
    }

    pub fn active(&self) -> &Session {
        &self.sessions[self.active]
    }

    pub fn active_mut(&mut self) -> &mut Session {
        &mut self.sessions[self.active]
    }

    fn position(&self, id: Uuid) -> Result<usize> {
        self.sessions
            .iter()
            .position(|s| s.id == id)
            .ok_or_else(|| AgentError::session_not_found(id))
    }

    pub fn get(&self, id: Uuid) -> Result<&Session> {
        let index = self.position(id)?;
        Ok(&self.sessions[index])
    }

    pub fn get_mut(&mut self, id: Uuid) -> Result<&mut Session> {
        let index = self.position(id)?;
        Ok(&mut self.sessions[index])
    }

    /// Make another session active
    pub fn switch_to(&mut self, id: Uuid) -> Result<()> {
        self.active = self.position(id)?;
        Ok(())
    }

    /// Delete a session.
    ///
    /// Deleting the only session is refused and leaves the store unchanged.
    /// When the active session is deleted, the most recently created remaining
    /// session becomes active.
    pub fn delete(&mut self, id: Uuid) -> Result<()> {
        let index = self.position(id)?;
        if self.sessions.len() == 1 {
            tracing::warn!(session_id = %id, "Refusing to delete the last session");
            return Err(AgentError::LastSession);
        }

        self.sessions.remove(index);
        if index == self.active {
            self.active = self.sessions.len() - 1;
        } else if index < self.active {
            self.active -= 1;
        }
        tracing::debug!(session_id = %id, active_id = %self.active_id(), "Deleted session");
        Ok(())
    }

    /// Sessions, newest first
    pub fn list(&self) -> Vec<&Session> {
        self.sessions.iter().rev().collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Always false: a store never runs out of sessions
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl Default for ConversationStore {
    fn default() -> Self {
        Self::new()
    }
}
