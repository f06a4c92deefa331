//! Session registry interface and an in-memory implementation.
//!
//! The registry owns sessions; this crate only reads them and writes back
//! completion flags.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::{Result, ResultsError};
use crate::types::Session;

/// Trait for session registries.
///
/// Implementors should:
/// - Return `Ok(None)` for unknown tokens (not an error)
/// - Treat `update_session` and `add_session` as full replacements keyed by token
pub trait SessionRegistry: Send + Sync {
    fn get_session(&self, token: &str) -> Result<Option<Session>>;

    fn update_session(&self, session: &Session) -> Result<()>;

    fn add_session(&self, session: Session) -> Result<()>;
}

/// Registry backed by a `HashMap`, for tests and embedders without persistence.
#[derive(Default)]
pub struct MemorySessionRegistry {
    sessions: RwLock<HashMap<String, Session>>,
}

impl MemorySessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sessions.read().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SessionRegistry for MemorySessionRegistry {
    fn get_session(&self, token: &str) -> Result<Option<Session>> {
        let sessions = self
            .sessions
            .read()
            .map_err(|_| ResultsError::Registry("session map poisoned".to_string()))?;
        Ok(sessions.get(token).cloned())
    }

    fn update_session(&self, session: &Session) -> Result<()> {
        let mut sessions = self
            .sessions
            .write()
            .map_err(|_| ResultsError::Registry("session map poisoned".to_string()))?;
        sessions.insert(session.token.clone(), session.clone());
        Ok(())
    }

    fn add_session(&self, session: Session) -> Result<()> {
        let mut sessions = self
            .sessions
            .write()
            .map_err(|_| ResultsError::Registry("session map poisoned".to_string()))?;
        sessions.insert(session.token.clone(), session);
        Ok(())
    }
}
