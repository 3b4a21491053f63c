//! Shared application state.

use std::sync::{Arc, Mutex, MutexGuard};

use questline_core::error::DomainError;
use questline_session::application::session::Session;

/// Application state shared across all request handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    /// The single multiplayer session this server hosts.
    pub session: Arc<Mutex<Session>>,
}

impl AppState {
    /// Create new application state.
    #[must_use]
    pub fn new(session: Session) -> Self {
        Self {
            session: Arc::new(Mutex::new(session)),
        }
    }

    /// Locks the session for one request.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if a previous request panicked
    /// while holding the lock.
    pub fn session(&self) -> Result<MutexGuard<'_, Session>, DomainError> {
        self.session
            .lock()
            .map_err(|_| DomainError::Infrastructure("session lock poisoned".into()))
    }
}
