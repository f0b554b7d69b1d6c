// Session context: who is logged in, persisted behind a pluggable store.
//
// Lifecycle: `login` sets the session, protected operations call
// `require_authenticated`, `logout` clears it. Credential checking is only a
// presence check; real authentication belongs to whatever fronts the backend.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tracing::{info, warn};

use crate::db::Database;

const SESSION_KEY: &str = "session";

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Please enter valid credentials")]
    InvalidCredentials,

    #[error("Please log in to access the analytics platform")]
    NotAuthenticated,

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub username: String,
    pub logged_in_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Stores
// ---------------------------------------------------------------------------

pub trait SessionStore: Send + Sync {
    fn get(&self) -> Result<Option<Session>, SessionError>;
    fn set(&self, session: &Session) -> Result<(), SessionError>;
    fn clear(&self) -> Result<(), SessionError>;
}

/// Keeps the session in the dashboard database so it survives restarts.
pub struct SqliteSessionStore {
    db: Arc<Database>,
}

impl SqliteSessionStore {
    pub fn new(db: Arc<Database>) -> Self {
        SqliteSessionStore { db }
    }
}

impl SessionStore for SqliteSessionStore {
    fn get(&self) -> Result<Option<Session>, SessionError> {
        let Some(value) = self.db.load_state(SESSION_KEY)? else {
            return Ok(None);
        };
        match serde_json::from_value(value) {
            Ok(session) => Ok(Some(session)),
            Err(e) => {
                // Treat an unreadable record as logged out.
                warn!("discarding unreadable session record: {e}");
                Ok(None)
            }
        }
    }

    fn set(&self, session: &Session) -> Result<(), SessionError> {
        let value = serde_json::to_value(session).map_err(anyhow::Error::from)?;
        self.db.save_state(SESSION_KEY, &value)?;
        Ok(())
    }

    fn clear(&self) -> Result<(), SessionError> {
        self.db.clear_state(SESSION_KEY)?;
        Ok(())
    }
}

/// Process-local store, used by tests and one-shot runs.
#[derive(Default)]
pub struct MemorySessionStore {
    inner: Mutex<Option<Session>>,
}

impl SessionStore for MemorySessionStore {
    fn get(&self) -> Result<Option<Session>, SessionError> {
        Ok(self.inner.lock().unwrap_or_else(PoisonError::into_inner).clone())
    }

    fn set(&self, session: &Session) -> Result<(), SessionError> {
        *self.inner.lock().unwrap_or_else(PoisonError::into_inner) = Some(session.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), SessionError> {
        *self.inner.lock().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// SessionContext
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct SessionContext {
    store: Arc<dyn SessionStore>,
}

impl SessionContext {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        SessionContext { store }
    }

    pub fn in_memory() -> Self {
        SessionContext::new(Arc::new(MemorySessionStore::default()))
    }

    /// Start a session. Both fields must be non-blank.
    pub fn login(&self, username: &str, password: &str) -> Result<Session, SessionError> {
        let username = username.trim();
        if username.is_empty() || password.trim().is_empty() {
            warn!("login rejected: missing username or password");
            return Err(SessionError::InvalidCredentials);
        }
        let session = Session {
            username: username.to_string(),
            logged_in_at: Utc::now(),
        };
        self.store.set(&session)?;
        info!(username, "logged in");
        Ok(session)
    }

    pub fn current(&self) -> Result<Option<Session>, SessionError> {
        self.store.get()
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self.store.get(), Ok(Some(_)))
    }

    /// Gate for protected operations.
    pub fn require_authenticated(&self) -> Result<Session, SessionError> {
        self.store.get()?.ok_or(SessionError::NotAuthenticated)
    }

    /// End the session. Returns whether one was active.
    pub fn logout(&self) -> Result<bool, SessionError> {
        let was_active = self.store.get()?.is_some();
        self.store.clear()?;
        if was_active {
            info!("logged out");
        }
        Ok(was_active)
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
