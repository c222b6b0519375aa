use std::sync::{Arc, Mutex};
use tracing::{info, warn};

use crate::api::User;

pub use store::{FileSessionStore, MemorySessionStore};

mod store;

/// Key of the bearer token entry.
pub const TOKEN_KEY: &str = "auth_token";
/// Key of the JSON-serialized user record entry.
pub const USER_KEY: &str = "user";

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("session file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("session file {path} is malformed: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("could not encode session: {0}")]
    Encode(String),
}

/// Persistent string key/value storage for the two session entries.
pub trait SessionStore: Send {
    fn get(&self, key: &str) -> Result<Option<String>, SessionError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), SessionError>;
    fn remove(&mut self, key: &str) -> Result<(), SessionError>;
}

pub type SharedStore = Arc<Mutex<dyn SessionStore>>;

pub fn shared<S: SessionStore + 'static>(store: S) -> SharedStore {
    Arc::new(Mutex::new(store))
}

#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub token: String,
    pub user: User,
}

/// Start-up check of the persisted session.
pub struct SessionGuard;

impl SessionGuard {
    /// Returns the stored session, or `None` when either entry is missing,
    /// empty or unreadable.
    pub fn check(store: &SharedStore) -> Option<Session> {
        let store = store.lock().ok()?;
        let token = read_entry(&*store, TOKEN_KEY)?;
        let raw_user = read_entry(&*store, USER_KEY)?;

        match serde_json::from_str::<User>(&raw_user) {
            Ok(user) => {
                info!(user_id = user.id, "restored session");
                Some(Session { token, user })
            }
            Err(e) => {
                warn!(error = %e, "stored user record is not valid JSON");
                None
            }
        }
    }

    pub fn persist(store: &SharedStore, session: &Session) -> Result<(), SessionError> {
        let user = serde_json::to_string(&session.user).map_err(|e| SessionError::Encode(e.to_string()))?;
        let mut store = store
            .lock()
            .map_err(|_| SessionError::Encode("session store lock poisoned".to_string()))?;
        store.set(TOKEN_KEY, &session.token)?;
        store.set(USER_KEY, &user)?;
        info!(user_id = session.user.id, "session stored");
        Ok(())
    }

    /// Remove both entries. Both removals are attempted; the first failure
    /// is returned.
    pub fn clear(store: &SharedStore) -> Result<(), SessionError> {
        let mut store = store
            .lock()
            .map_err(|_| SessionError::Encode("session store lock poisoned".to_string()))?;
        let token = store.remove(TOKEN_KEY);
        let user = store.remove(USER_KEY);
        token.and(user)?;
        info!("session cleared");
        Ok(())
    }
}

fn read_entry(store: &dyn SessionStore, key: &str) -> Option<String> {
    match store.get(key) {
        Ok(Some(value)) if !value.is_empty() => Some(value),
        Ok(_) => None,
        Err(e) => {
            warn!(key, error = %e, "could not read session entry");
            None
        }
    }
}
