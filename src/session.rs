//! Session Record
//!
//! The signed-in user is persisted as one JSON record under the `user`
//! key. On wasm32 that is `localStorage`; elsewhere an in-memory store.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::models::Role;

const USER_KEY: &str = "user";
const BACKGROUND_KEY: &str = "backgroundColor";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    #[serde(default)]
    pub uid: String,
    #[serde(default)]
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_color: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Session {
    /// A usable record names both the user and the account
    pub fn is_complete(&self) -> bool {
        !self.uid.trim().is_empty() && !self.email.trim().is_empty()
    }
}

/// Key-value persistence for the session record
pub trait SessionStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;

    fn set(&self, key: &str, value: &str) -> Result<()>;

    fn remove(&self, key: &str) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct MemorySessionStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.remove(key);
        Ok(())
    }
}

/// `window.localStorage`
#[cfg(target_arch = "wasm32")]
#[derive(Debug, Default, Clone, Copy)]
pub struct BrowserSessionStore;

#[cfg(target_arch = "wasm32")]
impl BrowserSessionStore {
    fn storage() -> Result<web_sys::Storage> {
        web_sys::window()
            .ok_or_else(|| Error::Storage("no window".into()))?
            .local_storage()
            .map_err(|_| Error::Storage("localStorage access denied".into()))?
            .ok_or_else(|| Error::Storage("localStorage unavailable".into()))
    }
}

#[cfg(target_arch = "wasm32")]
impl SessionStore for BrowserSessionStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Self::storage()?
            .get_item(key)
            .map_err(|_| Error::Storage(format!("failed to read {}", key)))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        Self::storage()?
            .set_item(key, value)
            .map_err(|_| Error::Storage(format!("failed to write {}", key)))
    }

    fn remove(&self, key: &str) -> Result<()> {
        Self::storage()?
            .remove_item(key)
            .map_err(|_| Error::Storage(format!("failed to remove {}", key)))
    }
}

/// Owns the current session and keeps the stored record in step
pub struct SessionManager<S> {
    store: S,
    current: RwLock<Option<Session>>,
}

impl<S: SessionStore> SessionManager<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            current: RwLock::new(None),
        }
    }

    pub fn current(&self) -> Option<Session> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn token(&self) -> Option<String> {
        self.current().and_then(|session| session.token)
    }

    fn replace(&self, session: Option<Session>) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = session;
    }

    fn persist(&self, session: Session) -> Result<Session> {
        let raw = serde_json::to_string(&session)?;
        self.store.set(USER_KEY, &raw)?;
        self.replace(Some(session.clone()));
        Ok(session)
    }

    /// Restore the stored session. Unreadable or incomplete records are
    /// removed and the user starts signed out.
    pub fn bootstrap(&self) -> Result<Option<Session>> {
        let Some(raw) = self.store.get(USER_KEY)? else {
            self.replace(None);
            return Ok(None);
        };
        match serde_json::from_str::<Session>(&raw) {
            Ok(session) if session.is_complete() => {
                tracing::debug!(uid = %session.uid, role = ?session.role, "session restored");
                self.replace(Some(session.clone()));
                Ok(Some(session))
            }
            Ok(_) => {
                tracing::info!("stored session incomplete; signing out");
                self.logout()?;
                Ok(None)
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to parse stored session; signing out");
                self.logout()?;
                Ok(None)
            }
        }
    }

    pub fn login(&self, session: Session) -> Result<Session> {
        if !session.is_complete() {
            return Err(Error::Validation("session needs uid and email".into()));
        }
        tracing::info!(uid = %session.uid, "signed in");
        self.persist(session)
    }

    pub fn logout(&self) -> Result<()> {
        self.store.remove(USER_KEY)?;
        self.store.remove(BACKGROUND_KEY)?;
        self.replace(None);
        Ok(())
    }

    /// Store a refreshed token pair
    pub fn update_tokens(&self, token: &str, refresh_token: &str) -> Result<Session> {
        let mut session = self.current().ok_or(Error::NotSignedIn)?;
        session.token = Some(token.to_string());
        session.refresh_token = Some(refresh_token.to_string());
        self.persist(session)
    }

    /// Apply user-editable fields; `None` leaves a field as is
    pub fn update_profile(&self, nickname: Option<&str>, background_color: Option<&str>) -> Result<Session> {
        let mut session = self.current().ok_or(Error::NotSignedIn)?;
        if let Some(nickname) = nickname {
            session.nickname = Some(nickname.to_string());
        }
        if let Some(color) = background_color {
            session.background_color = Some(color.to_string());
        }
        self.persist(session)
    }
}
