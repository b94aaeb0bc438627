use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use super::principal::Profile;
use crate::tprintln;

fn default_token_type() -> String { "bearer".to_string() }

/// Persisted session fields. The serde names mirror the keys the legacy
/// client kept in browser storage, so a state file survives the rewrite.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionState {
    #[serde(rename = "jwt_token", default)]
    pub token: Option<String>,
    #[serde(rename = "token_type", default = "default_token_type")]
    pub token_type: String,
    #[serde(rename = "userRole", default)]
    pub role: Option<String>,
    #[serde(rename = "userFullName", default)]
    pub full_name: Option<String>,
    #[serde(rename = "userUsername", default)]
    pub username: Option<String>,
    #[serde(rename = "userEmail", default)]
    pub email: Option<String>,
    #[serde(rename = "userLastLogin", default)]
    pub last_login: Option<String>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            token: None,
            token_type: default_token_type(),
            role: None,
            full_name: None,
            username: None,
            email: None,
            last_login: None,
        }
    }
}

/// Explicit session-context object: one per client, hydrated from a JSON
/// state file at startup and rewritten on every mutation. Cheap to clone;
/// clones share the same state.
#[derive(Debug, Clone)]
pub struct SessionStore {
    inner: Arc<RwLock<SessionState>>,
    path: Option<PathBuf>,
}

impl SessionStore {
    /// Load the persisted session, if any. A missing or unreadable state file
    /// yields a clean logged-out store rather than an error.
    pub fn hydrate(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let state = match std::fs::read_to_string(&path) {
            Ok(text) => match serde_json::from_str::<SessionState>(&text) {
                Ok(s) => s,
                Err(e) => {
                    tracing::warn!("session state file unreadable, starting logged out: {}", e);
                    SessionState::default()
                }
            },
            Err(_) => SessionState::default(),
        };
        Self { inner: Arc::new(RwLock::new(state)), path: Some(path) }
    }

    /// In-memory store with no backing file.
    pub fn in_memory() -> Self {
        Self { inner: Arc::new(RwLock::new(SessionState::default())), path: None }
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.read().token.is_some()
    }

    pub fn token(&self) -> Option<String> {
        self.inner.read().token.clone()
    }

    pub fn role(&self) -> Option<String> {
        self.inner.read().role.clone()
    }

    pub fn full_name(&self) -> Option<String> {
        self.inner.read().full_name.clone()
    }

    pub fn state(&self) -> SessionState {
        self.inner.read().clone()
    }

    pub fn profile(&self) -> Profile {
        let s = self.inner.read();
        Profile {
            username: s.username.clone(),
            email: s.email.clone(),
            last_login: s.last_login.clone(),
        }
    }

    /// `Authorization` header value when a token is present. The scheme is
    /// normalized to `Bearer` for the common lowercase token type.
    pub fn auth_header(&self) -> Option<String> {
        let s = self.inner.read();
        let token = s.token.as_ref()?;
        let scheme = if s.token_type.eq_ignore_ascii_case("bearer") { "Bearer" } else { s.token_type.as_str() };
        Some(format!("{} {}", scheme, token))
    }

    /// Record a successful login. Token and token type land together; there is
    /// no partial state.
    pub fn store_login(&self, token: &str, token_type: &str) {
        let snapshot = {
            let mut s = self.inner.write();
            s.token = Some(token.to_string());
            s.token_type = if token_type.is_empty() { default_token_type() } else { token_type.to_string() };
            s.clone()
        };
        tprintln!("session.login token_type={}", snapshot.token_type);
        self.persist(&snapshot);
    }

    /// Cache role and display name from a current-user response. A stale
    /// response overwrites; no caller depends on response ordering.
    pub fn cache_identity(&self, role: Option<&str>, full_name: Option<&str>) {
        let snapshot = {
            let mut s = self.inner.write();
            if let Some(r) = role { s.role = Some(r.to_string()); }
            if let Some(n) = full_name { s.full_name = Some(n.to_string()); }
            s.clone()
        };
        self.persist(&snapshot);
    }

    /// Profile-screen fields.
    pub fn set_profile(&self, username: Option<&str>, email: Option<&str>, last_login: Option<&str>) {
        let snapshot = {
            let mut s = self.inner.write();
            if let Some(u) = username { s.username = Some(u.to_string()); }
            if let Some(e) = email { s.email = Some(e.to_string()); }
            if let Some(l) = last_login { s.last_login = Some(l.to_string()); }
            s.clone()
        };
        self.persist(&snapshot);
    }

    /// Drop every session field and rewrite the state file. Idempotent; safe
    /// to call when already logged out.
    pub fn clear(&self) {
        let snapshot = {
            let mut s = self.inner.write();
            *s = SessionState::default();
            s.clone()
        };
        tprintln!("session.clear");
        self.persist(&snapshot);
    }

    fn persist(&self, state: &SessionState) {
        let Some(path) = &self.path else { return };
        match serde_json::to_string_pretty(state) {
            Ok(text) => {
                if let Err(e) = std::fs::write(path, text) {
                    tracing::warn!("failed to persist session state to {}: {}", path.display(), e);
                }
            }
            Err(e) => tracing::warn!("failed to serialize session state: {}", e),
        }
    }
}
