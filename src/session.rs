//! Session context: the authenticated identity, its bearer token, and the
//! credentials held in memory while a one-time code is outstanding.
//!
//! A single `SessionStore` is created at startup and shared by `Arc` with
//! everything that needs it (gateway, auth service, status monitor). State
//! changes are published on a `watch` channel so observers react to logins
//! and forced logouts without polling.

use sha2::{Digest, Sha256};
use std::fmt;
use std::io;
use std::sync::Mutex;
use tokio::sync::watch;

use crate::models::{LoginResponse, User, UserType};
use crate::storage::{KeyValueStore, TOKEN_KEY, USER_KEY};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    Anonymous,
    OtpPending { username: String },
    Authenticated(User),
}

/// username and password kept until the one-time code is submitted
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

pub struct SessionStore {
    storage: Box<dyn KeyValueStore>,
    state: watch::Sender<AuthState>,
    pending: Mutex<Option<Credentials>>,
}

impl SessionStore {
    /// open the store and rehydrate a previously persisted session
    pub fn open(storage: impl KeyValueStore + 'static) -> Self {
        let (state, _) = watch::channel(AuthState::Anonymous);
        let store = Self {
            storage: Box::new(storage),
            state,
            pending: Mutex::new(None),
        };
        store.restore();
        store
    }

    fn restore(&self) {
        let (Some(_token), Some(raw_user)) = (self.storage.get(TOKEN_KEY), self.storage.get(USER_KEY))
        else {
            tracing::debug!("No stored session found");
            return;
        };

        match serde_json::from_str::<User>(&raw_user) {
            Ok(user) => {
                tracing::info!("🔑 Restored session for {}", user.username);
                self.state.send_replace(AuthState::Authenticated(user));
            }
            Err(e) => {
                tracing::error!("Error parsing stored user, discarding session: {}", e);
                self.logout();
            }
        }
    }

    pub fn state(&self) -> AuthState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    /// bearer token as currently persisted
    pub fn token(&self) -> Option<String> {
        self.storage.get(TOKEN_KEY).filter(|token| !token.is_empty())
    }

    pub fn current_user(&self) -> Option<User> {
        match &*self.state.borrow() {
            AuthState::Authenticated(user) => Some(user.clone()),
            _ => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(&*self.state.borrow(), AuthState::Authenticated(_))
    }

    /// true when the signed-in user holds one of the allowed roles
    pub fn has_role(&self, allowed: &[UserType]) -> bool {
        self.current_user()
            .map(|user| allowed.contains(&user.user_type))
            .unwrap_or(false)
    }

    pub(crate) fn establish(&self, response: &LoginResponse) -> io::Result<User> {
        let user = User {
            username: response.username.clone(),
            user_type: response.user_type,
        };
        let raw_user = serde_json::to_string(&user)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        self.storage.set(TOKEN_KEY, &response.token)?;
        self.storage.set(USER_KEY, &raw_user)?;
        self.clear_pending();

        tracing::info!(
            "✅ Signed in as {} ({:?}, token {})",
            user.username,
            user.user_type,
            token_fingerprint(&response.token)
        );
        self.state.send_replace(AuthState::Authenticated(user.clone()));
        Ok(user)
    }

    pub(crate) fn await_otp(&self, credentials: Credentials) {
        tracing::info!("🔐 One-time code required for {}", credentials.username);
        let username = credentials.username.clone();
        if let Ok(mut pending) = self.pending.lock() {
            *pending = Some(credentials);
        }
        self.state.send_replace(AuthState::OtpPending { username });
    }

    pub(crate) fn pending_credentials(&self) -> Option<Credentials> {
        if !matches!(&*self.state.borrow(), AuthState::OtpPending { .. }) {
            return None;
        }
        self.pending.lock().ok().and_then(|pending| pending.clone())
    }

    fn clear_pending(&self) {
        if let Ok(mut pending) = self.pending.lock() {
            *pending = None;
        }
    }

    /// drop everything and return to anonymous, whatever the prior state
    pub fn logout(&self) {
        for key in [TOKEN_KEY, USER_KEY] {
            if let Err(e) = self.storage.remove(key) {
                tracing::warn!("Failed to remove session entry {}: {}", key, e);
            }
        }
        self.clear_pending();
        self.state.send_replace(AuthState::Anonymous);
        tracing::debug!("Session cleared");
    }

    /// the server rejected our token
    pub fn expire(&self) {
        if self.token().is_some() || !matches!(self.state(), AuthState::Anonymous) {
            tracing::warn!("🚫 Session rejected by server, signing out");
        }
        self.logout();
    }
}

/// short sha-256 prefix, safe to log in place of the token itself
pub fn token_fingerprint(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    let digest = hex::encode(hasher.finalize());
    digest[..12].to_string()
}
