//! crates/social_feed_core/src/session.rs
//!
//! Owns the authenticated identity and its bearer credential.
//!
//! The manager is a two-state machine (`Anonymous` / `Authenticated`). The
//! credential and the user record are persisted as two separate entries and
//! are always written and removed together; a half-persisted session found at
//! startup is discarded.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{info, warn};

use crate::domain::{Credential, Registration, Session, User};
use crate::ports::{Failure, FeedBackend, Outcome};
use crate::storage::StorageGuard;

/// Storage key of the raw credential string.
pub const TOKEN_KEY: &str = "token";
/// Storage key of the JSON user record.
pub const USER_KEY: &str = "user";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    Anonymous,
    Authenticated(Session),
}

pub struct SessionManager {
    backend: Arc<dyn FeedBackend>,
    storage: StorageGuard,
    state: RwLock<AuthState>,
    loading: AtomicBool,
}

impl SessionManager {
    /// Creates a manager in the `Anonymous` state with `loading` set.
    /// Call [`initialize`](Self::initialize) before reading the state.
    pub fn new(backend: Arc<dyn FeedBackend>, storage: StorageGuard) -> Self {
        Self {
            backend,
            storage,
            state: RwLock::new(AuthState::Anonymous),
            loading: AtomicBool::new(true),
        }
    }

    fn read_state(&self) -> RwLockReadGuard<'_, AuthState> {
        self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, AuthState> {
        self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Restores a persisted session. Returns whether the manager ended up
    /// authenticated.
    pub fn initialize(&self) -> bool {
        let token = self.storage.read_raw(TOKEN_KEY);
        let user = self.storage.read::<User>(USER_KEY);

        let next = match (token, user) {
            (Some(token), Some(user)) => {
                info!(username = %user.username, "Restored persisted session");
                AuthState::Authenticated(Session {
                    user,
                    credential: Credential::new(token),
                })
            }
            (Some(_), None) => {
                warn!("Discarding persisted credential without a user record");
                self.storage.remove(TOKEN_KEY);
                AuthState::Anonymous
            }
            (None, Some(_)) => {
                warn!("Discarding persisted user record without a credential");
                self.storage.remove(USER_KEY);
                AuthState::Anonymous
            }
            (None, None) => AuthState::Anonymous,
        };

        let authenticated = matches!(next, AuthState::Authenticated(_));
        *self.write_state() = next;
        self.loading.store(false, Ordering::SeqCst);
        authenticated
    }

    /// True until [`initialize`](Self::initialize) has run.
    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::SeqCst)
    }

    pub fn state(&self) -> AuthState {
        self.read_state().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(*self.read_state(), AuthState::Authenticated(_))
    }

    pub fn current_user(&self) -> Option<User> {
        match &*self.read_state() {
            AuthState::Authenticated(session) => Some(session.user.clone()),
            AuthState::Anonymous => None,
        }
    }

    /// The credential to pass into the next outgoing request, if any.
    pub fn credential(&self) -> Option<Credential> {
        match &*self.read_state() {
            AuthState::Authenticated(session) => Some(session.credential.clone()),
            AuthState::Anonymous => None,
        }
    }

    pub async fn login(&self, email: &str, password: &str) -> Outcome<User> {
        let session = match self.backend.login(email, password).await {
            Ok(session) => session,
            Err(e) => {
                warn!("Login failed: {}", e);
                return Err(Failure::new(e.user_message("Login failed")));
            }
        };

        if !self.persist(&session) {
            return Err(Failure::new("Login failed"));
        }

        info!(username = %session.user.username, "Signed in");
        let user = session.user.clone();
        *self.write_state() = AuthState::Authenticated(session);
        Ok(user)
    }

    /// Writes both records or neither.
    fn persist(&self, session: &Session) -> bool {
        if !self
            .storage
            .write_raw(TOKEN_KEY, session.credential.as_str())
        {
            return false;
        }
        if !self.storage.write(USER_KEY, &session.user) {
            warn!("Rolling back persisted credential after failed user write");
            self.storage.remove(TOKEN_KEY);
            return false;
        }
        true
    }

    /// Creates an account. Does not sign in.
    pub async fn register(&self, registration: &Registration) -> Outcome<serde_json::Value> {
        self.backend.register(registration).await.map_err(|e| {
            warn!("Registration failed: {}", e);
            Failure::new(e.user_message("Registration failed"))
        })
    }

    /// Clears both persisted records and returns to `Anonymous`. Idempotent.
    /// Requests already in flight keep the credential they were built with.
    ///
    /// Returns false when a persisted record could not be removed; the
    /// in-memory state is `Anonymous` either way, but the next start may
    /// restore the leftover session.
    pub fn logout(&self) -> bool {
        let token_removed = self.storage.remove(TOKEN_KEY);
        let user_removed = self.storage.remove(USER_KEY);
        let mut state = self.write_state();
        if let AuthState::Authenticated(session) = &*state {
            info!(username = %session.user.username, "Signed out");
        }
        *state = AuthState::Anonymous;

        if !(token_removed && user_removed) {
            warn!(token_removed, user_removed, "Persisted session survived logout");
            return false;
        }
        true
    }

    /// Mirrors a server-confirmed bio into the in-memory and persisted user.
    /// Returns false when there is no session to update.
    pub fn update_user_bio(&self, bio: &str) -> bool {
        let mut state = self.write_state();
        let AuthState::Authenticated(session) = &mut *state else {
            return false;
        };
        session.user.bio = Some(bio.to_string());
        self.storage.write(USER_KEY, &session.user)
    }
}
