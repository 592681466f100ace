// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Client session state.

use std::sync::Arc;

use parking_lot::Mutex;
use portal_core::{TokenPair, UserProfile};
use tokio::sync::watch;

use crate::storage::{SessionStorage, ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, USER_KEY};

/// Whether the client holds a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No tokens stored.
    Anonymous,
    /// Tokens stored.
    Authenticated,
}

/// The session kept in [`SessionStorage`], with change notification.
///
/// A silent token refresh rewrites the tokens but does not notify
/// subscribers; only login, logout and expiry change [`SessionState`].
pub struct SessionStore {
    storage: Arc<dyn SessionStorage>,
    state: watch::Sender<SessionState>,
    // Serializes multi-key writes.
    write: Mutex<()>,
}

impl SessionStore {
    /// Creates a store, resuming any session already in storage.
    pub fn new(storage: Arc<dyn SessionStorage>) -> Self {
        let initial = if storage.get(ACCESS_TOKEN_KEY).is_some() {
            SessionState::Authenticated
        } else {
            SessionState::Anonymous
        };
        let (state, _) = watch::channel(initial);
        Self {
            storage,
            state,
            write: Mutex::new(()),
        }
    }

    /// Returns the current state.
    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Subscribes to state transitions.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Returns the stored access token.
    pub fn access_token(&self) -> Option<String> {
        self.storage.get(ACCESS_TOKEN_KEY)
    }

    /// Returns the stored refresh token.
    pub fn refresh_token(&self) -> Option<String> {
        self.storage.get(REFRESH_TOKEN_KEY)
    }

    /// Returns the cached user profile.
    pub fn user(&self) -> Option<UserProfile> {
        let raw = self.storage.get(USER_KEY)?;
        match serde_json::from_str(&raw) {
            Ok(user) => Some(user),
            Err(e) => {
                tracing::warn!(error = %e, "Discarding unreadable cached user profile");
                None
            }
        }
    }

    /// Stores a fresh session after login.
    pub fn establish(&self, tokens: &TokenPair, user: &UserProfile) {
        let _guard = self.write.lock();
        self.write_tokens(tokens);
        match serde_json::to_string(user) {
            Ok(json) => self.storage.set(USER_KEY, &json),
            Err(e) => tracing::warn!(error = %e, "Failed to cache user profile"),
        }
        if self.storage.is_available() {
            self.state.send_replace(SessionState::Authenticated);
        }
    }

    /// Replaces the tokens after a refresh, without a state transition.
    pub fn update_tokens(&self, tokens: &TokenPair) {
        let _guard = self.write.lock();
        self.write_tokens(tokens);
    }

    /// Removes tokens and profile. Returns `true` if a session existed.
    pub fn clear(&self) -> bool {
        let _guard = self.write.lock();
        let had_session = self.storage.get(ACCESS_TOKEN_KEY).is_some()
            || self.storage.get(REFRESH_TOKEN_KEY).is_some();

        for key in [ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, USER_KEY] {
            self.storage.remove(key);
        }
        self.state.send_if_modified(|state| {
            let changed = *state != SessionState::Anonymous;
            *state = SessionState::Anonymous;
            changed
        });
        had_session
    }

    fn write_tokens(&self, tokens: &TokenPair) {
        self.storage.set(ACCESS_TOKEN_KEY, &tokens.access_token);
        self.storage.set(REFRESH_TOKEN_KEY, &tokens.refresh_token);
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("state", &self.state())
            .field("storage_available", &self.storage.is_available())
            .finish()
    }
}
