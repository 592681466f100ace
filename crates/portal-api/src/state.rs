// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Application state shared across handlers.

use std::sync::Arc;

use portal_core::{Principal, SharedClock, SystemClock, TokenKind, TokenPair};

use crate::auth::{RbacPolicy, RefreshRegistry, TokenService};
use crate::config::ApiConfig;
use crate::error::ApiResult;
use crate::users::{InMemoryUserStore, UserRecord, UserStore};

// =============================================================================
// AppState
// =============================================================================

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// API configuration.
    pub config: Arc<ApiConfig>,
    /// Token issuer and verifier.
    pub tokens: Arc<TokenService>,
    /// Role to permission mapping.
    pub rbac: Arc<RbacPolicy>,
    /// User accounts.
    pub users: Arc<dyn UserStore>,
    /// Issued refresh tokens.
    pub refresh: Arc<RefreshRegistry>,
    /// Time source shared by tokens and the refresh registry.
    pub clock: SharedClock,
}

impl AppState {
    /// Creates a new app state builder.
    pub fn builder() -> AppStateBuilder {
        AppStateBuilder::new()
    }

    /// Resolves the principal for a user under the current policy.
    pub fn principal_for(&self, user: &UserRecord) -> Principal {
        user.to_principal(&self.rbac)
    }

    /// Issues an access/refresh pair and registers the refresh token.
    pub fn issue_session(&self, principal: &Principal) -> ApiResult<TokenPair> {
        let access = self.tokens.issue_claims(principal, TokenKind::Access)?;
        let refresh = self.tokens.issue_claims(principal, TokenKind::Refresh)?;

        self.refresh.register(
            refresh.claims.jti.clone(),
            principal.subject_id.clone(),
            refresh.claims.exp,
        );

        Ok(TokenPair::new(access.token, refresh.token))
    }
}

// =============================================================================
// AppStateBuilder
// =============================================================================

/// Builder for constructing AppState.
#[derive(Default)]
pub struct AppStateBuilder {
    config: Option<ApiConfig>,
    clock: Option<SharedClock>,
    rbac: Option<Arc<RbacPolicy>>,
    users: Option<Arc<dyn UserStore>>,
}

impl AppStateBuilder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the configuration.
    pub fn config(mut self, config: ApiConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Sets the clock. Defaults to the system clock.
    pub fn clock(mut self, clock: SharedClock) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Sets the RBAC policy. Defaults to the built-in roles.
    pub fn rbac_policy(mut self, policy: Arc<RbacPolicy>) -> Self {
        self.rbac = Some(policy);
        self
    }

    /// Sets the user store.
    ///
    /// Defaults to an in-memory store seeded with the bootstrap admin, if
    /// one is configured.
    pub fn user_store(mut self, users: Arc<dyn UserStore>) -> Self {
        self.users = Some(users);
        self
    }

    /// Builds the AppState.
    pub fn build(self) -> ApiResult<AppState> {
        let config = self.config.unwrap_or_default();
        let clock = self.clock.unwrap_or_else(SystemClock::shared);

        let users: Arc<dyn UserStore> = match (self.users, &config.bootstrap_admin) {
            (Some(users), _) => users,
            (None, Some(admin)) => Arc::new(InMemoryUserStore::with_bootstrap(admin)?),
            (None, None) => Arc::new(InMemoryUserStore::new()),
        };

        let tokens = Arc::new(TokenService::new(config.jwt.clone(), clock.clone()));
        let refresh = Arc::new(RefreshRegistry::with_reuse_grace(
            clock.clone(),
            config.refresh_reuse_grace,
        ));

        Ok(AppState {
            config: Arc::new(config),
            tokens,
            rbac: self.rbac.unwrap_or_else(|| Arc::new(RbacPolicy::new())),
            users,
            refresh,
            clock,
        })
    }
}

// =============================================================================
// FromRef implementations for extracting parts of state
// =============================================================================

impl axum::extract::FromRef<AppState> for Arc<TokenService> {
    fn from_ref(state: &AppState) -> Self {
        state.tokens.clone()
    }
}

impl axum::extract::FromRef<AppState> for Arc<RbacPolicy> {
    fn from_ref(state: &AppState) -> Self {
        state.rbac.clone()
    }
}

impl axum::extract::FromRef<AppState> for Arc<ApiConfig> {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

// =============================================================================
// Tests
// =============================================================================
