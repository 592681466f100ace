// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! User accounts.
//!
//! Persistence is not part of this service; [`UserStore`] is the seam a
//! database-backed store plugs into. [`InMemoryUserStore`] backs tests and
//! single-node deployments seeded from configuration.

use std::collections::BTreeSet;

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use portal_core::{Permission, Principal};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::RbacPolicy;
use crate::config::BootstrapAdmin;
use crate::error::{ApiError, ApiResult};

// =============================================================================
// Records
// =============================================================================

/// A stored user account.
#[derive(Clone, Serialize, Deserialize)]
pub struct UserRecord {
    /// User ID.
    pub id: String,
    /// Normalized (trimmed, lowercase) email.
    pub email: String,
    /// Display name.
    pub name: String,
    /// Argon2 PHC string.
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// Assigned roles.
    pub roles: BTreeSet<String>,
    /// Per-user grants on top of the role permissions.
    #[serde(default)]
    pub grants: BTreeSet<Permission>,
    /// Disabled accounts cannot log in or refresh.
    #[serde(default)]
    pub disabled: bool,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl UserRecord {
    /// Builds the principal for this user under a policy.
    pub fn to_principal(&self, policy: &RbacPolicy) -> Principal {
        Principal::new(self.id.clone())
            .with_roles(self.roles.iter().cloned())
            .with_permissions(policy.resolve(&self.roles, &self.grants))
            .with_email(self.email.clone())
            .with_name(self.name.clone())
    }

    /// Checks a plain-text password against the stored hash.
    pub fn verify_password(&self, password: &str) -> bool {
        verify_password(password, &self.password_hash)
    }
}

impl std::fmt::Debug for UserRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserRecord")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("roles", &self.roles)
            .field("disabled", &self.disabled)
            .finish_non_exhaustive()
    }
}

/// Input for [`UserStore::create`].
#[derive(Clone)]
pub struct NewUser {
    /// Email address.
    pub email: String,
    /// Display name.
    pub name: String,
    /// Argon2 PHC string (see [`hash_password`]).
    pub password_hash: String,
    /// Assigned roles.
    pub roles: BTreeSet<String>,
}

// =============================================================================
// Password Hashing
// =============================================================================

/// Hashes a password with Argon2id and a random salt.
pub fn hash_password(password: &str) -> ApiResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ApiError::internal(format!("Failed to hash password: {}", e)))
}

/// Verifies a password against a PHC string. Malformed hashes never match.
pub fn verify_password(password: &str, phc: &str) -> bool {
    match PasswordHash::new(phc) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            tracing::warn!(error = %e, "Stored password hash is malformed");
            false
        }
    }
}

/// Normalizes an email for lookup.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

// =============================================================================
// UserStore
// =============================================================================

/// User persistence.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Looks a user up by email (case-insensitive).
    async fn find_by_email(&self, email: &str) -> ApiResult<Option<UserRecord>>;

    /// Looks a user up by ID.
    async fn find_by_id(&self, id: &str) -> ApiResult<Option<UserRecord>>;

    /// Creates a user. Fails with a conflict if the email is taken.
    async fn create(&self, user: NewUser) -> ApiResult<UserRecord>;

    /// Records that a password reset was requested.
    async fn record_password_reset(&self, user_id: &str) -> ApiResult<()>;
}

// =============================================================================
// InMemoryUserStore
// =============================================================================

/// [`UserStore`] kept in process memory.
#[derive(Debug, Default)]
pub struct InMemoryUserStore {
    users: DashMap<String, UserRecord>,
    ids_by_email: DashMap<String, String>,
    reset_requests: DashMap<String, Vec<DateTime<Utc>>>,
}

impl InMemoryUserStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store seeded with the bootstrap administrator.
    pub fn with_bootstrap(admin: &BootstrapAdmin) -> ApiResult<Self> {
        PasswordHash::new(&admin.password_hash).map_err(|e| {
            ApiError::misconfigured(format!("bootstrap admin password_hash is invalid: {}", e))
        })?;

        let store = Self::new();
        store.insert(UserRecord {
            id: Uuid::now_v7().to_string(),
            email: normalize_email(&admin.email),
            name: admin.name.clone(),
            password_hash: admin.password_hash.clone(),
            roles: admin.roles.iter().cloned().collect(),
            grants: BTreeSet::new(),
            disabled: false,
            created_at: Utc::now(),
        })?;
        tracing::info!(email = %admin.email, "Seeded bootstrap administrator");
        Ok(store)
    }

    /// Inserts a fully formed record.
    pub fn insert(&self, record: UserRecord) -> ApiResult<()> {
        let email = normalize_email(&record.email);
        match self.ids_by_email.entry(email) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                Err(ApiError::conflict("An account with this email already exists"))
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(record.id.clone());
                self.users.insert(record.id.clone(), record);
                Ok(())
            }
        }
    }

    /// Enables or disables an account. Returns `false` if the user is unknown.
    pub fn set_disabled(&self, user_id: &str, disabled: bool) -> bool {
        match self.users.get_mut(user_id) {
            Some(mut user) => {
                user.disabled = disabled;
                true
            }
            None => false,
        }
    }

    /// Replaces a user's roles. Returns `false` if the user is unknown.
    pub fn set_roles(&self, user_id: &str, roles: BTreeSet<String>) -> bool {
        match self.users.get_mut(user_id) {
            Some(mut user) => {
                user.roles = roles;
                true
            }
            None => false,
        }
    }

    /// Returns how many password resets were requested for a user.
    pub fn reset_request_count(&self, user_id: &str) -> usize {
        self.reset_requests
            .get(user_id)
            .map(|r| r.len())
            .unwrap_or(0)
    }

    /// Returns the number of users.
    pub fn len(&self) -> usize {
        self.users.len()
    }

    /// Returns `true` if there are no users.
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn find_by_email(&self, email: &str) -> ApiResult<Option<UserRecord>> {
        let id = match self.ids_by_email.get(&normalize_email(email)) {
            Some(id) => id.clone(),
            None => return Ok(None),
        };
        Ok(self.users.get(&id).map(|u| u.clone()))
    }

    async fn find_by_id(&self, id: &str) -> ApiResult<Option<UserRecord>> {
        Ok(self.users.get(id).map(|u| u.clone()))
    }

    async fn create(&self, user: NewUser) -> ApiResult<UserRecord> {
        let record = UserRecord {
            id: Uuid::now_v7().to_string(),
            email: normalize_email(&user.email),
            name: user.name,
            password_hash: user.password_hash,
            roles: user.roles,
            grants: BTreeSet::new(),
            disabled: false,
            created_at: Utc::now(),
        };
        self.insert(record.clone())?;
        Ok(record)
    }

    async fn record_password_reset(&self, user_id: &str) -> ApiResult<()> {
        self.reset_requests
            .entry(user_id.to_string())
            .or_default()
            .push(Utc::now());
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
