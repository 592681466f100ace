// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Test Builders
//!
//! Builder patterns for constructing test objects.

use std::collections::BTreeSet;

use chrono::Utc;
use portal_api::UserRecord;
use portal_core::Permission;

use super::fixtures::test_password_hash;

// =============================================================================
// UserBuilder
// =============================================================================

/// Builder for [`UserRecord`]s whose password is the shared test password.
///
/// ```rust,ignore
/// let user = UserBuilder::new("u-1", "a@example.com")
///     .role("viewer")
///     .grant("contacts:write")
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct UserBuilder {
    id: String,
    email: String,
    name: String,
    roles: BTreeSet<String>,
    grants: BTreeSet<Permission>,
    disabled: bool,
}

impl UserBuilder {
    /// Creates a builder for an enabled account with no roles.
    pub fn new(id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: email.into(),
            name: String::new(),
            roles: BTreeSet::new(),
            grants: BTreeSet::new(),
            disabled: false,
        }
    }

    /// Sets the display name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Adds a role.
    pub fn role(mut self, role: impl Into<String>) -> Self {
        self.roles.insert(role.into());
        self
    }

    /// Adds a direct grant. Panics on a malformed permission.
    pub fn grant(mut self, permission: &str) -> Self {
        self.grants
            .insert(Permission::parse(permission).expect("valid permission"));
        self
    }

    /// Marks the account as disabled.
    pub fn disabled(mut self) -> Self {
        self.disabled = true;
        self
    }

    /// Builds the record.
    pub fn build(self) -> UserRecord {
        UserRecord {
            id: self.id,
            email: self.email,
            name: self.name,
            password_hash: test_password_hash(),
            roles: self.roles,
            grants: self.grants,
            disabled: self.disabled,
            created_at: Utc::now(),
        }
    }
}
