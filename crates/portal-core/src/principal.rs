// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Verified identity.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::Permission;

/// Role that bypasses every permission check.
pub const SUPER_ADMIN_ROLE: &str = "super_admin";

/// Identity resolved from a verified token.
///
/// The permission set is fixed when the token is issued. Role changes made
/// afterwards only show up once the holder obtains a new access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    /// Opaque subject identifier (the user id).
    pub subject_id: String,
    /// Coarse-grained role names.
    #[serde(default)]
    pub roles: BTreeSet<String>,
    /// Fine-grained permissions.
    #[serde(default)]
    pub permissions: BTreeSet<Permission>,
    /// Email address, for display and audit only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Principal {
    /// Creates a principal with no roles or permissions.
    pub fn new(subject_id: impl Into<String>) -> Self {
        Self {
            subject_id: subject_id.into(),
            roles: BTreeSet::new(),
            permissions: BTreeSet::new(),
            email: None,
            name: None,
        }
    }

    /// Adds a role.
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.roles.insert(role.into());
        self
    }

    /// Replaces the role set.
    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles = roles.into_iter().map(Into::into).collect();
        self
    }

    /// Adds a permission.
    pub fn with_permission(mut self, permission: Permission) -> Self {
        self.permissions.insert(permission);
        self
    }

    /// Replaces the permission set.
    pub fn with_permissions(mut self, permissions: impl IntoIterator<Item = Permission>) -> Self {
        self.permissions = permissions.into_iter().collect();
        self
    }

    /// Sets the email.
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Sets the display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Returns `true` if the principal holds the given role.
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }

    /// Returns `true` if the principal was granted the permission explicitly.
    ///
    /// This does not consider the super-admin bypass; see
    /// [`Principal::is_super_admin`].
    pub fn has_permission(&self, permission: &Permission) -> bool {
        self.permissions.contains(permission)
    }

    /// Returns `true` if the principal carries the `super_admin` role.
    pub fn is_super_admin(&self) -> bool {
        self.has_role(SUPER_ADMIN_ROLE)
    }
}
