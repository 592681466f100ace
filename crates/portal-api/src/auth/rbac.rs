// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Role-Based Access Control (RBAC).
//!
//! Roles are expanded into permissions once, when a token is issued. The
//! guard never consults this policy; it only sees the resulting set.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use portal_core::permission::RESOURCES;
use portal_core::{Permission, SUPER_ADMIN_ROLE};
use serde::{Deserialize, Serialize};

// =============================================================================
// Role
// =============================================================================

/// Predefined roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Bypasses every permission check.
    SuperAdmin,
    /// Full access to every resource.
    Admin,
    /// Edits site content.
    Editor,
    /// Read-only access.
    Viewer,
}

impl Role {
    /// All predefined roles.
    pub const ALL: [Role; 4] = [Role::SuperAdmin, Role::Admin, Role::Editor, Role::Viewer];

    /// Returns the role name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::SuperAdmin => SUPER_ADMIN_ROLE,
            Role::Admin => "admin",
            Role::Editor => "editor",
            Role::Viewer => "viewer",
        }
    }

    /// Returns the default permissions for this role.
    ///
    /// `SuperAdmin` maps to an empty set: its access comes from the explicit
    /// role check in the guard, never from permission expansion.
    pub fn default_permissions(&self) -> Vec<Permission> {
        let on = |resources: &[&str], actions: &[&str]| -> Vec<Permission> {
            resources
                .iter()
                .flat_map(|r| actions.iter().filter_map(move |a| Permission::new(r, a).ok()))
                .collect()
        };

        match self {
            Role::SuperAdmin => Vec::new(),
            Role::Admin => Permission::catalog(),
            Role::Editor => {
                let mut perms = on(
                    &["projects", "testimonials", "faqs", "team"],
                    &["read", "write", "delete"],
                );
                perms.extend(on(&["settings", "contacts", "analytics"], &["read"]));
                perms
            }
            Role::Viewer => {
                let readable: Vec<&str> = RESOURCES.iter().copied().filter(|r| *r != "users").collect();
                on(&readable, &["read"])
            }
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// RBAC Policy
// =============================================================================

/// Role to permission mapping.
///
/// Created once at startup and shared across all requests.
#[derive(Debug, Clone)]
pub struct RbacPolicy {
    role_permissions: Arc<HashMap<String, BTreeSet<Permission>>>,
    default_role: String,
}

impl RbacPolicy {
    /// Creates a policy with the predefined roles.
    pub fn new() -> Self {
        RbacPolicyBuilder::new().with_default_roles().build()
    }

    /// Creates a policy builder.
    pub fn builder() -> RbacPolicyBuilder {
        RbacPolicyBuilder::new()
    }

    /// Returns the permissions for a given role.
    pub fn permissions(&self, role: &str) -> Option<&BTreeSet<Permission>> {
        self.role_permissions.get(role)
    }

    /// Resolves the permission set for a user.
    ///
    /// Unknown roles contribute nothing. `extra` holds per-user grants.
    pub fn resolve<'a>(
        &self,
        roles: impl IntoIterator<Item = &'a String>,
        extra: impl IntoIterator<Item = &'a Permission>,
    ) -> BTreeSet<Permission> {
        let mut combined: BTreeSet<Permission> = extra.into_iter().cloned().collect();
        for role in roles {
            match self.role_permissions.get(role) {
                Some(perms) => combined.extend(perms.iter().cloned()),
                None if role == SUPER_ADMIN_ROLE => {}
                None => tracing::debug!(role = %role, "Ignoring unknown role"),
            }
        }
        combined
    }

    /// Returns the role given to self-registered users.
    pub fn default_role(&self) -> &str {
        &self.default_role
    }

    /// Returns all registered role names.
    pub fn roles(&self) -> Vec<&str> {
        self.role_permissions.keys().map(|s| s.as_str()).collect()
    }
}

impl Default for RbacPolicy {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// RBAC Policy Builder
// =============================================================================

/// Builder for constructing RBAC policies.
#[derive(Debug, Default)]
pub struct RbacPolicyBuilder {
    role_permissions: HashMap<String, BTreeSet<Permission>>,
    default_role: Option<String>,
}

impl RbacPolicyBuilder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the predefined roles with their standard permissions.
    pub fn with_default_roles(mut self) -> Self {
        for role in Role::ALL {
            self = self.add_role(role.as_str(), role.default_permissions());
        }
        self
    }

    /// Adds a role with specific permissions, replacing any previous entry.
    pub fn add_role(mut self, role: impl Into<String>, permissions: Vec<Permission>) -> Self {
        self.role_permissions
            .insert(role.into(), permissions.into_iter().collect());
        self
    }

    /// Adds permissions to an existing role.
    pub fn add_permissions(mut self, role: impl Into<String>, permissions: Vec<Permission>) -> Self {
        self.role_permissions
            .entry(role.into())
            .or_default()
            .extend(permissions);
        self
    }

    /// Sets the default role.
    pub fn default_role(mut self, role: impl Into<String>) -> Self {
        self.default_role = Some(role.into());
        self
    }

    /// Builds the policy.
    pub fn build(self) -> RbacPolicy {
        RbacPolicy {
            role_permissions: Arc::new(self.role_permissions),
            default_role: self
                .default_role
                .unwrap_or_else(|| Role::Viewer.as_str().to_string()),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
