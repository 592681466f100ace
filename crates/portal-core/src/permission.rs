// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Permission strings.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Resources managed through the admin backend.
pub const RESOURCES: &[&str] = &[
    "projects",
    "testimonials",
    "faqs",
    "settings",
    "team",
    "contacts",
    "analytics",
    "users",
];

/// Actions that can be granted on a resource.
pub const ACTIONS: &[&str] = &["read", "write", "delete"];

/// A fine-grained capability such as `contacts:read`.
///
/// Permissions are opaque to the guard: it only checks set membership. The
/// `resource:action` shape is enforced at parse time so that typos in role
/// definitions are caught when the policy is built, not when a request is
/// denied.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Permission(String);

/// Error returned when a permission string is not of the form `resource:action`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid permission '{0}': expected 'resource:action'")]
pub struct PermissionParseError(pub String);

impl Permission {
    /// Builds a permission from its two halves.
    pub fn new(resource: &str, action: &str) -> Result<Self, PermissionParseError> {
        Self::parse(&format!("{}:{}", resource, action))
    }

    /// Parses a `resource:action` string.
    pub fn parse(s: &str) -> Result<Self, PermissionParseError> {
        let valid_part = |part: &str| {
            !part.is_empty()
                && part
                    .chars()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
        };

        match s.split_once(':') {
            Some((resource, action)) if valid_part(resource) && valid_part(action) => {
                Ok(Self(s.to_string()))
            }
            _ => Err(PermissionParseError(s.to_string())),
        }
    }

    /// Returns the permission as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the resource half (`contacts` in `contacts:read`).
    pub fn resource(&self) -> &str {
        self.0.split_once(':').map(|(r, _)| r).unwrap_or(&self.0)
    }

    /// Returns the action half (`read` in `contacts:read`).
    pub fn action(&self) -> &str {
        self.0.split_once(':').map(|(_, a)| a).unwrap_or("")
    }

    /// Returns every `resource:action` combination of the built-in catalog.
    pub fn catalog() -> Vec<Permission> {
        RESOURCES
            .iter()
            .flat_map(|r| ACTIONS.iter().map(move |a| Permission(format!("{}:{}", r, a))))
            .collect()
    }

    /// Returns the read permission for every catalog resource.
    pub fn read_only_catalog() -> Vec<Permission> {
        RESOURCES
            .iter()
            .map(|r| Permission(format!("{}:read", r)))
            .collect()
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Permission {
    type Err = PermissionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Permission {
    type Error = PermissionParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Permission> for String {
    fn from(value: Permission) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid() {
        let p = Permission::parse("contacts:read").unwrap();
        assert_eq!(p.resource(), "contacts");
        assert_eq!(p.action(), "read");
        assert_eq!(p.to_string(), "contacts:read");
    }

    #[test]
    fn test_parse_invalid() {
        assert!(Permission::parse("contacts").is_err());
        assert!(Permission::parse(":read").is_err());
        assert!(Permission::parse("contacts:").is_err());
        assert!(Permission::parse("Contacts:Read").is_err());
        assert!(Permission::parse("contacts read").is_err());
    }

    #[test]
    fn test_catalog_size() {
        assert_eq!(Permission::catalog().len(), RESOURCES.len() * ACTIONS.len());
        assert!(Permission::read_only_catalog()
            .iter()
            .all(|p| p.action() == "read"));
    }

    #[test]
    fn test_serde_rejects_malformed() {
        let ok: Permission = serde_json::from_str("\"faqs:write\"").unwrap();
        assert_eq!(ok.as_str(), "faqs:write");
        assert!(serde_json::from_str::<Permission>("\"faqs\"").is_err());
    }
}
