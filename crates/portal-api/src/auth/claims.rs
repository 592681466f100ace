// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! JWT claims structure.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use portal_core::{Permission, Principal, TokenKind};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// JWT claims carried by both token kinds.
///
/// Refresh tokens only carry the subject and the registered claims; the
/// role and permission sets are re-derived from the user store when a
/// refresh token is exchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    // =========================================================================
    // Registered Claims (RFC 7519)
    // =========================================================================
    /// Subject - the user ID.
    pub sub: String,

    /// Issued at (Unix seconds).
    pub iat: i64,

    /// Expiration time (Unix seconds, rounded up).
    pub exp: i64,

    /// Expiration time in Unix milliseconds. Takes precedence over `exp`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp_ms: Option<i64>,

    /// JWT ID.
    pub jti: String,

    /// Issuer.
    pub iss: String,

    // =========================================================================
    // Custom Claims
    // =========================================================================
    /// Token kind.
    pub typ: TokenKind,

    /// User roles.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub roles: BTreeSet<String>,

    /// Permissions resolved at issue time.
    ///
    /// Entries that are not `resource:action` strings are dropped on decode
    /// instead of invalidating the token.
    #[serde(
        default,
        deserialize_with = "known_permissions",
        skip_serializing_if = "BTreeSet::is_empty"
    )]
    pub permissions: BTreeSet<Permission>,

    /// User's email.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// User's display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Claims {
    /// Builds claims for a principal issued at `issued_ms`.
    ///
    /// The token stays valid for exactly `ttl_secs` from that instant.
    pub fn for_principal(
        principal: &Principal,
        kind: TokenKind,
        issuer: &str,
        issued_ms: i64,
        ttl_secs: i64,
    ) -> Self {
        let exp_ms = issued_ms.saturating_add(ttl_secs.saturating_mul(1000));

        let (roles, permissions, email, name) = match kind {
            TokenKind::Access => (
                principal.roles.clone(),
                principal.permissions.clone(),
                principal.email.clone(),
                principal.name.clone(),
            ),
            TokenKind::Refresh => (BTreeSet::new(), BTreeSet::new(), None, None),
        };

        Self {
            sub: principal.subject_id.clone(),
            iat: issued_ms.div_euclid(1000),
            exp: exp_ms.div_euclid(1000) + i64::from(exp_ms.rem_euclid(1000) != 0),
            exp_ms: Some(exp_ms),
            jti: Uuid::now_v7().to_string(),
            iss: issuer.to_string(),
            typ: kind,
            roles,
            permissions,
            email,
            name,
        }
    }

    /// Returns the principal encoded in these claims.
    pub fn to_principal(&self) -> Principal {
        Principal {
            subject_id: self.sub.clone(),
            roles: self.roles.clone(),
            permissions: self.permissions.clone(),
            email: self.email.clone(),
            name: self.name.clone(),
        }
    }

    /// Returns the instant the token stops being valid, in Unix milliseconds.
    pub fn expires_at_millis(&self) -> i64 {
        self.exp_ms.unwrap_or_else(|| self.exp.saturating_mul(1000))
    }

    /// Returns the expiration time as a DateTime.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.expires_at_millis())
    }

    /// Returns the issued at time as a DateTime.
    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.iat, 0)
    }
}

fn known_permissions<'de, D>(deserializer: D) -> Result<BTreeSet<Permission>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Vec::<String>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .filter_map(|entry| match Permission::parse(&entry) {
            Ok(permission) => Some(permission),
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring unrecognised permission in token");
                None
            }
        })
        .collect())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn principal() -> Principal {
        Principal::new("user123")
            .with_role("editor")
            .with_permission(Permission::parse("faqs:write").unwrap())
            .with_email("ed@example.com")
    }

    #[test]
    fn test_access_claims_carry_principal() {
        let claims =
            Claims::for_principal(&principal(), TokenKind::Access, "portal", 1_000_000, 900);

        assert_eq!(claims.iat, 1_000);
        assert_eq!(claims.exp, 1_900);
        assert_eq!(claims.expires_at_millis(), 1_900_000);
        assert_eq!(claims.typ, TokenKind::Access);
        assert_eq!(claims.to_principal(), principal());
    }

    #[test]
    fn test_refresh_claims_are_minimal() {
        let claims =
            Claims::for_principal(&principal(), TokenKind::Refresh, "portal", 1_000_000, 60);

        assert_eq!(claims.sub, "user123");
        assert!(claims.roles.is_empty());
        assert!(claims.permissions.is_empty());
        assert!(claims.email.is_none());

        let json = serde_json::to_value(&claims).unwrap();
        assert_eq!(json["typ"], "refresh");
        assert!(json.get("roles").is_none());
    }

    #[test]
    fn test_mid_second_issue_rounds_exp_up() {
        let claims =
            Claims::for_principal(&principal(), TokenKind::Access, "portal", 1_000_250, 900);

        assert_eq!(claims.iat, 1_000);
        assert_eq!(claims.exp, 1_901);
        assert_eq!(claims.expires_at_millis(), 1_900_250);
    }

    #[test]
    fn test_exp_seconds_used_without_millis() {
        let mut claims =
            Claims::for_principal(&principal(), TokenKind::Access, "portal", 1_000_000, 900);
        claims.exp_ms = None;
        assert_eq!(claims.expires_at_millis(), 1_900_000);
    }

    #[test]
    fn test_unrecognised_permissions_are_dropped() {
        let json = serde_json::json!({
            "sub": "user123",
            "iat": 1_000,
            "exp": 1_900,
            "jti": "j1",
            "iss": "portal",
            "typ": "access",
            "permissions": ["faqs:read", "Reports.View", ""],
        });

        let claims: Claims = serde_json::from_value(json).unwrap();
        let expected: BTreeSet<Permission> = [Permission::parse("faqs:read").unwrap()].into();
        assert_eq!(claims.permissions, expected);
        assert_eq!(claims.exp_ms, None);
    }

    #[test]
    fn test_unique_jti() {
        let a = Claims::for_principal(&principal(), TokenKind::Access, "portal", 0, 1);
        let b = Claims::for_principal(&principal(), TokenKind::Access, "portal", 0, 1);
        assert_ne!(a.jti, b.jti);
    }
}
