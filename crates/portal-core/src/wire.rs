// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! JSON bodies exchanged with the auth endpoints.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::{Permission, Principal, TokenPair};

// =============================================================================
// Envelopes
// =============================================================================

/// Success envelope: `{ "success": true, "data": ... }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiEnvelope<T> {
    /// Always `true` for this envelope.
    pub success: bool,
    /// Payload.
    pub data: T,
}

impl<T> ApiEnvelope<T> {
    /// Wraps a payload.
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

/// Failure envelope: `{ "success": false, "error": { "code", "message" } }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Always `false`.
    pub success: bool,
    /// Error details.
    pub error: ErrorPayload,
}

/// Machine-readable code plus a message safe to show end users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    /// Stable code, e.g. `UNAUTHORIZED`.
    pub code: String,
    /// Human-readable message.
    pub message: String,
}

impl ErrorBody {
    /// Creates a failure body.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: ErrorPayload {
                code: code.into(),
                message: message.into(),
            },
        }
    }
}

// =============================================================================
// Requests
// =============================================================================

/// `POST /auth/login` body.
#[derive(Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    /// Account email.
    pub email: String,
    /// Plain-text password.
    pub password: String,
}

impl std::fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginRequest")
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

/// `POST /auth/refresh-token` and `POST /auth/logout` body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    /// The refresh token to exchange or revoke.
    pub refresh_token: String,
}

// =============================================================================
// Responses
// =============================================================================

/// Cached user profile returned by login and kept in the client session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    /// User id.
    pub id: String,
    /// Email address.
    pub email: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Role names.
    #[serde(default)]
    pub roles: BTreeSet<String>,
    /// Permission strings.
    #[serde(default)]
    pub permissions: BTreeSet<Permission>,
}

impl UserProfile {
    /// Builds the profile view of a principal.
    pub fn from_principal(principal: &Principal) -> Self {
        Self {
            id: principal.subject_id.clone(),
            email: principal.email.clone().unwrap_or_default(),
            name: principal.name.clone().unwrap_or_default(),
            roles: principal.roles.clone(),
            permissions: principal.permissions.clone(),
        }
    }
}

/// `data` of a successful login.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginData {
    /// Issued tokens.
    #[serde(flatten)]
    pub tokens: TokenPair,
    /// Profile of the logged-in user.
    pub user: UserProfile,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_data_wire_format() {
        let principal = Principal::new("42")
            .with_email("ada@example.com")
            .with_name("Ada")
            .with_roles(["editor"])
            .with_permissions([Permission::parse("faqs:write").unwrap()]);
        let data = ApiEnvelope::ok(LoginData {
            tokens: TokenPair::new("a", "r"),
            user: UserProfile::from_principal(&principal),
        });

        let json = serde_json::to_value(&data).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["data"]["accessToken"], "a");
        assert_eq!(json["data"]["refreshToken"], "r");
        assert_eq!(json["data"]["user"]["id"], "42");
        assert_eq!(json["data"]["user"]["permissions"][0], "faqs:write");
    }

    #[test]
    fn test_login_request_debug_hides_password() {
        let req = LoginRequest {
            email: "a@b.c".into(),
            password: "hunter2".into(),
        };
        assert!(!format!("{:?}", req).contains("hunter2"));
    }

    #[test]
    fn test_error_body() {
        let body = ErrorBody::new("FORBIDDEN", "Access denied");
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["error"]["code"], "FORBIDDEN");
    }
}
