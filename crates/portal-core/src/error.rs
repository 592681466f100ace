// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Authentication and authorization failure taxonomy.

use std::fmt;

use thiserror::Error;

use crate::Permission;

/// Result type alias for auth operations.
pub type AuthResult<T> = Result<T, AuthError>;

/// Why a credential was not accepted.
///
/// This is detail for server-side logs. It is never sent to clients, which
/// only ever see a generic "invalid token" message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    /// No `Authorization: Bearer` header.
    MissingCredential,
    /// Token was well formed and signed but past its expiry.
    Expired,
    /// Signature did not match.
    InvalidSignature,
    /// Token could not be decoded.
    Malformed,
    /// Token of the other kind (refresh presented as access or vice versa).
    WrongKind,
    /// The token or the account it names has been revoked.
    Revoked,
    /// Email/password did not match.
    BadCredentials,
}

impl AuthFailure {
    /// Returns a short identifier for logging.
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthFailure::MissingCredential => "missing_credential",
            AuthFailure::Expired => "expired",
            AuthFailure::InvalidSignature => "invalid_signature",
            AuthFailure::Malformed => "malformed",
            AuthFailure::WrongKind => "wrong_kind",
            AuthFailure::Revoked => "revoked",
            AuthFailure::BadCredentials => "bad_credentials",
        }
    }

    /// Returns `true` if a refresh may recover from this failure.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AuthFailure::Expired)
    }
}

impl fmt::Display for AuthFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Top-level auth error.
#[derive(Debug, Clone, Error)]
pub enum AuthError {
    /// No, invalid or expired credential (401).
    #[error("unauthenticated: {reason}")]
    Unauthenticated {
        /// Detailed reason, for logs only.
        reason: AuthFailure,
    },

    /// Valid credential, insufficient permission (403).
    #[error("forbidden: missing permission {permission}")]
    Forbidden {
        /// The permission that was required.
        permission: Permission,
    },

    /// Missing signing secret or middleware ordering bug (500). Always fails
    /// closed.
    #[error("server misconfiguration: {detail}")]
    ServerMisconfiguration {
        /// What is misconfigured.
        detail: String,
    },

    /// Network or storage error unrelated to auth (500).
    #[error("upstream failure: {detail}")]
    UpstreamFailure {
        /// Underlying error text.
        detail: String,
    },
}

impl AuthError {
    /// Creates an unauthenticated error.
    pub fn unauthenticated(reason: AuthFailure) -> Self {
        Self::Unauthenticated { reason }
    }

    /// Creates a forbidden error.
    pub fn forbidden(permission: Permission) -> Self {
        Self::Forbidden { permission }
    }

    /// Creates a misconfiguration error.
    pub fn misconfigured(detail: impl Into<String>) -> Self {
        Self::ServerMisconfiguration {
            detail: detail.into(),
        }
    }

    /// Creates an upstream failure.
    pub fn upstream(detail: impl Into<String>) -> Self {
        Self::UpstreamFailure {
            detail: detail.into(),
        }
    }

    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            AuthError::Unauthenticated { .. } => 401,
            AuthError::Forbidden { .. } => 403,
            AuthError::ServerMisconfiguration { .. } | AuthError::UpstreamFailure { .. } => 500,
        }
    }

    /// Returns the message that may be shown to clients.
    pub fn public_message(&self) -> &'static str {
        match self {
            AuthError::Unauthenticated {
                reason: AuthFailure::MissingCredential,
            } => "Authentication required",
            AuthError::Unauthenticated {
                reason: AuthFailure::BadCredentials,
            } => "Invalid email or password",
            AuthError::Unauthenticated { .. } => "Invalid or expired token",
            AuthError::Forbidden { .. } => "Insufficient permissions",
            AuthError::ServerMisconfiguration { .. } | AuthError::UpstreamFailure { .. } => {
                "Internal server error"
            }
        }
    }
}
