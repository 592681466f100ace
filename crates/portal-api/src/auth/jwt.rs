// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! JWT token issuance and verification.

use std::sync::Arc;
use std::time::Duration;

use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use portal_core::{AuthError, AuthFailure, Principal, SharedClock, TokenKind, TokenPair};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::Claims;
use crate::error::{ApiError, ApiResult};

/// Upper bound on the access token lifetime.
///
/// Permissions are frozen into access tokens, so this is also the longest a
/// revoked role can stay effective.
pub const MAX_ACCESS_TTL_SECS: i64 = 3600;

const MIN_SECRET_LEN: usize = 32;

// =============================================================================
// JwtConfig
// =============================================================================

/// JWT configuration.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JwtConfig {
    /// Secret used to sign access tokens.
    #[serde(skip_serializing)]
    pub access_secret: String,
    /// Secret used to sign refresh tokens. Must differ from the access secret.
    #[serde(skip_serializing)]
    pub refresh_secret: String,
    /// Token issuer.
    pub issuer: String,
    /// Access token lifetime in seconds.
    pub access_ttl_secs: i64,
    /// Refresh token lifetime in seconds.
    pub refresh_ttl_secs: i64,
    /// Clock skew tolerance in seconds.
    pub leeway_secs: u64,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            access_secret: String::new(), // Must be set by user
            refresh_secret: String::new(),
            issuer: "portal".to_string(),
            access_ttl_secs: 15 * 60,
            refresh_ttl_secs: 7 * 86400,
            leeway_secs: 0,
        }
    }
}

impl JwtConfig {
    /// Creates a new configuration with the given secrets.
    pub fn new(access_secret: impl Into<String>, refresh_secret: impl Into<String>) -> Self {
        Self {
            access_secret: access_secret.into(),
            refresh_secret: refresh_secret.into(),
            ..Default::default()
        }
    }

    /// Sets the issuer.
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = issuer.into();
        self
    }

    /// Sets the access token lifetime.
    pub fn with_access_ttl(mut self, ttl: Duration) -> Self {
        self.access_ttl_secs = ttl.as_secs() as i64;
        self
    }

    /// Sets the refresh token lifetime.
    pub fn with_refresh_ttl(mut self, ttl: Duration) -> Self {
        self.refresh_ttl_secs = ttl.as_secs() as i64;
        self
    }

    /// Sets the clock skew tolerance.
    pub fn with_leeway(mut self, leeway: Duration) -> Self {
        self.leeway_secs = leeway.as_secs();
        self
    }

    /// Returns the secret for a token kind.
    pub fn secret(&self, kind: TokenKind) -> &str {
        match kind {
            TokenKind::Access => &self.access_secret,
            TokenKind::Refresh => &self.refresh_secret,
        }
    }

    /// Returns the lifetime for a token kind in seconds.
    pub fn ttl_secs(&self, kind: TokenKind) -> i64 {
        match kind {
            TokenKind::Access => self.access_ttl_secs,
            TokenKind::Refresh => self.refresh_ttl_secs,
        }
    }

    /// Validates the configuration.
    pub fn validate(&self) -> ApiResult<()> {
        for kind in [TokenKind::Access, TokenKind::Refresh] {
            let secret = self.secret(kind);
            if secret.is_empty() {
                return Err(ApiError::misconfigured(format!(
                    "JWT {} secret is not configured",
                    kind
                )));
            }
            if secret.len() < MIN_SECRET_LEN {
                tracing::warn!(
                    kind = %kind,
                    "JWT secret is shorter than recommended ({} bytes)",
                    MIN_SECRET_LEN
                );
            }
        }
        if self.access_secret == self.refresh_secret {
            return Err(ApiError::misconfigured(
                "JWT access and refresh secrets must differ",
            ));
        }
        if self.access_ttl_secs <= 0 || self.access_ttl_secs > MAX_ACCESS_TTL_SECS {
            return Err(ApiError::misconfigured(format!(
                "access_ttl_secs must be between 1 and {}",
                MAX_ACCESS_TTL_SECS
            )));
        }
        if self.refresh_ttl_secs < self.access_ttl_secs {
            return Err(ApiError::misconfigured(
                "refresh_ttl_secs must not be shorter than access_ttl_secs",
            ));
        }
        Ok(())
    }
}

impl std::fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtConfig")
            .field("access_secret", &redacted(&self.access_secret))
            .field("refresh_secret", &redacted(&self.refresh_secret))
            .field("issuer", &self.issuer)
            .field("access_ttl_secs", &self.access_ttl_secs)
            .field("refresh_ttl_secs", &self.refresh_ttl_secs)
            .field("leeway_secs", &self.leeway_secs)
            .finish()
    }
}

fn redacted(secret: &str) -> &'static str {
    if secret.is_empty() {
        "<unset>"
    } else {
        "<redacted>"
    }
}

// =============================================================================
// TokenError
// =============================================================================

/// Why a token could not be issued or verified.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    /// Signature valid, but the token is past its expiry.
    #[error("token has expired")]
    Expired,

    /// Signature does not match, or the token was issued elsewhere.
    #[error("token signature is invalid")]
    InvalidSignature,

    /// Token could not be decoded.
    #[error("token is malformed")]
    Malformed,

    /// Token is of the other kind.
    #[error("expected a {expected} token")]
    WrongKind {
        /// The kind the verifier was asked for.
        expected: TokenKind,
    },

    /// No secret configured for this kind.
    #[error("{kind} token secret is not configured")]
    MissingSecret {
        /// The kind that has no secret.
        kind: TokenKind,
    },

    /// Encoding failed.
    #[error("failed to sign token: {0}")]
    Signing(String),
}

impl TokenError {
    /// Returns `true` if a refresh may recover from this error.
    pub fn is_retryable(&self) -> bool {
        matches!(self, TokenError::Expired)
    }

    /// Returns the credential failure, or `None` for server-side faults.
    pub fn failure(&self) -> Option<AuthFailure> {
        match self {
            TokenError::Expired => Some(AuthFailure::Expired),
            TokenError::InvalidSignature => Some(AuthFailure::InvalidSignature),
            TokenError::Malformed => Some(AuthFailure::Malformed),
            TokenError::WrongKind { .. } => Some(AuthFailure::WrongKind),
            TokenError::MissingSecret { .. } | TokenError::Signing(_) => None,
        }
    }
}

impl From<TokenError> for AuthError {
    fn from(err: TokenError) -> Self {
        match err.failure() {
            Some(reason) => AuthError::unauthenticated(reason),
            None => AuthError::misconfigured(err.to_string()),
        }
    }
}

// =============================================================================
// Issued / Verified tokens
// =============================================================================

/// A freshly signed token together with its claims.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    /// Encoded JWT.
    pub token: String,
    /// The claims that were signed.
    pub claims: Claims,
}

/// A token that passed signature, kind and expiry checks.
#[derive(Debug, Clone)]
pub struct VerifiedToken {
    /// Decoded claims.
    pub claims: Claims,
    /// The identity the token stands for.
    pub principal: Principal,
}

impl VerifiedToken {
    /// Returns the token ID.
    pub fn jti(&self) -> &str {
        &self.claims.jti
    }

    /// Returns the subject.
    pub fn subject(&self) -> &str {
        &self.claims.sub
    }
}

// =============================================================================
// TokenService
// =============================================================================

struct KindKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl KindKeys {
    fn from_secret(secret: &str) -> Option<Self> {
        if secret.is_empty() {
            return None;
        }
        Some(Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        })
    }
}

/// Issues and verifies access and refresh tokens.
///
/// Construction never fails. A kind whose secret is empty is disabled and
/// every operation on it returns [`TokenError::MissingSecret`], which the
/// middleware turns into a 500 instead of letting the request through.
#[derive(Clone)]
pub struct TokenService {
    config: Arc<JwtConfig>,
    access: Option<Arc<KindKeys>>,
    refresh: Option<Arc<KindKeys>>,
    validation: Arc<Validation>,
    clock: SharedClock,
}

impl TokenService {
    /// Creates a token service.
    pub fn new(config: JwtConfig, clock: SharedClock) -> Self {
        for kind in [TokenKind::Access, TokenKind::Refresh] {
            let secret = config.secret(kind);
            if secret.is_empty() {
                tracing::error!(kind = %kind, "JWT secret is not configured; {} tokens are disabled", kind);
            } else if secret.len() < MIN_SECRET_LEN {
                tracing::warn!(kind = %kind, "JWT secret is shorter than recommended ({} bytes)", MIN_SECRET_LEN);
            }
        }

        let access = KindKeys::from_secret(&config.access_secret).map(Arc::new);
        let refresh = KindKeys::from_secret(&config.refresh_secret).map(Arc::new);

        // Expiry is checked against the injected clock at millisecond
        // precision, not by jsonwebtoken.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.leeway = 0;
        validation.set_issuer(&[&config.issuer]);
        validation.set_required_spec_claims(&["sub", "exp", "iat", "iss"]);

        Self {
            config: Arc::new(config),
            access,
            refresh,
            validation: Arc::new(validation),
            clock,
        }
    }

    fn keys(&self, kind: TokenKind) -> Result<&KindKeys, TokenError> {
        let keys = match kind {
            TokenKind::Access => self.access.as_deref(),
            TokenKind::Refresh => self.refresh.as_deref(),
        };
        keys.ok_or_else(|| {
            tracing::error!(kind = %kind, "Refusing token operation: secret is not configured");
            TokenError::MissingSecret { kind }
        })
    }

    /// Issues a token and returns it with its claims.
    pub fn issue_claims(&self, principal: &Principal, kind: TokenKind) -> Result<IssuedToken, TokenError> {
        let keys = self.keys(kind)?;
        let claims = Claims::for_principal(
            principal,
            kind,
            &self.config.issuer,
            self.clock.now_millis(),
            self.config.ttl_secs(kind),
        );

        let token = encode(&Header::new(Algorithm::HS256), &claims, &keys.encoding)
            .map_err(|e| TokenError::Signing(e.to_string()))?;

        Ok(IssuedToken { token, claims })
    }

    /// Issues a token of the given kind for a principal.
    pub fn issue(&self, principal: &Principal, kind: TokenKind) -> Result<String, TokenError> {
        self.issue_claims(principal, kind).map(|issued| issued.token)
    }

    /// Issues an access/refresh pair.
    pub fn issue_pair(&self, principal: &Principal) -> Result<TokenPair, TokenError> {
        Ok(TokenPair::new(
            self.issue(principal, TokenKind::Access)?,
            self.issue(principal, TokenKind::Refresh)?,
        ))
    }

    /// Verifies a token of the expected kind.
    pub fn verify(&self, token: &str, kind: TokenKind) -> Result<VerifiedToken, TokenError> {
        let keys = self.keys(kind)?;

        let claims = match decode::<Claims>(token, &keys.decoding, &self.validation) {
            Ok(data) => data.claims,
            Err(e) => return Err(self.classify(token, kind, e.kind())),
        };

        // Only reachable if both kinds share a secret.
        if claims.typ != kind {
            return Err(TokenError::WrongKind { expected: kind });
        }

        let leeway_ms = (self.config.leeway_secs as i64).saturating_mul(1000);
        let deadline_ms = claims.expires_at_millis().saturating_add(leeway_ms);
        if self.clock.now_millis() >= deadline_ms {
            return Err(TokenError::Expired);
        }

        let principal = claims.to_principal();
        Ok(VerifiedToken { claims, principal })
    }

    fn classify(&self, token: &str, kind: TokenKind, error: &ErrorKind) -> TokenError {
        match error {
            ErrorKind::InvalidSignature => {
                let other = match kind {
                    TokenKind::Access => self.refresh.as_deref(),
                    TokenKind::Refresh => self.access.as_deref(),
                };
                let signed_by_other = other
                    .map(|keys| decode::<Claims>(token, &keys.decoding, &self.validation).is_ok())
                    .unwrap_or(false);
                if signed_by_other {
                    TokenError::WrongKind { expected: kind }
                } else {
                    TokenError::InvalidSignature
                }
            }
            ErrorKind::InvalidIssuer | ErrorKind::InvalidAlgorithm => TokenError::InvalidSignature,
            _ => TokenError::Malformed,
        }
    }

    /// Returns the access token lifetime in seconds.
    pub fn access_ttl_secs(&self) -> i64 {
        self.config.access_ttl_secs
    }

    /// Returns the refresh token lifetime in seconds.
    pub fn refresh_ttl_secs(&self) -> i64 {
        self.config.refresh_ttl_secs
    }

    /// Returns `true` if both kinds have a secret.
    pub fn is_configured(&self) -> bool {
        self.access.is_some() && self.refresh.is_some()
    }

    /// Returns the clock used for issuance and expiry.
    pub fn clock(&self) -> &SharedClock {
        &self.clock
    }
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("issuer", &self.config.issuer)
            .field("access_ttl_secs", &self.config.access_ttl_secs)
            .field("refresh_ttl_secs", &self.config.refresh_ttl_secs)
            .field("configured", &self.is_configured())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
