// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Authentication handlers.

use axum::{body::Bytes, extract::State, http::StatusCode, response::IntoResponse};
use portal_core::{AuthFailure, LoginData, LoginRequest, RefreshRequest, TokenKind, UserProfile};
use serde::Deserialize;

use crate::auth::RefreshRejection;
use crate::error::{ApiError, ApiResult};
use crate::extractors::{Auth, ClientIp, MaybeAuth, ValidatedJson};
use crate::response::{ApiResponse, AuthStatus};
use crate::state::AppState;
use crate::users::{hash_password, normalize_email, NewUser};

const MIN_PASSWORD_LEN: usize = 8;

// =============================================================================
// Login
// =============================================================================

/// POST /auth/login
///
/// Authenticates a user and returns a token pair with the user's profile.
/// Unknown email, wrong password and disabled account are indistinguishable
/// to the caller.
pub async fn login(
    State(state): State<AppState>,
    ClientIp(client_ip): ClientIp,
    ValidatedJson(request): ValidatedJson<LoginRequest>,
) -> ApiResult<impl IntoResponse> {
    if request.email.trim().is_empty() || request.password.is_empty() {
        return Err(ApiError::bad_request("Email and password are required"));
    }

    let email = normalize_email(&request.email);
    let user = match state.users.find_by_email(&email).await? {
        Some(user) if !user.disabled && user.verify_password(&request.password) => user,
        found => {
            tracing::warn!(
                target: "portal::audit",
                email = %email,
                client_ip = ?client_ip,
                known_user = found.is_some(),
                "Login failed"
            );
            return Err(ApiError::unauthorized(AuthFailure::BadCredentials));
        }
    };

    let principal = state.principal_for(&user);
    let tokens = state.issue_session(&principal)?;

    tracing::info!(
        target: "portal::audit",
        user_id = %user.id,
        client_ip = ?client_ip,
        "User logged in"
    );

    Ok(ApiResponse::success(LoginData {
        tokens,
        user: UserProfile::from_principal(&principal),
    }))
}

// =============================================================================
// Refresh Token
// =============================================================================

/// POST /auth/refresh-token
///
/// Exchanges a refresh token for a new pair. The user is re-read so role
/// and status changes apply from this point on.
pub async fn refresh_token(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<RefreshRequest>,
) -> ApiResult<impl IntoResponse> {
    let verified = state
        .tokens
        .verify(&request.refresh_token, TokenKind::Refresh)
        .map_err(|e| {
            tracing::debug!(target: "portal::audit", reason = %e, "Refresh token rejected");
            ApiError::from(e)
        })?;

    if let Err(rejection) = state.refresh.rotate(verified.jti()) {
        if rejection == RefreshRejection::Reused {
            // Replay outside the grace window: end every session of the user.
            let revoked = state.refresh.revoke_subject(verified.subject());
            tracing::warn!(
                target: "portal::audit",
                user_id = %verified.subject(),
                revoked = revoked,
                "Refresh token replayed; sessions revoked"
            );
        } else {
            tracing::debug!(
                target: "portal::audit",
                user_id = %verified.subject(),
                reason = %rejection,
                "Refresh token rejected"
            );
        }
        return Err(ApiError::unauthorized(AuthFailure::Revoked));
    }

    let user = match state.users.find_by_id(verified.subject()).await? {
        Some(user) if !user.disabled => user,
        _ => {
            state.refresh.revoke_subject(verified.subject());
            tracing::warn!(
                target: "portal::audit",
                user_id = %verified.subject(),
                "Refresh refused for missing or disabled user"
            );
            return Err(ApiError::unauthorized(AuthFailure::Revoked));
        }
    };

    let tokens = state.issue_session(&state.principal_for(&user))?;
    tracing::debug!(target: "portal::audit", user_id = %user.id, "Token pair refreshed");

    Ok(ApiResponse::success(tokens))
}

// =============================================================================
// Logout
// =============================================================================

/// POST /auth/logout
///
/// Revokes the refresh token in the body, if any. Always succeeds.
pub async fn logout(
    State(state): State<AppState>,
    MaybeAuth(auth): MaybeAuth,
    body: Bytes,
) -> impl IntoResponse {
    let revoked = serde_json::from_slice::<RefreshRequest>(&body)
        .ok()
        .and_then(|req| state.tokens.verify(&req.refresh_token, TokenKind::Refresh).ok())
        .map(|verified| state.refresh.revoke(verified.jti()))
        .unwrap_or(false);

    tracing::info!(
        target: "portal::audit",
        user_id = auth.as_ref().map(|ctx| ctx.subject_id()),
        revoked = revoked,
        "User logged out"
    );

    ApiResponse::message("Logged out successfully")
}

// =============================================================================
// Register
// =============================================================================

/// `POST /auth/register` body.
#[derive(Deserialize)]
pub struct RegisterRequest {
    /// Account email.
    pub email: String,
    /// Display name.
    pub name: String,
    /// Plain-text password.
    pub password: String,
}

impl RegisterRequest {
    fn validate(&self) -> ApiResult<()> {
        let email = self.email.trim();
        match email.split_once('@') {
            Some((local, domain)) if !local.is_empty() && domain.contains('.') => {}
            _ => return Err(ApiError::validation("A valid email is required")),
        }
        if self.name.trim().is_empty() {
            return Err(ApiError::validation("Name is required"));
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(ApiError::validation(format!(
                "Password must be at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }
        Ok(())
    }
}

/// POST /auth/register
///
/// Creates an account with the default role and logs it in. Closed unless
/// registration is enabled.
pub async fn register(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<RegisterRequest>,
) -> ApiResult<impl IntoResponse> {
    if !state.config.allow_registration {
        return Err(ApiError::forbidden("Registration is disabled"));
    }
    request.validate()?;

    let user = state
        .users
        .create(NewUser {
            email: request.email,
            name: request.name.trim().to_string(),
            password_hash: hash_password(&request.password)?,
            roles: [state.rbac.default_role().to_string()].into_iter().collect(),
        })
        .await?;

    let principal = state.principal_for(&user);
    let tokens = state.issue_session(&principal)?;
    tracing::info!(target: "portal::audit", user_id = %user.id, "User registered");

    Ok(ApiResponse::success(LoginData {
        tokens,
        user: UserProfile::from_principal(&principal),
    })
    .with_status(StatusCode::CREATED))
}

// =============================================================================
// Forgot Password
// =============================================================================

/// `POST /auth/forgot-password` body.
#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    /// Account email.
    pub email: String,
}

/// POST /auth/forgot-password
///
/// Records a reset request when the account exists. The response never
/// reveals whether it does.
pub async fn forgot_password(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<ForgotPasswordRequest>,
) -> ApiResult<impl IntoResponse> {
    if let Some(user) = state.users.find_by_email(&request.email).await? {
        state.users.record_password_reset(&user.id).await?;
        tracing::info!(target: "portal::audit", user_id = %user.id, "Password reset requested");
    }

    Ok(ApiResponse::message(
        "If an account exists for this email, reset instructions have been sent",
    ))
}

// =============================================================================
// Me / Status
// =============================================================================

/// GET /auth/me
pub async fn me(Auth(ctx): Auth) -> impl IntoResponse {
    ApiResponse::success(UserProfile::from_principal(&ctx.principal))
}

/// GET /auth/status
pub async fn status(MaybeAuth(ctx): MaybeAuth) -> impl IntoResponse {
    ApiResponse::success(AuthStatus {
        authenticated: ctx.is_some(),
        user: ctx.map(|ctx| UserProfile::from_principal(&ctx.principal)),
    })
}
