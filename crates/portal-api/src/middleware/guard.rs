// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Permission guard middleware.
//!
//! Must run inside [`super::AuthLayer`] in required mode. A request reaching
//! the guard without an [`AuthContext`] means the routes are wired wrong,
//! which is reported as a 500 rather than a 401.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::{
    body::Body,
    http::Request,
    response::{IntoResponse, Response},
};
use portal_core::{AuthError, AuthResult, Permission};
use tower::{Layer, Service};

use crate::auth::AuthContext;
use crate::error::ApiError;

/// Checks whether the caller may exercise a permission.
///
/// Super administrators pass every check, whatever their permission set.
pub fn check_permission(ctx: Option<&AuthContext>, required: &Permission) -> AuthResult<()> {
    let Some(ctx) = ctx else {
        tracing::error!(
            permission = %required,
            "Permission guard reached without an auth context"
        );
        return Err(AuthError::misconfigured(
            "permission guard is not behind the authentication middleware",
        ));
    };

    if ctx.is_super_admin() {
        tracing::debug!(
            target: "portal::audit",
            user_id = %ctx.subject_id(),
            permission = %required,
            "Super admin bypass"
        );
        return Ok(());
    }

    if ctx.has_permission(required) {
        return Ok(());
    }

    tracing::warn!(
        target: "portal::audit",
        user_id = %ctx.subject_id(),
        permission = %required,
        roles = ?ctx.principal.roles,
        request_id = %ctx.request_id,
        "Permission denied"
    );
    Err(AuthError::forbidden(required.clone()))
}

/// Shorthand for [`GuardLayer::require`].
pub fn authorize(permission: Permission) -> GuardLayer {
    GuardLayer::require(permission)
}

// =============================================================================
// GuardLayer
// =============================================================================

/// Layer that admits only callers holding a permission.
#[derive(Clone)]
pub struct GuardLayer {
    required: Arc<Permission>,
}

impl GuardLayer {
    /// Creates a layer requiring a single permission.
    pub fn require(permission: Permission) -> Self {
        Self {
            required: Arc::new(permission),
        }
    }

    /// Returns the required permission.
    pub fn permission(&self) -> &Permission {
        &self.required
    }
}

impl<S> Layer<S> for GuardLayer {
    type Service = GuardMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        GuardMiddleware {
            inner,
            required: self.required.clone(),
        }
    }
}

// =============================================================================
// GuardMiddleware
// =============================================================================

/// Middleware enforcing a [`GuardLayer`].
#[derive(Clone)]
pub struct GuardMiddleware<S> {
    inner: S,
    required: Arc<Permission>,
}

impl<S> Service<Request<Body>> for GuardMiddleware<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let required = self.required.clone();
        let mut inner = self.inner.clone();

        Box::pin(async move {
            match check_permission(req.extensions().get::<AuthContext>(), &required) {
                Ok(()) => inner.call(req).await,
                Err(e) => Ok(ApiError::from(e).into_response()),
            }
        })
    }
}

// =============================================================================
// Tests
// =============================================================================
