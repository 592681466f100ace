// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! JWT authentication middleware.

use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{header, Request},
    response::{IntoResponse, Response},
};
use portal_core::{AuthFailure, TokenKind};
use tower::{Layer, Service};
use uuid::Uuid;

use crate::auth::{AuthContext, TokenError, TokenService};
use crate::error::ApiError;

const REQUEST_ID_HEADER: &str = "x-request-id";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Required,
    Optional,
}

// =============================================================================
// AuthLayer
// =============================================================================

/// Layer for JWT authentication.
///
/// Reads `Authorization: Bearer <token>` and verifies it as an access token.
/// On success an [`AuthContext`] is inserted into the request extensions.
///
/// In required mode every failure halts the request with 401. In optional
/// mode the request proceeds without a context instead. A missing signing
/// secret halts the request with 500 in both modes.
#[derive(Clone)]
pub struct AuthLayer {
    tokens: Arc<TokenService>,
    mode: Mode,
}

impl AuthLayer {
    /// Creates a layer that rejects unauthenticated requests.
    pub fn required(tokens: Arc<TokenService>) -> Self {
        Self {
            tokens,
            mode: Mode::Required,
        }
    }

    /// Creates a layer that lets unauthenticated requests through.
    pub fn optional(tokens: Arc<TokenService>) -> Self {
        Self {
            tokens,
            mode: Mode::Optional,
        }
    }

    /// Returns `true` for the optional variant.
    pub fn is_optional(&self) -> bool {
        self.mode == Mode::Optional
    }
}

impl<S> Layer<S> for AuthLayer {
    type Service = AuthMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AuthMiddleware {
            inner,
            tokens: self.tokens.clone(),
            mode: self.mode,
        }
    }
}

// =============================================================================
// AuthMiddleware
// =============================================================================

/// Middleware for JWT authentication.
#[derive(Clone)]
pub struct AuthMiddleware<S> {
    inner: S,
    tokens: Arc<TokenService>,
    mode: Mode,
}

impl<S> Service<Request<Body>> for AuthMiddleware<S>
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

    fn call(&mut self, mut req: Request<Body>) -> Self::Future {
        let tokens = self.tokens.clone();
        let mode = self.mode;
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let request_id = request_id(&req);
            let client_ip = req
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ci| ci.0.ip());

            let verified = match extract_bearer_token(&req) {
                Some(token) => tokens.verify(&token, TokenKind::Access).map_err(|e| {
                    log_rejection(&e, &req, request_id);
                    ApiError::from(e)
                }),
                None => Err(ApiError::unauthorized(AuthFailure::MissingCredential)),
            };

            match verified {
                Ok(verified) => {
                    let mut ctx = AuthContext::new(verified.principal).with_request_id(request_id);
                    if let Some(ip) = client_ip {
                        ctx = ctx.with_client_ip(ip);
                    }
                    req.extensions_mut().insert(ctx);
                    inner.call(req).await
                }
                // Misconfiguration never degrades to anonymous access.
                Err(e) if e.is_server_error() => Ok(e.into_response()),
                Err(_) if mode == Mode::Optional => inner.call(req).await,
                Err(e) => Ok(e.into_response()),
            }
        })
    }
}

fn log_rejection(error: &TokenError, req: &Request<Body>, request_id: Uuid) {
    let path = req.uri().path();
    match error {
        TokenError::Expired => tracing::debug!(
            target: "portal::audit",
            reason = %error,
            path = %path,
            request_id = %request_id,
            "Access token rejected"
        ),
        TokenError::MissingSecret { .. } | TokenError::Signing(_) => {}
        _ => tracing::warn!(
            target: "portal::audit",
            reason = %error,
            path = %path,
            request_id = %request_id,
            "Access token rejected"
        ),
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Extracts the bearer token from the Authorization header.
pub fn extract_bearer_token<B>(req: &Request<B>) -> Option<String> {
    req.headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
}

fn request_id<B>(req: &Request<B>) -> Uuid {
    req.headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| Uuid::parse_str(value).ok())
        .unwrap_or_else(Uuid::now_v7)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::JwtConfig;
    use axum::http::{HeaderValue, StatusCode};
    use portal_core::{ManualClock, Principal};
    use std::convert::Infallible;
    use tower::ServiceExt;

    fn service_with(access: &str) -> (Arc<TokenService>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::at_millis(1_700_000_000_000));
        let config = JwtConfig::new(access, "refresh-secret-that-is-long-enough-for-tests");
        (Arc::new(TokenService::new(config, clock.clone())), clock)
    }

    fn configured() -> (Arc<TokenService>, Arc<ManualClock>) {
        service_with("access-secret-that-is-long-enough-for-tests")
    }

    async fn echo_subject(req: Request<Body>) -> Result<Response, Infallible> {
        let subject = req
            .extensions()
            .get::<AuthContext>()
            .map(|ctx| ctx.subject_id().to_string())
            .unwrap_or_else(|| "-".to_string());
        Ok(Response::new(Body::from(subject)))
    }

    fn request(token: Option<&str>) -> Request<Body> {
        let mut req = Request::builder().uri("/test").body(Body::empty()).unwrap();
        if let Some(token) = token {
            req.headers_mut().insert(
                header::AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
            );
        }
        req
    }

    async fn body_string(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[test]
    fn test_extract_bearer_token() {
        let mut req = request(None);
        assert!(extract_bearer_token(&req).is_none());

        req.headers_mut()
            .insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert!(extract_bearer_token(&req).is_none());

        req.headers_mut()
            .insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert!(extract_bearer_token(&req).is_none());

        req.headers_mut()
            .insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer mytoken123"));
        assert_eq!(extract_bearer_token(&req), Some("mytoken123".to_string()));
    }

    #[tokio::test]
    async fn test_valid_token_sets_context() {
        let (tokens, _) = configured();
        let token = tokens.issue(&Principal::new("user123"), TokenKind::Access).unwrap();
        let service = AuthLayer::required(tokens).layer(tower::service_fn(echo_subject));

        let response = service.oneshot(request(Some(&token))).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "user123");
    }

    #[tokio::test]
    async fn test_missing_header_is_401() {
        let (tokens, _) = configured();
        let service = AuthLayer::required(tokens).layer(tower::service_fn(echo_subject));

        let response = service.oneshot(request(None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_rejections_share_one_message() {
        let (tokens, clock) = configured();
        let principal = Principal::new("user123");
        let expired = tokens.issue(&principal, TokenKind::Access).unwrap();
        let refresh = tokens.issue(&principal, TokenKind::Refresh).unwrap();
        let (foreign, _) = service_with("some-other-access-secret-long-enough-for-tests");
        let forged = foreign.issue(&principal, TokenKind::Access).unwrap();
        clock.advance(std::time::Duration::from_secs(901));

        for token in [expired.as_str(), refresh.as_str(), forged.as_str(), "garbage"] {
            let service = AuthLayer::required(tokens.clone()).layer(tower::service_fn(echo_subject));
            let response = service.oneshot(request(Some(token))).await.unwrap();

            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
            let body: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
            assert_eq!(body["success"], false);
            assert_eq!(body["error"]["code"], "UNAUTHORIZED");
            assert_eq!(body["error"]["message"], "Invalid or expired token");
        }
    }

    #[tokio::test]
    async fn test_missing_secret_is_500_in_both_modes() {
        let (tokens, _) = service_with("");

        let required = AuthLayer::required(tokens.clone()).layer(tower::service_fn(echo_subject));
        let response = required.oneshot(request(Some("anything"))).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let optional = AuthLayer::optional(tokens).layer(tower::service_fn(echo_subject));
        let response = optional.oneshot(request(Some("anything"))).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_optional_mode() {
        let (tokens, _) = configured();
        let token = tokens.issue(&Principal::new("user123"), TokenKind::Access).unwrap();
        let layer = AuthLayer::optional(tokens);
        assert!(layer.is_optional());

        let response = layer.layer(tower::service_fn(echo_subject)).oneshot(request(None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "-");

        let response = layer
            .layer(tower::service_fn(echo_subject))
            .oneshot(request(Some("garbage")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "-");

        let response = layer
            .layer(tower::service_fn(echo_subject))
            .oneshot(request(Some(&token)))
            .await
            .unwrap();
        assert_eq!(body_string(response).await, "user123");
    }

    #[tokio::test]
    async fn test_request_id_header_is_used() {
        let (tokens, _) = configured();
        let token = tokens.issue(&Principal::new("user123"), TokenKind::Access).unwrap();
        let id = Uuid::now_v7();

        let service = AuthLayer::required(tokens).layer(tower::service_fn(
            move |req: Request<Body>| async move {
                let seen = req.extensions().get::<AuthContext>().map(|c| c.request_id);
                assert_eq!(seen, Some(id));
                Ok::<_, Infallible>(Response::new(Body::empty()))
            },
        ));

        let mut req = request(Some(&token));
        req.headers_mut()
            .insert(REQUEST_ID_HEADER, HeaderValue::from_str(&id.to_string()).unwrap());
        let response = service.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
