// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! API server implementation.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderName, HeaderValue, Method, StatusCode},
    routing::{get, post},
    Router,
};
use portal_core::{Clock, Permission};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::info;

use crate::auth::{RbacPolicy, TokenService};
use crate::config::ApiConfig;
use crate::error::{ApiError, ApiResult};
use crate::handlers;
use crate::middleware::{AuthLayer, GuardLayer, RateLimitLayer};
use crate::state::{AppState, AppStateBuilder};
use crate::users::UserStore;

// =============================================================================
// ApiServer
// =============================================================================

/// The API server.
pub struct ApiServer {
    state: AppState,
    config: Arc<ApiConfig>,
    extra_routes: Option<Router<AppState>>,
}

impl ApiServer {
    /// Creates a new API server with the given state.
    pub fn new(state: AppState) -> Self {
        let config = state.config.clone();
        Self {
            state,
            config,
            extra_routes: None,
        }
    }

    /// Mounts application routes next to `/auth` under the base path.
    ///
    /// Wrap admin routes with [`protected`] to put them behind the
    /// authentication and permission layers.
    pub fn with_routes(mut self, routes: Router<AppState>) -> Self {
        self.extra_routes = Some(match self.extra_routes.take() {
            Some(existing) => existing.merge(routes),
            None => routes,
        });
        self
    }

    /// Returns the shared state.
    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Creates the router with all routes and middleware.
    pub fn router(&self) -> Router {
        let tokens = self.state.tokens.clone();

        let optional_auth = Router::new()
            .route("/auth/logout", post(handlers::logout))
            .route("/auth/status", get(handlers::status))
            .route_layer(AuthLayer::optional(tokens.clone()));

        let required_auth = Router::new()
            .route("/auth/me", get(handlers::me))
            .route_layer(AuthLayer::required(tokens));

        let auth_routes = Router::new()
            .route("/auth/login", post(handlers::login))
            .route("/auth/refresh-token", post(handlers::refresh_token))
            .route("/auth/register", post(handlers::register))
            .route("/auth/forgot-password", post(handlers::forgot_password))
            .merge(optional_auth)
            .merge(required_auth)
            .layer(RateLimitLayer::new(self.config.rate_limit.clone()));

        let api = match &self.extra_routes {
            Some(extra) => auth_routes.merge(extra.clone()),
            None => auth_routes,
        };

        let router = if self.config.base_path.is_empty() {
            Router::new().merge(api)
        } else {
            Router::new().nest(&self.config.base_path, api)
        };

        let middleware_stack = ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(TimeoutLayer::with_status_code(
                StatusCode::REQUEST_TIMEOUT,
                self.config.request_timeout,
            ))
            .layer(create_cors_layer(&self.config))
            .layer(DefaultBodyLimit::max(self.config.max_body_size));

        router
            .route("/health", get(handlers::health))
            .layer(middleware_stack)
            .with_state(self.state.clone())
    }

    /// Runs the server.
    pub async fn run(self) -> ApiResult<()> {
        self.run_with_shutdown(std::future::pending()).await
    }

    /// Runs the server with graceful shutdown.
    pub async fn run_with_shutdown(
        self,
        shutdown_signal: impl std::future::Future<Output = ()> + Send + 'static,
    ) -> ApiResult<()> {
        let addr = self.config.socket_addr();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ApiError::internal(format!("Failed to bind {}: {}", addr, e)))?;

        self.serve(listener, shutdown_signal).await
    }

    /// Serves on an already bound listener.
    pub async fn serve(
        self,
        listener: TcpListener,
        shutdown_signal: impl std::future::Future<Output = ()> + Send + 'static,
    ) -> ApiResult<()> {
        let router = self.router();
        let local = listener.local_addr().ok();

        info!(
            addr = ?local,
            base_path = %self.config.base_path,
            registration = self.config.allow_registration,
            "Starting API server"
        );

        let registry = self.state.refresh.clone();
        let purge = tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(300));
            loop {
                interval.tick().await;
                let purged = registry.purge_expired();
                if purged > 0 {
                    tracing::debug!(purged = purged, "Purged expired refresh tokens");
                }
            }
        });

        let served = axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal)
        .await;

        purge.abort();
        served.map_err(|e| ApiError::internal(format!("Server error: {}", e)))?;

        info!("API server shutdown complete");
        Ok(())
    }

    /// Returns the configured server address.
    pub fn addr(&self) -> SocketAddr {
        self.config.socket_addr()
    }
}

/// Puts routes behind required authentication and a permission guard.
///
/// ```rust,ignore
/// let faqs = Router::new().route("/admin/faqs", post(create_faq));
/// let faqs = protected(faqs, state.tokens.clone(), Permission::parse("faqs:write")?);
/// ```
pub fn protected<S>(router: Router<S>, tokens: Arc<TokenService>, permission: Permission) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    // The last layer added runs first.
    router
        .route_layer(GuardLayer::require(permission))
        .route_layer(AuthLayer::required(tokens))
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Creates the CORS layer from configuration.
fn create_cors_layer(config: &ApiConfig) -> CorsLayer {
    let cors = &config.cors;

    let mut layer = CorsLayer::new()
        .max_age(Duration::from_secs(cors.max_age))
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            header::ACCEPT,
            HeaderName::from_static("x-request-id"),
        ]);

    if cors.allows_any_origin() {
        layer = layer.allow_origin(Any);
    } else {
        let origins: Vec<HeaderValue> = cors
            .allowed_origins
            .iter()
            .filter_map(|origin| match origin.parse() {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        layer = layer.allow_origin(AllowOrigin::list(origins));
    }

    let methods: Vec<Method> = cors
        .allowed_methods
        .iter()
        .filter_map(|m| m.parse().ok())
        .collect();
    layer = layer.allow_methods(methods);

    if cors.allow_credentials {
        if cors.allows_any_origin() {
            tracing::warn!("CORS credentials are not allowed with a wildcard origin; ignoring");
        } else {
            layer = layer.allow_credentials(true);
        }
    }

    layer
}

// =============================================================================
// Server Builder
// =============================================================================

/// Builder for creating the API server.
pub struct ApiServerBuilder {
    state_builder: AppStateBuilder,
    routes: Option<Router<AppState>>,
}

impl ApiServerBuilder {
    /// Creates a new server builder.
    pub fn new() -> Self {
        Self {
            state_builder: AppState::builder(),
            routes: None,
        }
    }

    /// Sets the configuration.
    pub fn config(mut self, config: ApiConfig) -> Self {
        self.state_builder = self.state_builder.config(config);
        self
    }

    /// Sets the clock.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.state_builder = self.state_builder.clock(clock);
        self
    }

    /// Sets the RBAC policy.
    pub fn rbac_policy(mut self, policy: Arc<RbacPolicy>) -> Self {
        self.state_builder = self.state_builder.rbac_policy(policy);
        self
    }

    /// Sets the user store.
    pub fn user_store(mut self, users: Arc<dyn UserStore>) -> Self {
        self.state_builder = self.state_builder.user_store(users);
        self
    }

    /// Adds application routes (see [`ApiServer::with_routes`]).
    pub fn routes(mut self, routes: Router<AppState>) -> Self {
        self.routes = Some(routes);
        self
    }

    /// Builds the server.
    pub fn build(self) -> ApiResult<ApiServer> {
        let server = ApiServer::new(self.state_builder.build()?);
        Ok(match self.routes {
            Some(routes) => server.with_routes(routes),
            None => server,
        })
    }
}

impl Default for ApiServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::JwtConfig;
    use crate::config::BootstrapAdmin;
    use crate::users::hash_password;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn test_config() -> ApiConfig {
        ApiConfig::default().with_jwt(JwtConfig::new(
            "access-secret-that-is-long-enough-for-tests",
            "refresh-secret-that-is-long-enough-for-tests",
        ))
    }

    fn admin() -> BootstrapAdmin {
        BootstrapAdmin {
            email: "admin@example.com".to_string(),
            name: "Admin".to_string(),
            password_hash: hash_password("admin-password").unwrap(),
            roles: vec!["editor".to_string()],
        }
    }

    async fn json_of(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[test]
    fn test_server_builder() {
        let server = ApiServerBuilder::new().config(test_config()).build().unwrap();
        assert_eq!(server.addr().port(), 8080);
    }

    #[tokio::test]
    async fn test_health_is_public() {
        let server = ApiServerBuilder::new().config(test_config()).build().unwrap();
        let response = server
            .router()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_of(response).await["status"], "ok");
    }

    #[tokio::test]
    async fn test_login_then_me() {
        let server = ApiServerBuilder::new()
            .config(test_config().with_bootstrap_admin(admin()))
            .build()
            .unwrap();
        let router = server.router();

        let response = router
            .clone()
            .oneshot(post_json(
                "/api/auth/login",
                serde_json::json!({"email": "admin@example.com", "password": "admin-password"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_of(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["user"]["email"], "admin@example.com");
        let access = body["data"]["accessToken"].as_str().unwrap().to_string();
        assert!(body["data"]["refreshToken"].is_string());

        let response = router
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/api/auth/me")
                    .header(header::AUTHORIZATION, format!("Bearer {}", access))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_of(response).await["data"]["roles"][0], "editor");

        let response = router
            .oneshot(Request::builder().uri("/api/auth/me").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_empty_base_path() {
        let server = ApiServerBuilder::new()
            .config(test_config().with_base_path(""))
            .build()
            .unwrap();

        let response = server
            .router()
            .oneshot(Request::builder().uri("/auth/status").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_of(response).await["data"]["authenticated"], false);
    }

    #[tokio::test]
    async fn test_protected_routes() {
        let server = ApiServerBuilder::new().config(test_config()).build().unwrap();
        let tokens = server.state().tokens.clone();
        let routes = protected(
            Router::new().route("/admin/faqs", post(|| async { "created" })),
            tokens.clone(),
            Permission::parse("faqs:write").unwrap(),
        );
        let router = server.with_routes(routes).router();

        let call = |token: Option<String>| {
            let mut builder = Request::builder().method("POST").uri("/api/admin/faqs");
            if let Some(token) = token {
                builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
            }
            router.clone().oneshot(builder.body(Body::empty()).unwrap())
        };

        let viewer = portal_core::Principal::new("v")
            .with_permission(Permission::parse("faqs:read").unwrap());
        let editor = portal_core::Principal::new("e")
            .with_permission(Permission::parse("faqs:write").unwrap());
        let root = portal_core::Principal::new("r").with_role("super_admin");
        let issue = |p: &portal_core::Principal| {
            tokens.issue(p, portal_core::TokenKind::Access).unwrap()
        };

        assert_eq!(call(None).await.unwrap().status(), StatusCode::UNAUTHORIZED);
        assert_eq!(call(Some(issue(&viewer))).await.unwrap().status(), StatusCode::FORBIDDEN);
        assert_eq!(call(Some(issue(&editor))).await.unwrap().status(), StatusCode::OK);
        assert_eq!(call(Some(issue(&root))).await.unwrap().status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_register_disabled_by_default() {
        let server = ApiServerBuilder::new().config(test_config()).build().unwrap();
        let response = server
            .router()
            .oneshot(post_json(
                "/api/auth/register",
                serde_json::json!({"email": "n@example.com", "name": "N", "password": "long-enough"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }
}
