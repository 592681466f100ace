// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Test Harness
//!
//! A live API server on a loopback port with a manual clock, seeded
//! users and a handful of permission-guarded admin routes.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::Path,
    response::IntoResponse,
    routing::{delete, get, put},
    Json, Router,
};
use portal_api::{
    extractors::Auth, protected, response::ApiResponse, ApiConfig, ApiResult, ApiServer, AppState,
    InMemoryUserStore,
};
use portal_client::{ApiClient, ClientConfig, ReqwestTransport, SessionObserver};
use portal_core::ManualClock;
use reqwest::Method;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use super::fixtures::{ConfigFixtures, PermissionFixtures, UserFixtures};
use super::init_test_logging;
use super::mocks::CountingTransport;

/// Client timeout used by the harness.
const CLIENT_TIMEOUT: Duration = Duration::from_secs(10);

// =============================================================================
// Admin Routes
// =============================================================================

async fn list_faqs(Auth(ctx): Auth) -> impl IntoResponse {
    ApiResponse::success(json!({
        "items": ["What do you build?", "Where are you based?"],
        "requestedBy": ctx.subject_id(),
    }))
}

async fn update_settings(Auth(ctx): Auth, Json(body): Json<Value>) -> impl IntoResponse {
    ApiResponse::success(json!({ "settings": body, "updatedBy": ctx.subject_id() }))
}

async fn delete_user(Auth(ctx): Auth, Path(id): Path<String>) -> impl IntoResponse {
    ApiResponse::success(json!({ "deleted": id, "deletedBy": ctx.subject_id() }))
}

/// Guarded admin routes mounted next to `/auth`:
///
/// | Route                       | Permission       |
/// |-----------------------------|------------------|
/// | `GET /admin/faqs`           | `faqs:read`      |
/// | `PUT /admin/settings`       | `settings:write` |
/// | `DELETE /admin/users/{id}`  | `users:delete`   |
pub fn admin_routes(state: &AppState) -> Router<AppState> {
    let tokens = state.tokens.clone();

    let faqs = protected(
        Router::new().route("/admin/faqs", get(list_faqs)),
        tokens.clone(),
        PermissionFixtures::faqs_read(),
    );
    let settings = protected(
        Router::new().route("/admin/settings", put(update_settings)),
        tokens.clone(),
        PermissionFixtures::settings_write(),
    );
    let users = protected(
        Router::new().route("/admin/users/{id}", delete(delete_user)),
        tokens,
        PermissionFixtures::users_delete(),
    );

    faqs.merge(settings).merge(users)
}

// =============================================================================
// TestServer
// =============================================================================

/// A running API server.
///
/// ```rust,ignore
/// let server = TestServer::start().await;
/// let (status, body) = server.request(Method::GET, "/auth/status", None, None).await;
/// server.shutdown().await;
/// ```
pub struct TestServer {
    addr: SocketAddr,
    clock: Arc<ManualClock>,
    users: Arc<InMemoryUserStore>,
    state: AppState,
    http: reqwest::Client,
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<ApiResult<()>>>,
}

impl TestServer {
    /// Starts a server with [`ConfigFixtures::api`].
    pub async fn start() -> Self {
        Self::start_with(ConfigFixtures::api()).await
    }

    /// Starts a server with the given configuration and the seeded users.
    pub async fn start_with(config: ApiConfig) -> Self {
        init_test_logging();

        let clock = Arc::new(ManualClock::now());
        let users = UserFixtures::seeded_store();

        let state = AppState::builder()
            .config(config)
            .clock(clock.clone())
            .user_store(users.clone())
            .build()
            .expect("Failed to build app state");

        let server = ApiServer::new(state.clone()).with_routes(admin_routes(&state));

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind test listener");
        let addr = listener.local_addr().expect("Listener has no address");

        let (tx, rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(server.serve(listener, async move {
            let _ = rx.await;
        }));

        Self {
            addr,
            clock,
            users,
            state,
            http: reqwest::Client::new(),
            shutdown: Some(tx),
            handle: Some(handle),
        }
    }

    /// Server root, e.g. `http://127.0.0.1:41234`.
    pub fn root_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// API root including the base path.
    pub fn base_url(&self) -> String {
        format!("{}{}", self.root_url(), self.state.config.base_path)
    }

    /// The clock driving token expiry.
    pub fn clock(&self) -> &ManualClock {
        &self.clock
    }

    /// Moves the server clock forward.
    pub fn advance(&self, by: Duration) {
        self.clock.advance(by);
    }

    /// The seeded user store.
    pub fn users(&self) -> &InMemoryUserStore {
        &self.users
    }

    /// The server state.
    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// A client with its own session, wired through a [`CountingTransport`].
    pub fn client(&self) -> (ApiClient, Arc<CountingTransport>) {
        self.build_client(None)
    }

    /// Like [`TestServer::client`] with a session observer attached.
    pub fn client_with_observer(
        &self,
        observer: Arc<dyn SessionObserver>,
    ) -> (ApiClient, Arc<CountingTransport>) {
        self.build_client(Some(observer))
    }

    fn build_client(
        &self,
        observer: Option<Arc<dyn SessionObserver>>,
    ) -> (ApiClient, Arc<CountingTransport>) {
        let base_url = self.base_url();
        let transport = ReqwestTransport::new(&base_url, CLIENT_TIMEOUT)
            .expect("Failed to create transport");
        let counting = CountingTransport::new(Arc::new(transport));

        let mut builder = ApiClient::builder()
            .config(ClientConfig::new(base_url).with_timeout(CLIENT_TIMEOUT))
            .transport(counting.clone());
        if let Some(observer) = observer {
            builder = builder.observer(observer);
        }

        (builder.build().expect("Failed to build client"), counting)
    }

    /// Sends a raw request below the API root and returns status and JSON body.
    ///
    /// Non-JSON bodies come back as [`Value::Null`].
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (u16, Value) {
        let mut request = self
            .http
            .request(method, format!("{}{}", self.base_url(), path));
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await.expect("Request failed");
        let status = response.status().as_u16();
        let body = response.json::<Value>().await.unwrap_or(Value::Null);
        (status, body)
    }

    /// Logs in over HTTP and returns `(access_token, refresh_token)`.
    pub async fn login(&self, email: &str, password: &str) -> (String, String) {
        let (status, body) = self
            .request(
                Method::POST,
                "/auth/login",
                None,
                Some(json!({ "email": email, "password": password })),
            )
            .await;
        assert_eq!(status, 200, "Login failed for {}: {}", email, body);

        let access = body["data"]["accessToken"]
            .as_str()
            .expect("login response carries accessToken")
            .to_string();
        let refresh = body["data"]["refreshToken"]
            .as_str()
            .expect("login response carries refreshToken")
            .to_string();
        (access, refresh)
    }

    /// Stops the server and waits for it to finish.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(mut handle) = self.handle.take() {
            match tokio::time::timeout(Duration::from_secs(5), &mut handle).await {
                Ok(joined) => joined
                    .expect("Server task panicked")
                    .expect("Server returned an error"),
                // Lingering keep-alive connections; nothing left to check.
                Err(_) => handle.abort(),
            }
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}
