// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! API client with transparent token refresh.

use std::sync::Arc;

use portal_core::{ApiEnvelope, ErrorBody, LoginData, LoginRequest, RefreshRequest, TokenPair, UserProfile};
use reqwest::Method;
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::{watch, Mutex};

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::session::{SessionState, SessionStore};
use crate::storage::{MemoryStorage, SessionStorage};
use crate::transport::{HttpRequest, HttpResponse, HttpTransport, ReqwestTransport};

const UNAUTHORIZED: u16 = 401;

// =============================================================================
// SessionObserver
// =============================================================================

/// Notified when the session ends without the user asking for it.
///
/// The UI implements this to navigate to the login screen.
pub trait SessionObserver: Send + Sync {
    /// Called once after a failed refresh cleared the session.
    fn on_session_expired(&self);
}

// =============================================================================
// RefreshCoordinator
// =============================================================================

/// Runs at most one refresh at a time.
///
/// Callers that queued behind a refresh find the rotated access token in
/// the session and reuse it. A failed refresh clears the session before
/// the slot is released, so queued callers find nothing to refresh.
struct RefreshCoordinator {
    slot: Mutex<()>,
}

/// A refresh that did not produce a token.
struct RefreshFailed {
    error: ClientError,
    /// `true` for the one caller whose failure ended the session.
    ended_session: bool,
}

impl RefreshCoordinator {
    fn new() -> Self {
        Self { slot: Mutex::new(()) }
    }

    /// Returns a usable access token newer than `stale`.
    async fn refresh(
        &self,
        transport: &dyn HttpTransport,
        session: &SessionStore,
        refresh_path: &str,
        stale: Option<&str>,
    ) -> Result<String, RefreshFailed> {
        let _slot = self.slot.lock().await;

        if let Some(current) = session.access_token() {
            if Some(current.as_str()) != stale {
                tracing::debug!("Reusing access token refreshed by a concurrent request");
                return Ok(current);
            }
        }

        match exchange(transport, session, refresh_path).await {
            Ok(access) => Ok(access),
            Err(error) => Err(RefreshFailed {
                error,
                ended_session: session.clear(),
            }),
        }
    }
}

async fn exchange(
    transport: &dyn HttpTransport,
    session: &SessionStore,
    refresh_path: &str,
) -> ClientResult<String> {
    let refresh_token = session.refresh_token().ok_or(ClientError::SessionExpired)?;
    let body = serde_json::to_value(RefreshRequest { refresh_token })?;
    let request = HttpRequest::new(Method::POST, refresh_path)
        .with_header("Content-Type", "application/json")
        .with_body(body);
    let response = transport.send(request).await?;

    if !response.is_success() {
        tracing::info!(status = response.status, "Token refresh rejected");
        return Err(error_from(&response));
    }

    let envelope: ApiEnvelope<TokenPair> = response.decode()?;
    session.update_tokens(&envelope.data);
    tracing::debug!("Token pair refreshed");
    Ok(envelope.data.access_token)
}

// =============================================================================
// ApiClient
// =============================================================================

/// Client for the portal API.
///
/// Cheap to clone; clones share the session and the refresh slot.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<Inner>,
}

struct Inner {
    config: ClientConfig,
    transport: Arc<dyn HttpTransport>,
    session: SessionStore,
    refresh: RefreshCoordinator,
    observer: Option<Arc<dyn SessionObserver>>,
}

impl ApiClient {
    /// Creates a client builder.
    pub fn builder() -> ApiClientBuilder {
        ApiClientBuilder::new()
    }

    // =========================================================================
    // Session
    // =========================================================================

    /// Logs in and stores the session.
    pub async fn login(&self, email: &str, password: &str) -> ClientResult<UserProfile> {
        let body = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };
        let envelope: ApiEnvelope<LoginData> = self.post("/auth/login", &body).await?;
        let LoginData { tokens, user } = envelope.data;

        self.inner.session.establish(&tokens, &user);
        tracing::info!(user_id = %user.id, "Logged in");
        Ok(user)
    }

    /// Logs out. The server-side revocation is best effort; the local
    /// session is always cleared.
    pub async fn logout(&self) {
        let refresh_token = self.inner.session.refresh_token();
        let body = refresh_token.map(|refresh_token| RefreshRequest { refresh_token });

        let result: ClientResult<serde_json::Value> = match body {
            Some(body) => self.post("/auth/logout", &body).await,
            None => self.send_json(Method::POST, "/auth/logout", None).await,
        };
        if let Err(e) = result {
            tracing::warn!(error = %e, "Logout request failed; clearing local session anyway");
        }

        self.inner.session.clear();
    }

    /// Clears the local session without contacting the server.
    pub fn clear_session(&self) {
        self.inner.session.clear();
    }

    /// Returns the cached user profile.
    pub fn current_user(&self) -> Option<UserProfile> {
        self.inner.session.user()
    }

    /// Returns `true` if a session is stored.
    pub fn is_authenticated(&self) -> bool {
        self.inner.session.state() == SessionState::Authenticated
    }

    /// Subscribes to session state transitions.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.inner.session.subscribe()
    }

    /// Returns the session store.
    pub fn session(&self) -> &SessionStore {
        &self.inner.session
    }

    // =========================================================================
    // Requests
    // =========================================================================

    /// `GET` and decode the response body.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> ClientResult<T> {
        self.send_json(Method::GET, path, None).await
    }

    /// `POST` a JSON body and decode the response body.
    pub async fn post<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> ClientResult<T> {
        self.send_json(Method::POST, path, Some(serde_json::to_value(body)?)).await
    }

    /// `PUT` a JSON body and decode the response body.
    pub async fn put<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> ClientResult<T> {
        self.send_json(Method::PUT, path, Some(serde_json::to_value(body)?)).await
    }

    /// `DELETE` and decode the response body.
    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> ClientResult<T> {
        self.send_json(Method::DELETE, path, None).await
    }

    /// Sends a request and decodes a 2xx body.
    pub async fn send_json<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> ClientResult<T> {
        let mut request = HttpRequest::new(method, path);
        if let Some(body) = body {
            request = request
                .with_header("Content-Type", "application/json")
                .with_body(body);
        }
        self.execute(request).await?.decode()
    }

    /// Sends a request, refreshing and retrying once on 401.
    ///
    /// Returns the response for 2xx statuses and [`ClientError::Api`] for any
    /// other. A failed refresh clears the session and returns
    /// [`ClientError::SessionExpired`].
    pub async fn execute(&self, request: HttpRequest) -> ClientResult<HttpResponse> {
        let inner = &self.inner;
        let token = inner.session.access_token();
        let response = self.dispatch(&request, token.as_deref()).await?;

        if response.status != UNAUTHORIZED
            || inner.config.is_excluded(&request.path)
            || inner.session.refresh_token().is_none()
        {
            return into_result(response);
        }

        let refreshed = inner
            .refresh
            .refresh(
                inner.transport.as_ref(),
                &inner.session,
                &inner.config.refresh_path,
                token.as_deref(),
            )
            .await;

        match refreshed {
            Ok(access) => {
                // A second 401 is final.
                let retry = self.dispatch(&request, Some(&access)).await?;
                into_result(retry)
            }
            Err(failed) => {
                tracing::info!(error = %failed.error, path = %request.path, "Refresh failed; ending session");
                if failed.ended_session {
                    self.notify_expired();
                }
                Err(ClientError::SessionExpired)
            }
        }
    }

    async fn dispatch(&self, request: &HttpRequest, token: Option<&str>) -> ClientResult<HttpResponse> {
        let mut request = request.clone();
        if let Some(token) = token {
            request = request.with_header("Authorization", format!("Bearer {}", token));
        }
        self.inner.transport.send(request).await
    }

    fn notify_expired(&self) {
        if let Some(observer) = &self.inner.observer {
            observer.on_session_expired();
        }
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.inner.config.base_url)
            .field("session", &self.inner.session)
            .finish_non_exhaustive()
    }
}

fn into_result(response: HttpResponse) -> ClientResult<HttpResponse> {
    if response.is_success() {
        Ok(response)
    } else {
        Err(error_from(&response))
    }
}

fn error_from(response: &HttpResponse) -> ClientError {
    let payload = response.decode::<ErrorBody>().ok().map(|body| body.error);
    ClientError::api(response.status, payload)
}

// =============================================================================
// ApiClientBuilder
// =============================================================================

/// Builder for [`ApiClient`].
#[derive(Default)]
pub struct ApiClientBuilder {
    config: Option<ClientConfig>,
    transport: Option<Arc<dyn HttpTransport>>,
    storage: Option<Arc<dyn SessionStorage>>,
    observer: Option<Arc<dyn SessionObserver>>,
}

impl ApiClientBuilder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the configuration.
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Sets the transport. Defaults to [`ReqwestTransport`].
    pub fn transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Sets the session storage. Defaults to [`MemoryStorage`].
    pub fn storage(mut self, storage: Arc<dyn SessionStorage>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Sets the session observer.
    pub fn observer(mut self, observer: Arc<dyn SessionObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Builds the client.
    pub fn build(self) -> ClientResult<ApiClient> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        let transport: Arc<dyn HttpTransport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::new(config.base_url.clone(), config.timeout)?),
        };
        let storage = self
            .storage
            .unwrap_or_else(|| Arc::new(MemoryStorage::new()));

        Ok(ApiClient {
            inner: Arc::new(Inner {
                config,
                transport,
                session: SessionStore::new(storage),
                refresh: RefreshCoordinator::new(),
                observer: self.observer,
            }),
        })
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex as SyncMutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    type Handler = dyn Fn(&HttpRequest) -> HttpResponse + Send + Sync;

    /// Answers with a closure and records every request.
    struct ScriptedTransport {
        handler: Box<Handler>,
        requests: SyncMutex<Vec<HttpRequest>>,
    }

    impl ScriptedTransport {
        fn new(handler: impl Fn(&HttpRequest) -> HttpResponse + Send + Sync + 'static) -> Arc<Self> {
            Arc::new(Self {
                handler: Box::new(handler),
                requests: SyncMutex::new(Vec::new()),
            })
        }

        fn calls_to(&self, path: &str) -> usize {
            self.requests.lock().iter().filter(|r| r.path == path).count()
        }
    }

    #[async_trait]
    impl HttpTransport for ScriptedTransport {
        async fn send(&self, request: HttpRequest) -> ClientResult<HttpResponse> {
            self.requests.lock().push(request.clone());
            if request.path == "/auth/refresh-token" {
                // Let concurrent callers pile up behind the refresh.
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
            Ok((self.handler)(&request))
        }
    }

    #[derive(Default)]
    struct CountingObserver(AtomicUsize);

    impl SessionObserver for CountingObserver {
        fn on_session_expired(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn bearer(request: &HttpRequest) -> Option<&str> {
        request.header("Authorization").and_then(|h| h.strip_prefix("Bearer "))
    }

    fn unauthorized() -> HttpResponse {
        HttpResponse::json(
            401,
            &serde_json::json!({"success": false, "error": {"code": "UNAUTHORIZED", "message": "Invalid or expired token"}}),
        )
    }

    fn ok(data: serde_json::Value) -> HttpResponse {
        HttpResponse::json(200, &serde_json::json!({"success": true, "data": data}))
    }

    fn pair(access: &str, refresh: &str) -> serde_json::Value {
        serde_json::json!({"accessToken": access, "refreshToken": refresh})
    }

    /// Accepts only `new-access` on `/data`; refresh succeeds if `refresh_ok`.
    fn server(refresh_ok: bool) -> Arc<ScriptedTransport> {
        ScriptedTransport::new(move |req| match req.path.as_str() {
            "/auth/refresh-token" if refresh_ok => ok(pair("new-access", "new-refresh")),
            "/auth/refresh-token" => unauthorized(),
            "/data" if bearer(req) == Some("new-access") => ok(serde_json::json!({"value": 1})),
            _ => unauthorized(),
        })
    }

    fn client(transport: Arc<ScriptedTransport>, observer: Arc<CountingObserver>) -> ApiClient {
        let client = ApiClient::builder()
            .transport(transport)
            .observer(observer)
            .build()
            .unwrap();
        client
            .session()
            .establish(&TokenPair::new("old-access", "old-refresh"), &profile());
        client
    }

    fn profile() -> UserProfile {
        UserProfile {
            id: "u1".to_string(),
            email: "u1@example.com".to_string(),
            name: "U1".to_string(),
            roles: Default::default(),
            permissions: Default::default(),
        }
    }

    #[tokio::test]
    async fn test_refresh_then_single_retry() {
        let transport = server(true);
        let observer = Arc::new(CountingObserver::default());
        let client = client(transport.clone(), observer.clone());

        let body: serde_json::Value = client.get("/data").await.unwrap();

        assert_eq!(body["data"]["value"], 1);
        assert_eq!(transport.calls_to("/auth/refresh-token"), 1);
        assert_eq!(transport.calls_to("/data"), 2);
        assert_eq!(client.session().access_token().as_deref(), Some("new-access"));
        assert_eq!(client.session().refresh_token().as_deref(), Some("new-refresh"));
        assert_eq!(observer.0.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_refresh_failure_clears_session() {
        let transport = server(false);
        let observer = Arc::new(CountingObserver::default());
        let client = client(transport.clone(), observer.clone());
        let mut states = client.subscribe();
        states.borrow_and_update();

        let err = client.get::<serde_json::Value>("/data").await.unwrap_err();

        assert!(err.is_session_expired());
        assert_eq!(transport.calls_to("/data"), 1);
        assert_eq!(transport.calls_to("/auth/refresh-token"), 1);
        assert!(client.session().access_token().is_none());
        assert!(client.session().refresh_token().is_none());
        assert!(client.current_user().is_none());
        assert_eq!(observer.0.load(Ordering::SeqCst), 1);
        assert!(states.has_changed().unwrap());
        assert_eq!(*states.borrow_and_update(), SessionState::Anonymous);
    }

    #[tokio::test]
    async fn test_second_401_is_terminal() {
        let transport = ScriptedTransport::new(|req| match req.path.as_str() {
            "/auth/refresh-token" => ok(pair("new-access", "new-refresh")),
            _ => unauthorized(),
        });
        let observer = Arc::new(CountingObserver::default());
        let client = client(transport.clone(), observer.clone());

        let err = client.get::<serde_json::Value>("/data").await.unwrap_err();

        assert_eq!(err.status(), Some(401));
        assert_eq!(transport.calls_to("/auth/refresh-token"), 1);
        assert_eq!(transport.calls_to("/data"), 2);
        // The pair was just issued; keep it.
        assert!(client.is_authenticated());
        assert_eq!(observer.0.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_excluded_paths_are_not_intercepted() {
        let transport = server(true);
        let client = client(transport.clone(), Arc::new(CountingObserver::default()));

        for path in ["/auth/login", "/auth/register", "/auth/forgot-password"] {
            let err = client
                .post::<_, serde_json::Value>(path, &serde_json::json!({}))
                .await
                .unwrap_err();
            assert_eq!(err.status(), Some(401));
        }
        assert_eq!(transport.calls_to("/auth/refresh-token"), 0);
        assert_eq!(client.session().access_token().as_deref(), Some("old-access"));
    }

    #[tokio::test]
    async fn test_no_refresh_token_returns_401() {
        let transport = server(true);
        let client = ApiClient::builder().transport(transport.clone()).build().unwrap();

        let err = client.get::<serde_json::Value>("/data").await.unwrap_err();
        assert_eq!(err.status(), Some(401));
        assert_eq!(transport.calls_to("/auth/refresh-token"), 0);
    }

    #[tokio::test]
    async fn test_concurrent_401s_share_one_refresh() {
        let transport = server(true);
        let client = client(transport.clone(), Arc::new(CountingObserver::default()));

        let calls = (0..5).map(|_| {
            let client = client.clone();
            async move { client.get::<serde_json::Value>("/data").await }
        });
        let results = futures::future::join_all(calls).await;

        assert!(results.iter().all(|r| r.is_ok()));
        assert_eq!(transport.calls_to("/auth/refresh-token"), 1);
    }

    #[tokio::test]
    async fn test_headers() {
        let transport = ScriptedTransport::new(|_| ok(serde_json::json!(null)));
        let client = client(transport.clone(), Arc::new(CountingObserver::default()));

        let _: serde_json::Value = client.post("/items", &serde_json::json!({"a": 1})).await.unwrap();
        let _: serde_json::Value = client.get("/items").await.unwrap();

        let requests = transport.requests.lock();
        assert_eq!(requests[0].header("Authorization"), Some("Bearer old-access"));
        assert_eq!(requests[0].header("Content-Type"), Some("application/json"));
        assert!(requests[1].header("Content-Type").is_none());
    }

    #[tokio::test]
    async fn test_login_and_logout() {
        let transport = ScriptedTransport::new(|req| match req.path.as_str() {
            "/auth/login" => ok(serde_json::json!({
                "accessToken": "a", "refreshToken": "r",
                "user": {"id": "u9", "email": "u9@example.com", "name": "U9", "roles": ["editor"], "permissions": []}
            })),
            "/auth/logout" => HttpResponse::json(200, &serde_json::json!({"success": true, "message": "Logged out successfully"})),
            _ => unauthorized(),
        });
        let client = ApiClient::builder().transport(transport.clone()).build().unwrap();

        let user = client.login("u9@example.com", "pw").await.unwrap();
        assert_eq!(user.id, "u9");
        assert!(client.is_authenticated());
        assert_eq!(client.current_user().unwrap().email, "u9@example.com");

        client.logout().await;
        assert!(!client.is_authenticated());
        let logout = transport.requests.lock().last().cloned().unwrap();
        assert_eq!(logout.body.unwrap()["refreshToken"], "r");
    }

    #[tokio::test]
    async fn test_error_payload_is_parsed() {
        let transport = ScriptedTransport::new(|_| {
            HttpResponse::json(
                403,
                &serde_json::json!({"success": false, "error": {"code": "FORBIDDEN", "message": "Insufficient permissions"}}),
            )
        });
        let client = client(transport, Arc::new(CountingObserver::default()));

        match client.delete::<serde_json::Value>("/admin/team/1").await {
            Err(ClientError::Api { status, payload }) => {
                assert_eq!(status, 403);
                assert_eq!(payload.unwrap().code, "FORBIDDEN");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
