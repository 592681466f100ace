// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Auth Endpoint Integration Tests
//!
//! Tests for the `/auth` endpoints of a running server:
//!
//! - Login, profile and status
//! - Refresh token rotation and replay detection
//! - Logout, registration and password reset requests
//! - Rate limiting of the auth surface
//!
//! ## Test Categories
//!
//! - `test_login_*`: Credential checks
//! - `test_me_*`: Required authentication
//! - `test_status_*`: Optional authentication
//! - `test_refresh_*`: Token rotation
//! - `test_logout_*`: Revocation
//! - `test_register_*`: Self-registration
//! - `test_forgot_*`: Password reset requests
//! - `test_rate_limit_*`: Throttling

use std::collections::BTreeSet;
use std::time::Duration;

use portal_api::RateLimitConfig;
use portal_tests::prelude::*;
use reqwest::Method;
use serde_json::{json, Value};

fn credentials(email: &str, password: &str) -> Option<Value> {
    Some(json!({ "email": email, "password": password }))
}

fn refresh_body(refresh: &str) -> Option<Value> {
    Some(json!({ "refreshToken": refresh }))
}

// =============================================================================
// Login
// =============================================================================

#[tokio::test]
async fn test_login_returns_tokens_and_profile() {
    let server = TestServer::start().await;

    let (status, body) = server
        .request(Method::POST, "/auth/login", None, credentials(EDITOR_EMAIL, TEST_PASSWORD))
        .await;
    let data = assert_success_response(status, &body);

    assert!(data["accessToken"].as_str().is_some_and(|t| !t.is_empty()));
    assert!(data["refreshToken"].as_str().is_some_and(|t| !t.is_empty()));
    assert_ne!(data["accessToken"], data["refreshToken"]);

    let user = &data["user"];
    assert_eq!(user["id"], "u-editor");
    assert_eq!(user["email"], EDITOR_EMAIL);
    assert_eq!(user["name"], "Eddie Editor");
    assert_eq!(user["roles"], json!(["editor"]));

    let permissions: Vec<&str> = user["permissions"]
        .as_array()
        .expect("permissions array")
        .iter()
        .filter_map(Value::as_str)
        .collect();
    assert!(permissions.contains(&"faqs:write"));
    assert!(permissions.contains(&"settings:read"));
    assert!(!permissions.contains(&"settings:write"));

    server.shutdown().await;
}

#[tokio::test]
async fn test_login_normalizes_email() {
    let server = TestServer::start().await;

    let (status, body) = server
        .request(
            Method::POST,
            "/auth/login",
            None,
            credentials("  Editor@Example.COM ", TEST_PASSWORD),
        )
        .await;
    assert_eq!(assert_success_response(status, &body)["user"]["id"], "u-editor");

    server.shutdown().await;
}

#[tokio::test]
async fn test_login_failures_are_indistinguishable() {
    let server = TestServer::start().await;

    let attempts = [
        credentials(EDITOR_EMAIL, "wrong-password"),
        credentials("nobody@example.com", TEST_PASSWORD),
        credentials(DISABLED_EMAIL, TEST_PASSWORD),
    ];

    let mut messages = BTreeSet::new();
    for attempt in attempts {
        let (status, body) = server.request(Method::POST, "/auth/login", None, attempt).await;
        assert_error_response(status, &body, 401, "UNAUTHORIZED");
        messages.insert(body["error"]["message"].as_str().unwrap_or_default().to_string());
    }
    assert_eq!(messages.len(), 1, "Failure messages leak account state: {:?}", messages);

    server.shutdown().await;
}

#[tokio::test]
async fn test_login_requires_both_fields() {
    let server = TestServer::start().await;

    let (status, body) = server
        .request(Method::POST, "/auth/login", None, credentials(EDITOR_EMAIL, ""))
        .await;
    assert_error_response(status, &body, 400, "BAD_REQUEST");

    let (status, body) = server
        .request(Method::POST, "/auth/login", None, Some(json!({ "email": EDITOR_EMAIL })))
        .await;
    assert_error_response(status, &body, 400, "BAD_REQUEST");

    server.shutdown().await;
}

// =============================================================================
// Me
// =============================================================================

#[tokio::test]
async fn test_me_requires_token() {
    let server = TestServer::start().await;

    let (status, body) = server.request(Method::GET, "/auth/me", None, None).await;
    assert_error_response(status, &body, 401, "UNAUTHORIZED");

    let (status, body) = server
        .request(Method::GET, "/auth/me", Some("not-a-jwt"), None)
        .await;
    assert_error_response(status, &body, 401, "UNAUTHORIZED");

    server.shutdown().await;
}

#[tokio::test]
async fn test_me_returns_token_principal() {
    let server = TestServer::start().await;
    let (access, _) = server.login(VIEWER_EMAIL, TEST_PASSWORD).await;

    let (status, body) = server.request(Method::GET, "/auth/me", Some(&access), None).await;
    let data = assert_success_response(status, &body);
    assert_eq!(data["id"], "u-viewer");
    assert_eq!(data["email"], VIEWER_EMAIL);
    assert_eq!(data["roles"], json!(["viewer"]));

    server.shutdown().await;
}

#[tokio::test]
async fn test_me_rejects_refresh_token() {
    let server = TestServer::start().await;
    let (_, refresh) = server.login(EDITOR_EMAIL, TEST_PASSWORD).await;

    let (status, body) = server.request(Method::GET, "/auth/me", Some(&refresh), None).await;
    assert_error_response(status, &body, 401, "UNAUTHORIZED");

    server.shutdown().await;
}

#[tokio::test]
async fn test_me_rejects_expired_token() {
    let server = TestServer::start().await;
    let (access, _) = server.login(EDITOR_EMAIL, TEST_PASSWORD).await;

    server.advance(ACCESS_TTL - Duration::from_secs(5));
    let (status, _) = server.request(Method::GET, "/auth/me", Some(&access), None).await;
    assert_eq!(status, 200);

    server.advance(Duration::from_secs(10));
    let (status, body) = server.request(Method::GET, "/auth/me", Some(&access), None).await;
    assert_error_response(status, &body, 401, "UNAUTHORIZED");

    server.shutdown().await;
}

// =============================================================================
// Status
// =============================================================================

#[tokio::test]
async fn test_status_anonymous() {
    let server = TestServer::start().await;

    let (status, body) = server.request(Method::GET, "/auth/status", None, None).await;
    let data = assert_success_response(status, &body);
    assert_eq!(data["authenticated"], false);
    assert!(data["user"].is_null());

    server.shutdown().await;
}

#[tokio::test]
async fn test_status_authenticated() {
    let server = TestServer::start().await;
    let (access, _) = server.login(EDITOR_EMAIL, TEST_PASSWORD).await;

    let (status, body) = server
        .request(Method::GET, "/auth/status", Some(&access), None)
        .await;
    let data = assert_success_response(status, &body);
    assert_eq!(data["authenticated"], true);
    assert_eq!(data["user"]["id"], "u-editor");

    server.shutdown().await;
}

#[tokio::test]
async fn test_status_invalid_token_is_anonymous() {
    let server = TestServer::start().await;
    let (access, _) = server.login(EDITOR_EMAIL, TEST_PASSWORD).await;
    server.advance(ACCESS_TTL + Duration::from_secs(1));

    for token in [access.as_str(), "garbage"] {
        let (status, body) = server
            .request(Method::GET, "/auth/status", Some(token), None)
            .await;
        assert_eq!(assert_success_response(status, &body)["authenticated"], false);
    }

    server.shutdown().await;
}

// =============================================================================
// Refresh
// =============================================================================

#[tokio::test]
async fn test_refresh_rotates_pair() {
    let server = TestServer::start().await;
    let (access, refresh) = server.login(EDITOR_EMAIL, TEST_PASSWORD).await;

    server.advance(ACCESS_TTL + Duration::from_secs(1));
    let (status, _) = server.request(Method::GET, "/auth/me", Some(&access), None).await;
    assert_eq!(status, 401);

    let (status, body) = server
        .request(Method::POST, "/auth/refresh-token", None, refresh_body(&refresh))
        .await;
    let data = assert_success_response(status, &body);
    let new_access = data["accessToken"].as_str().expect("accessToken").to_string();
    let new_refresh = data["refreshToken"].as_str().expect("refreshToken").to_string();
    assert_ne!(new_access, access);
    assert_ne!(new_refresh, refresh);

    let (status, body) = server
        .request(Method::GET, "/auth/me", Some(&new_access), None)
        .await;
    assert_eq!(assert_success_response(status, &body)["id"], "u-editor");

    server.shutdown().await;
}

#[tokio::test]
async fn test_refresh_reuse_within_grace_is_accepted() {
    let server = TestServer::start().await;
    let (_, refresh) = server.login(EDITOR_EMAIL, TEST_PASSWORD).await;

    let (first, _) = server
        .request(Method::POST, "/auth/refresh-token", None, refresh_body(&refresh))
        .await;
    server.advance(Duration::from_secs(2));
    let (second, _) = server
        .request(Method::POST, "/auth/refresh-token", None, refresh_body(&refresh))
        .await;

    assert_eq!(first, 200);
    assert_eq!(second, 200);

    server.shutdown().await;
}

#[tokio::test]
async fn test_refresh_replay_revokes_all_sessions() {
    let server = TestServer::start().await;
    let (_, stolen) = server.login(EDITOR_EMAIL, TEST_PASSWORD).await;
    let (_, other_device) = server.login(EDITOR_EMAIL, TEST_PASSWORD).await;

    let (status, body) = server
        .request(Method::POST, "/auth/refresh-token", None, refresh_body(&stolen))
        .await;
    let rotated = assert_success_response(status, &body)["refreshToken"]
        .as_str()
        .expect("refreshToken")
        .to_string();

    server.advance(Duration::from_secs(60));
    let (status, body) = server
        .request(Method::POST, "/auth/refresh-token", None, refresh_body(&stolen))
        .await;
    assert_error_response(status, &body, 401, "UNAUTHORIZED");

    for token in [rotated, other_device] {
        let (status, _) = server
            .request(Method::POST, "/auth/refresh-token", None, refresh_body(&token))
            .await;
        assert_eq!(status, 401, "Replay must end every session of the user");
    }

    server.shutdown().await;
}

#[tokio::test]
async fn test_refresh_rejects_access_token() {
    let server = TestServer::start().await;
    let (access, _) = server.login(EDITOR_EMAIL, TEST_PASSWORD).await;

    let (status, body) = server
        .request(Method::POST, "/auth/refresh-token", None, refresh_body(&access))
        .await;
    assert_error_response(status, &body, 401, "UNAUTHORIZED");

    server.shutdown().await;
}

#[tokio::test]
async fn test_refresh_rejects_expired_refresh_token() {
    let server = TestServer::start().await;
    let (_, refresh) = server.login(EDITOR_EMAIL, TEST_PASSWORD).await;

    server.advance(Duration::from_secs(8 * 86_400));
    let (status, body) = server
        .request(Method::POST, "/auth/refresh-token", None, refresh_body(&refresh))
        .await;
    assert_error_response(status, &body, 401, "UNAUTHORIZED");

    server.shutdown().await;
}

#[tokio::test]
async fn test_refresh_refused_for_disabled_user() {
    let server = TestServer::start().await;
    let (_, refresh) = server.login(EDITOR_EMAIL, TEST_PASSWORD).await;

    assert!(server.users().set_disabled("u-editor", true));
    let (status, body) = server
        .request(Method::POST, "/auth/refresh-token", None, refresh_body(&refresh))
        .await;
    assert_error_response(status, &body, 401, "UNAUTHORIZED");

    server.shutdown().await;
}

#[tokio::test]
async fn test_refresh_picks_up_role_changes() {
    let server = TestServer::start().await;
    let (_, refresh) = server.login(EDITOR_EMAIL, TEST_PASSWORD).await;

    let roles: BTreeSet<String> = ["viewer".to_string()].into_iter().collect();
    assert!(server.users().set_roles("u-editor", roles));

    let (status, body) = server
        .request(Method::POST, "/auth/refresh-token", None, refresh_body(&refresh))
        .await;
    let access = assert_success_response(status, &body)["accessToken"]
        .as_str()
        .expect("accessToken")
        .to_string();

    let (status, body) = server.request(Method::GET, "/auth/me", Some(&access), None).await;
    assert_eq!(assert_success_response(status, &body)["roles"], json!(["viewer"]));

    server.shutdown().await;
}

#[tokio::test]
async fn test_refresh_malformed_body() {
    let server = TestServer::start().await;

    let (status, body) = server
        .request(Method::POST, "/auth/refresh-token", None, Some(json!({ "token": "x" })))
        .await;
    assert_error_response(status, &body, 400, "BAD_REQUEST");

    server.shutdown().await;
}

// =============================================================================
// Logout
// =============================================================================

#[tokio::test]
async fn test_logout_revokes_refresh_token() {
    let server = TestServer::start().await;
    let (access, refresh) = server.login(EDITOR_EMAIL, TEST_PASSWORD).await;

    let (status, body) = server
        .request(Method::POST, "/auth/logout", Some(&access), refresh_body(&refresh))
        .await;
    assert_eq!(status, 200);
    assert_eq!(body["success"], true);
    assert!(body["message"].as_str().is_some());

    let (status, _) = server
        .request(Method::POST, "/auth/refresh-token", None, refresh_body(&refresh))
        .await;
    assert_eq!(status, 401);

    server.shutdown().await;
}

#[tokio::test]
async fn test_logout_always_succeeds() {
    let server = TestServer::start().await;

    let (status, _) = server.request(Method::POST, "/auth/logout", None, None).await;
    assert_eq!(status, 200);

    let (status, _) = server
        .request(Method::POST, "/auth/logout", Some("garbage"), refresh_body("garbage"))
        .await;
    assert_eq!(status, 200);

    server.shutdown().await;
}

// =============================================================================
// Register
// =============================================================================

#[tokio::test]
async fn test_register_creates_account_with_default_role() {
    let server = TestServer::start().await;

    let (status, body) = server
        .request(
            Method::POST,
            "/auth/register",
            None,
            Some(json!({ "email": "New@Example.com", "name": "Newcomer", "password": "long-enough-pw" })),
        )
        .await;
    assert_eq!(status, 201, "{}", body);
    let data = assert_success_response(status, &body);
    assert_eq!(data["user"]["email"], "new@example.com");
    assert_eq!(data["user"]["roles"], json!(["viewer"]));

    server.login("new@example.com", "long-enough-pw").await;

    server.shutdown().await;
}

#[tokio::test]
async fn test_register_duplicate_email_conflicts() {
    let server = TestServer::start().await;

    let (status, body) = server
        .request(
            Method::POST,
            "/auth/register",
            None,
            Some(json!({ "email": EDITOR_EMAIL, "name": "Imposter", "password": "long-enough-pw" })),
        )
        .await;
    assert_error_response(status, &body, 409, "CONFLICT");

    server.shutdown().await;
}

#[tokio::test]
async fn test_register_validation() {
    let server = TestServer::start().await;

    let invalid = [
        json!({ "email": "not-an-email", "name": "A", "password": "long-enough-pw" }),
        json!({ "email": "a@example.com", "name": " ", "password": "long-enough-pw" }),
        json!({ "email": "a@example.com", "name": "A", "password": "short" }),
    ];
    for body in invalid {
        let (status, response) = server
            .request(Method::POST, "/auth/register", None, Some(body))
            .await;
        assert_error_response(status, &response, 422, "VALIDATION_ERROR");
    }

    server.shutdown().await;
}

#[tokio::test]
async fn test_register_closed_by_default() {
    let server = TestServer::start_with(ConfigFixtures::api().with_registration(false)).await;

    let (status, body) = server
        .request(
            Method::POST,
            "/auth/register",
            None,
            Some(json!({ "email": "a@example.com", "name": "A", "password": "long-enough-pw" })),
        )
        .await;
    assert_error_response(status, &body, 403, "FORBIDDEN");

    server.shutdown().await;
}

// =============================================================================
// Forgot Password
// =============================================================================

#[tokio::test]
async fn test_forgot_password_does_not_reveal_accounts() {
    let server = TestServer::start().await;

    let (known_status, known) = server
        .request(
            Method::POST,
            "/auth/forgot-password",
            None,
            Some(json!({ "email": EDITOR_EMAIL })),
        )
        .await;
    let (unknown_status, unknown) = server
        .request(
            Method::POST,
            "/auth/forgot-password",
            None,
            Some(json!({ "email": "nobody@example.com" })),
        )
        .await;

    assert_eq!(known_status, 200);
    assert_eq!(unknown_status, 200);
    assert_eq!(known, unknown);
    assert_eq!(server.users().reset_request_count("u-editor"), 1);

    server.shutdown().await;
}

// =============================================================================
// Rate Limiting
// =============================================================================

#[tokio::test]
async fn test_rate_limit_auth_endpoints() {
    let config = ConfigFixtures::api()
        .with_rate_limit(RateLimitConfig::per_window(3, Duration::from_secs(60)));
    let server = TestServer::start_with(config).await;

    for _ in 0..3 {
        let (status, _) = server
            .request(Method::POST, "/auth/login", None, credentials(EDITOR_EMAIL, "wrong-password"))
            .await;
        assert_eq!(status, 401);
    }

    let (status, body) = server
        .request(Method::POST, "/auth/login", None, credentials(EDITOR_EMAIL, TEST_PASSWORD))
        .await;
    assert_error_response(status, &body, 429, "RATE_LIMIT_EXCEEDED");

    server.shutdown().await;
}

#[tokio::test]
async fn test_rate_limit_skips_admin_routes_and_health() {
    let config = ConfigFixtures::api()
        .with_rate_limit(RateLimitConfig::per_window(1, Duration::from_secs(60)));
    let server = TestServer::start_with(config).await;
    let (access, _) = server.login(VIEWER_EMAIL, TEST_PASSWORD).await;

    for _ in 0..5 {
        let (status, _) = server
            .request(Method::GET, "/admin/faqs", Some(&access), None)
            .await;
        assert_eq!(status, 200);
    }

    let health = reqwest::get(format!("{}/health", server.root_url()))
        .await
        .expect("health request");
    assert_eq!(health.status().as_u16(), 200);
    let body: Value = health.json().await.expect("health body");
    assert_eq!(body["status"], "ok");

    server.shutdown().await;
}
