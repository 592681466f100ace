// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Custom Assertions
//!
//! Assertions on HTTP responses and the `{success, error}` envelope.

use portal_client::ClientError;
use serde_json::Value;

/// Asserts a `{success: false, error: {code}}` body with the given status.
pub fn assert_error_response(status: u16, body: &Value, expected_status: u16, expected_code: &str) {
    assert_eq!(
        status, expected_status,
        "Expected status {}, got {} with body {}",
        expected_status, status, body
    );
    assert_eq!(body["success"], Value::Bool(false), "Error body must have success=false: {}", body);
    assert_eq!(
        body["error"]["code"].as_str(),
        Some(expected_code),
        "Unexpected error code in {}",
        body
    );
    assert!(
        body["error"]["message"].as_str().is_some_and(|m| !m.is_empty()),
        "Error body must carry a message: {}",
        body
    );
}

/// Asserts a `{success: true, data}` body with a 2xx status and returns `data`.
pub fn assert_success_response(status: u16, body: &Value) -> &Value {
    assert!(
        (200..300).contains(&status),
        "Expected 2xx, got {} with body {}",
        status, body
    );
    assert_eq!(body["success"], Value::Bool(true), "Unexpected body {}", body);
    &body["data"]
}

/// Asserts that a client call failed with the given HTTP status.
pub fn assert_client_status(error: &ClientError, expected_status: u16) {
    assert_eq!(
        error.status(),
        Some(expected_status),
        "Expected HTTP {} error, got {:?}",
        expected_status,
        error
    );
}
