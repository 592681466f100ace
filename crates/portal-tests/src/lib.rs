// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Portal Integration Tests
//!
//! Integration tests for the portal auth service and its client. The
//! tests run a real server on a loopback port and talk to it over HTTP,
//! either directly or through [`portal_client::ApiClient`].
//!
//! ## Module Structure
//!
//! - [`common`]: Shared test utilities, fixtures, and helpers
//!   - `fixtures`: Secrets, configurations and seeded users
//!   - `builders`: Builder for user records
//!   - `assertions`: Assertions on response envelopes
//!   - `mocks`: Recording observer and counting transport
//!   - `harness`: A live server driven by a manual clock
//!
//! ## Running Tests
//!
//! ```bash
//! # Run all integration tests
//! cargo test -p portal-tests
//!
//! # Run specific test suite
//! cargo test -p portal-tests --test integration_auth
//! cargo test -p portal-tests --test integration_guard
//! cargo test -p portal-tests --test integration_session
//! cargo test -p portal-tests --test integration_e2e
//!
//! # Run with verbose output
//! cargo test -p portal-tests -- --nocapture
//! ```
//!
//! ## Test Categories
//!
//! ### Auth Tests (`integration_auth.rs`)
//! - Login, me and status
//! - Refresh rotation and replay detection
//! - Logout, registration and password reset requests
//!
//! ### Guard Tests (`integration_guard.rs`)
//! - 401 for missing or bad credentials
//! - 403 for missing permissions
//! - Super-admin bypass
//!
//! ### Session Tests (`integration_session.rs`)
//! - Transparent refresh on expiry
//! - Single-flight refresh under concurrency
//! - Session expiry notification
//!
//! ### End-to-End Tests (`integration_e2e.rs`)
//! - Configuration file to running server to client
//!
//! ## Writing New Tests
//!
//! ```rust,ignore
//! use portal_tests::prelude::*;
//!
//! #[tokio::test]
//! async fn test_something() {
//!     let server = TestServer::start().await;
//!     let client = server.client();
//!     client.login(EDITOR_EMAIL, TEST_PASSWORD).await.unwrap();
//!     // ... test logic
//!     server.shutdown().await;
//! }
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod common;

/// Re-export commonly used items for convenience.
pub mod prelude {
    pub use crate::common::assertions::*;
    pub use crate::common::builders::*;
    pub use crate::common::fixtures::*;
    pub use crate::common::harness::*;
    pub use crate::common::mocks::*;
    pub use crate::common::{init_test_logging, temp_test_dir};
}
