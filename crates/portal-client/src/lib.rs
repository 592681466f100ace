// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # portal-client
//!
//! Client-side session manager for the portal API.
//!
//! [`ApiClient`] attaches the stored access token to every request. When a
//! request comes back 401 it refreshes the token pair once, shared by all
//! concurrent callers, and retries the request exactly once. If the refresh
//! fails the session is cleared and the [`SessionObserver`] is told to send
//! the user back to the login screen.
//!
//! ```rust,ignore
//! let client = ApiClient::builder()
//!     .config(ClientConfig::new("https://example.com/api"))
//!     .storage(Arc::new(MemoryStorage::new()))
//!     .build()?;
//!
//! client.login("admin@example.com", "password").await?;
//! let faqs: serde_json::Value = client.get("/admin/faqs").await?;
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod client;
pub mod config;
pub mod error;
pub mod session;
pub mod storage;
pub mod transport;

pub use client::{ApiClient, ApiClientBuilder, SessionObserver};
pub use config::ClientConfig;
pub use error::{ClientError, ClientResult};
pub use session::{SessionState, SessionStore};
pub use storage::{DisabledStorage, MemoryStorage, SessionStorage};
pub use transport::{HttpRequest, HttpResponse, HttpTransport, ReqwestTransport};
