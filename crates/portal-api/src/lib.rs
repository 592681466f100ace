// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # portal-api
//!
//! Authentication service for the portal admin backend.
//!
//! This crate provides the token issuer/verifier, the authentication and
//! authorization middleware shared by every backend service, and the
//! `/auth/*` HTTP endpoints built on top of them.

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod auth;
pub mod config;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod response;
pub mod server;
pub mod state;
pub mod users;

pub use auth::{
    AuthContext, Claims, JwtConfig, RbacPolicy, RefreshRegistry, Role, TokenError, TokenService,
    VerifiedToken,
};
pub use config::{ApiConfig, BootstrapAdmin, CorsConfig};
pub use error::{ApiError, ApiResult};
pub use middleware::{AuthLayer, GuardLayer, RateLimitConfig, RateLimitLayer};
pub use server::{protected, ApiServer, ApiServerBuilder};
pub use state::AppState;
pub use users::{InMemoryUserStore, NewUser, UserRecord, UserStore};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
