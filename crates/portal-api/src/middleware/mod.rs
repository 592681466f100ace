// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Middleware implementations for the API server.
//!
//! Layers are meant to be stacked in this order, outermost first:
//!
//! - [`RateLimitLayer`]: per-IP fixed-window limiting of the auth routes
//! - [`AuthLayer`]: bearer token verification (required or optional)
//! - [`GuardLayer`]: permission check with the super-admin bypass

mod auth;
mod guard;
mod rate_limit;

pub use auth::{extract_bearer_token, AuthLayer, AuthMiddleware};
pub use guard::{authorize, check_permission, GuardLayer, GuardMiddleware};
pub use rate_limit::{RateLimitConfig, RateLimitLayer, RateLimitResult, RateLimiterState};
