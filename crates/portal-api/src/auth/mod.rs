// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Authentication and authorization module.
//!
//! This module provides:
//! - JWT issuance and verification with separate access/refresh keys
//! - Role to permission derivation
//! - Refresh token rotation bookkeeping
//! - Authentication context

mod claims;
mod context;
mod jwt;
mod rbac;
mod refresh;

pub use claims::Claims;
pub use context::AuthContext;
pub use jwt::{IssuedToken, JwtConfig, TokenError, TokenService, VerifiedToken, MAX_ACCESS_TTL_SECS};
pub use rbac::{RbacPolicy, RbacPolicyBuilder, Role};
pub use refresh::{RefreshRegistry, RefreshRejection};
