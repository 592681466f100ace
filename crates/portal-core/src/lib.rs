// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # portal-core
//!
//! Shared identity and error types for the portal services.
//!
//! Both the server side (`portal-api`) and the consumer side
//! (`portal-client`) speak in terms of the types defined here:
//!
//! - **Principal**: the verified identity with its role and permission sets
//! - **Permission**: fine-grained `resource:action` capability strings
//! - **Token**: token kinds and access/refresh pairs
//! - **Wire**: JSON envelopes exchanged with the auth endpoints
//! - **Error**: the authentication/authorization failure taxonomy
//! - **Clock**: injectable time source used for token expiry

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod clock;
pub mod error;
pub mod permission;
pub mod principal;
pub mod token;
pub mod wire;

pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use error::{AuthError, AuthFailure, AuthResult};
pub use permission::{Permission, PermissionParseError};
pub use principal::{Principal, SUPER_ADMIN_ROLE};
pub use token::{TokenKind, TokenPair};
pub use wire::{
    ApiEnvelope, ErrorBody, ErrorPayload, LoginData, LoginRequest, RefreshRequest, UserProfile,
};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
