// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Authentication context.

use std::net::IpAddr;

use portal_core::{Permission, Principal};
use uuid::Uuid;

/// Authentication context for a request.
///
/// Inserted into request extensions by the authentication middleware and
/// read by the guard and by handlers.
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// Verified identity.
    pub principal: Principal,
    /// Request ID for tracing.
    pub request_id: Uuid,
    /// Client IP address.
    pub client_ip: Option<IpAddr>,
}

impl AuthContext {
    /// Creates a new context for a verified principal.
    pub fn new(principal: Principal) -> Self {
        Self {
            principal,
            request_id: Uuid::now_v7(),
            client_ip: None,
        }
    }

    /// Sets the client IP address.
    pub fn with_client_ip(mut self, ip: IpAddr) -> Self {
        self.client_ip = Some(ip);
        self
    }

    /// Sets the request ID.
    pub fn with_request_id(mut self, request_id: Uuid) -> Self {
        self.request_id = request_id;
        self
    }

    /// Returns the subject ID.
    pub fn subject_id(&self) -> &str {
        &self.principal.subject_id
    }

    /// Returns `true` if the principal was granted the permission.
    pub fn has_permission(&self, permission: &Permission) -> bool {
        self.principal.has_permission(permission)
    }

    /// Returns `true` if the principal is a super admin.
    pub fn is_super_admin(&self) -> bool {
        self.principal.is_super_admin()
    }
}
