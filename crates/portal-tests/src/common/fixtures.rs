// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Test Fixtures
//!
//! Pre-built secrets, configurations and users so every test starts from
//! the same known state.

use std::net::{IpAddr, Ipv4Addr};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use portal_api::{
    users, ApiConfig, InMemoryUserStore, JwtConfig, RateLimitConfig, UserRecord,
};
use portal_core::Permission;

use super::builders::UserBuilder;

// =============================================================================
// Secrets and Credentials
// =============================================================================

/// Access token secret used by test servers.
pub const ACCESS_SECRET: &str = "integration-access-secret-0123456789abcdef";

/// Refresh token secret used by test servers.
pub const REFRESH_SECRET: &str = "integration-refresh-secret-0123456789abcdef";

/// Password shared by every seeded user.
pub const TEST_PASSWORD: &str = "correct-horse-battery";

/// Seeded super administrator.
pub const SUPER_ADMIN_EMAIL: &str = "root@example.com";
/// Seeded editor.
pub const EDITOR_EMAIL: &str = "editor@example.com";
/// Seeded viewer.
pub const VIEWER_EMAIL: &str = "viewer@example.com";
/// Seeded disabled account.
pub const DISABLED_EMAIL: &str = "gone@example.com";

/// Access token lifetime of test servers.
pub const ACCESS_TTL: Duration = Duration::from_secs(15 * 60);

/// Argon2 hash of [`TEST_PASSWORD`], computed once per test binary.
pub fn test_password_hash() -> String {
    static HASH: OnceLock<String> = OnceLock::new();
    HASH.get_or_init(|| {
        users::hash_password(TEST_PASSWORD).expect("Failed to hash test password")
    })
    .clone()
}

// =============================================================================
// Config Fixtures
// =============================================================================

/// Pre-built configurations.
pub struct ConfigFixtures;

impl ConfigFixtures {
    /// JWT settings with distinct test secrets.
    pub fn jwt() -> JwtConfig {
        JwtConfig::new(ACCESS_SECRET, REFRESH_SECRET).with_access_ttl(ACCESS_TTL)
    }

    /// Server settings for a loopback test server.
    ///
    /// Rate limiting is off so tests can hammer `/auth`; registration is on.
    pub fn api() -> ApiConfig {
        ApiConfig::new()
            .with_host(IpAddr::V4(Ipv4Addr::LOCALHOST))
            .with_port(0)
            .with_base_path("/api")
            .with_jwt(Self::jwt())
            .with_rate_limit(RateLimitConfig::disabled())
            .with_registration(true)
    }

    /// A YAML configuration file for the given port.
    pub fn yaml(port: u16) -> String {
        format!(
            r#"
api:
  host: 127.0.0.1
  port: {port}
  base_path: /api
  allow_registration: false
  jwt:
    access_secret: "{access}"
    refresh_secret: "{refresh}"
    access_ttl_secs: 900
  rate_limit:
    enabled: true
    max_requests: 100
    window: 60
  bootstrap_admin:
    email: {email}
    name: Root
    password_hash: "{hash}"
    roles: [super_admin]
logging:
  level: debug
  format: compact
"#,
            port = port,
            access = ACCESS_SECRET,
            refresh = REFRESH_SECRET,
            email = SUPER_ADMIN_EMAIL,
            hash = test_password_hash(),
        )
    }
}

// =============================================================================
// User Fixtures
// =============================================================================

/// Pre-built user accounts.
pub struct UserFixtures;

impl UserFixtures {
    /// Account holding the `super_admin` role and nothing else.
    pub fn super_admin() -> UserRecord {
        UserBuilder::new("u-root", SUPER_ADMIN_EMAIL)
            .name("Root")
            .role("super_admin")
            .build()
    }

    /// Account holding the `editor` role.
    pub fn editor() -> UserRecord {
        UserBuilder::new("u-editor", EDITOR_EMAIL)
            .name("Eddie Editor")
            .role("editor")
            .build()
    }

    /// Account holding the `viewer` role.
    pub fn viewer() -> UserRecord {
        UserBuilder::new("u-viewer", VIEWER_EMAIL)
            .name("Vic Viewer")
            .role("viewer")
            .build()
    }

    /// Disabled editor account.
    pub fn disabled() -> UserRecord {
        UserBuilder::new("u-gone", DISABLED_EMAIL)
            .role("editor")
            .disabled()
            .build()
    }

    /// All seeded accounts.
    pub fn all() -> Vec<UserRecord> {
        vec![
            Self::super_admin(),
            Self::editor(),
            Self::viewer(),
            Self::disabled(),
        ]
    }

    /// A store holding [`UserFixtures::all`].
    pub fn seeded_store() -> Arc<InMemoryUserStore> {
        let store = InMemoryUserStore::new();
        for user in Self::all() {
            store.insert(user).expect("Seed users must be unique");
        }
        Arc::new(store)
    }
}

// =============================================================================
// Permission Fixtures
// =============================================================================

/// Permissions guarding the test admin routes.
pub struct PermissionFixtures;

impl PermissionFixtures {
    /// `faqs:read`, held by editors and viewers.
    pub fn faqs_read() -> Permission {
        Permission::parse("faqs:read").expect("valid permission")
    }

    /// `settings:write`, held by neither editors nor viewers.
    pub fn settings_write() -> Permission {
        Permission::parse("settings:write").expect("valid permission")
    }

    /// `users:delete`, reachable by seeded accounts only through the
    /// super-admin bypass.
    pub fn users_delete() -> Permission {
        Permission::parse("users:delete").expect("valid permission")
    }
}
