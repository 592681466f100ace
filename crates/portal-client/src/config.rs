// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Client configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ClientError, ClientResult};

/// Paths whose 401 answers are returned as-is instead of triggering a refresh.
pub const DEFAULT_EXCLUDED_PATHS: [&str; 4] = [
    "/auth/login",
    "/auth/register",
    "/auth/refresh-token",
    "/auth/forgot-password",
];

/// Configuration for [`crate::ApiClient`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// API root, e.g. `https://example.com/api`. Request paths are appended.
    pub base_url: String,
    /// Per-request timeout.
    #[serde(with = "duration_secs")]
    pub timeout: Duration,
    /// Path of the refresh endpoint.
    pub refresh_path: String,
    /// Path prefixes never intercepted on 401.
    pub excluded_paths: Vec<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/api".to_string(),
            timeout: Duration::from_secs(30),
            refresh_path: "/auth/refresh-token".to_string(),
            excluded_paths: DEFAULT_EXCLUDED_PATHS.iter().map(|p| p.to_string()).collect(),
        }
    }
}

impl ClientConfig {
    /// Creates a configuration for an API root.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Adds a path prefix that is never intercepted on 401.
    pub fn with_excluded_path(mut self, path: impl Into<String>) -> Self {
        self.excluded_paths.push(path.into());
        self
    }

    /// Returns `true` if a 401 on `path` must not trigger a refresh.
    pub fn is_excluded(&self, path: &str) -> bool {
        path == self.refresh_path || self.excluded_paths.iter().any(|p| path.starts_with(p.as_str()))
    }

    /// Validates the configuration.
    pub fn validate(&self) -> ClientResult<()> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(ClientError::config(format!(
                "base_url must be an http(s) URL, got '{}'",
                self.base_url
            )));
        }
        if self.timeout.is_zero() {
            return Err(ClientError::config("timeout must be greater than 0"));
        }
        if !self.refresh_path.starts_with('/') {
            return Err(ClientError::config("refresh_path must start with '/'"));
        }
        Ok(())
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}
