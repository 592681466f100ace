// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Key/value storage for the client session.

use std::collections::HashMap;

use parking_lot::RwLock;

/// Storage key of the access token.
pub const ACCESS_TOKEN_KEY: &str = "accessToken";
/// Storage key of the refresh token.
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";
/// Storage key of the cached user profile (JSON).
pub const USER_KEY: &str = "user";

/// Where the session survives between requests.
pub trait SessionStorage: Send + Sync {
    /// Reads a value.
    fn get(&self, key: &str) -> Option<String>;

    /// Writes a value.
    fn set(&self, key: &str, value: &str);

    /// Deletes a value.
    fn remove(&self, key: &str);

    /// Returns `false` for storage that silently drops writes.
    fn is_available(&self) -> bool {
        true
    }
}

/// In-process storage.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    values: RwLock<HashMap<String, String>>,
}

impl MemoryStorage {
    /// Creates empty storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored keys.
    pub fn len(&self) -> usize {
        self.values.read().len()
    }

    /// Returns `true` if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.values.read().is_empty()
    }
}

impl SessionStorage for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.values.read().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.values.write().insert(key.to_string(), value.to_string());
    }

    fn remove(&self, key: &str) {
        self.values.write().remove(key);
    }
}

/// Storage for contexts without a session, such as server-side rendering.
///
/// Reads return nothing and writes are dropped.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledStorage;

impl SessionStorage for DisabledStorage {
    fn get(&self, _key: &str) -> Option<String> {
        None
    }

    fn set(&self, key: &str, _value: &str) {
        tracing::trace!(key = key, "Session storage disabled; write dropped");
    }

    fn remove(&self, _key: &str) {}

    fn is_available(&self) -> bool {
        false
    }
}
