// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Refresh token rotation bookkeeping.
//!
//! Every issued refresh token is registered by `jti`. Exchanging it marks it
//! rotated; a rotated token is still accepted for a short grace window so
//! that concurrent refreshes from one session all succeed. Logout revokes
//! immediately.

use std::time::Duration;

use dashmap::DashMap;
use portal_core::SharedClock;
use thiserror::Error;

/// Default window during which a rotated refresh token is still accepted.
pub const DEFAULT_REUSE_GRACE: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryState {
    Active,
    Rotated { at_ms: i64 },
    Revoked,
}

#[derive(Debug, Clone)]
struct Entry {
    subject: String,
    expires_at_secs: i64,
    state: EntryState,
}

/// Why a refresh token was not accepted for rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RefreshRejection {
    /// Never issued by this registry (or already purged).
    #[error("refresh token is unknown")]
    Unknown,
    /// Rotated longer ago than the grace window.
    #[error("refresh token was already used")]
    Reused,
    /// Revoked by logout.
    #[error("refresh token was revoked")]
    Revoked,
}

/// Registry of live refresh tokens.
#[derive(Debug)]
pub struct RefreshRegistry {
    entries: DashMap<String, Entry>,
    clock: SharedClock,
    reuse_grace_ms: i64,
}

impl RefreshRegistry {
    /// Creates a registry with the default grace window.
    pub fn new(clock: SharedClock) -> Self {
        Self::with_reuse_grace(clock, DEFAULT_REUSE_GRACE)
    }

    /// Creates a registry with a custom grace window.
    pub fn with_reuse_grace(clock: SharedClock, grace: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            clock,
            reuse_grace_ms: grace.as_millis() as i64,
        }
    }

    /// Registers a newly issued refresh token.
    pub fn register(&self, jti: impl Into<String>, subject: impl Into<String>, expires_at_secs: i64) {
        self.entries.insert(
            jti.into(),
            Entry {
                subject: subject.into(),
                expires_at_secs,
                state: EntryState::Active,
            },
        );
    }

    /// Marks a token as exchanged.
    ///
    /// Succeeds for an active token and for a rotated one still inside the
    /// grace window.
    pub fn rotate(&self, jti: &str) -> Result<(), RefreshRejection> {
        let now_ms = self.clock.now_millis();
        let mut entry = self.entries.get_mut(jti).ok_or(RefreshRejection::Unknown)?;

        let state = entry.state;
        match state {
            EntryState::Active => {
                entry.state = EntryState::Rotated { at_ms: now_ms };
                Ok(())
            }
            EntryState::Rotated { at_ms } if now_ms - at_ms <= self.reuse_grace_ms => {
                tracing::debug!(jti = %jti, subject = %entry.subject, "Rotated refresh token reused within grace window");
                Ok(())
            }
            EntryState::Rotated { .. } => Err(RefreshRejection::Reused),
            EntryState::Revoked => Err(RefreshRejection::Revoked),
        }
    }

    /// Revokes a token. Returns `true` if it was known.
    pub fn revoke(&self, jti: &str) -> bool {
        match self.entries.get_mut(jti) {
            Some(mut entry) => {
                entry.state = EntryState::Revoked;
                true
            }
            None => false,
        }
    }

    /// Revokes every token of a subject. Returns how many were affected.
    pub fn revoke_subject(&self, subject: &str) -> usize {
        let mut count = 0;
        for mut entry in self.entries.iter_mut() {
            if entry.subject == subject && entry.state != EntryState::Revoked {
                entry.state = EntryState::Revoked;
                count += 1;
            }
        }
        count
    }

    /// Drops entries whose token has expired. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now_secs = self.clock.now_secs();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.expires_at_secs > now_secs);
        before - self.entries.len()
    }

    /// Returns the number of tracked tokens.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no tokens are tracked.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use portal_core::ManualClock;
    use std::sync::Arc;

    fn registry() -> (RefreshRegistry, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::at_millis(1_000_000));
        (RefreshRegistry::new(clock.clone()), clock)
    }

    #[test]
    fn test_rotate_then_reuse_within_grace() {
        let (registry, clock) = registry();
        registry.register("t1", "user", 10_000);

        assert!(registry.rotate("t1").is_ok());
        clock.advance(Duration::from_secs(10));
        assert!(registry.rotate("t1").is_ok());
        clock.advance(Duration::from_millis(1));
        assert_eq!(registry.rotate("t1"), Err(RefreshRejection::Reused));
    }

    #[test]
    fn test_revoke_has_no_grace() {
        let (registry, _) = registry();
        registry.register("t1", "user", 10_000);

        assert!(registry.revoke("t1"));
        assert_eq!(registry.rotate("t1"), Err(RefreshRejection::Revoked));
        assert!(!registry.revoke("missing"));
        assert_eq!(registry.rotate("missing"), Err(RefreshRejection::Unknown));
    }

    #[test]
    fn test_revoke_subject() {
        let (registry, _) = registry();
        registry.register("a", "alice", 10_000);
        registry.register("b", "alice", 10_000);
        registry.register("c", "bob", 10_000);

        assert_eq!(registry.revoke_subject("alice"), 2);
        assert!(registry.rotate("c").is_ok());
    }

    #[test]
    fn test_purge_expired() {
        let (registry, _) = registry();
        // clock is at 1_000 seconds
        registry.register("old", "user", 999);
        registry.register("new", "user", 5_000);

        assert_eq!(registry.purge_expired(), 1);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.rotate("old"), Err(RefreshRejection::Unknown));
    }
}
