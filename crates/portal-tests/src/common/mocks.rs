// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Mock Implementations
//!
//! Observers and transports that record what the client does.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use portal_client::{ClientResult, HttpRequest, HttpResponse, HttpTransport, SessionObserver};

// =============================================================================
// RecordingObserver
// =============================================================================

/// Counts session expiry notifications.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    expired: AtomicUsize,
}

impl RecordingObserver {
    /// Creates a new observer.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Number of `on_session_expired` calls so far.
    pub fn expired_count(&self) -> usize {
        self.expired.load(Ordering::SeqCst)
    }
}

impl SessionObserver for RecordingObserver {
    fn on_session_expired(&self) {
        self.expired.fetch_add(1, Ordering::SeqCst);
    }
}

// =============================================================================
// CountingTransport
// =============================================================================

/// Wraps a transport and counts requests per path.
pub struct CountingTransport {
    inner: Arc<dyn HttpTransport>,
    counts: Mutex<HashMap<String, usize>>,
    statuses: Mutex<Vec<(String, u16)>>,
}

impl CountingTransport {
    /// Wraps `inner`.
    pub fn new(inner: Arc<dyn HttpTransport>) -> Arc<Self> {
        Arc::new(Self {
            inner,
            counts: Mutex::new(HashMap::new()),
            statuses: Mutex::new(Vec::new()),
        })
    }

    /// Requests sent to `path` so far.
    pub fn count(&self, path: &str) -> usize {
        self.counts.lock().get(path).copied().unwrap_or(0)
    }

    /// Requests sent so far.
    pub fn total(&self) -> usize {
        self.counts.lock().values().sum()
    }

    /// `(path, status)` of every answered request, in completion order.
    pub fn statuses(&self) -> Vec<(String, u16)> {
        self.statuses.lock().clone()
    }

    /// Forgets everything recorded so far.
    pub fn reset(&self) {
        self.counts.lock().clear();
        self.statuses.lock().clear();
    }
}

#[async_trait]
impl HttpTransport for CountingTransport {
    async fn send(&self, request: HttpRequest) -> ClientResult<HttpResponse> {
        let path = request.path.clone();
        *self.counts.lock().entry(path.clone()).or_insert(0) += 1;

        let response = self.inner.send(request).await?;
        self.statuses.lock().push((path, response.status));
        Ok(response)
    }
}
