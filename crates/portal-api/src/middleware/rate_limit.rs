// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Per-IP rate limiting for the authentication routes.

use std::future::Future;
use std::net::{IpAddr, SocketAddr};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::Request,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tower::{Layer, Service};

use crate::config::duration_secs;
use crate::error::ApiError;

// =============================================================================
// RateLimitConfig
// =============================================================================

/// Configuration for rate limiting.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Whether rate limiting is enabled.
    pub enabled: bool,
    /// Requests allowed per client per window.
    pub max_requests: u32,
    /// Window length.
    #[serde(with = "duration_secs")]
    pub window: Duration,
    /// Tracked clients above which stale windows are swept.
    pub max_tracked_clients: usize,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_requests: 20,
            window: Duration::from_secs(60),
            max_tracked_clients: 10_000,
        }
    }
}

impl RateLimitConfig {
    /// Creates a disabled rate limiter.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }

    /// Creates a limiter allowing `max_requests` per `window`.
    pub fn per_window(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            ..Default::default()
        }
    }
}

// =============================================================================
// Rate Limiter State
// =============================================================================

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
}

/// Shared state for the rate limiter.
#[derive(Debug)]
pub struct RateLimiterState {
    config: RateLimitConfig,
    windows: DashMap<IpAddr, Window>,
}

impl RateLimiterState {
    /// Creates a new rate limiter state.
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            windows: DashMap::new(),
        }
    }

    /// Checks if a request from `client_ip` is allowed.
    pub fn check(&self, client_ip: Option<IpAddr>) -> RateLimitResult {
        self.check_at(client_ip, Instant::now())
    }

    /// Checks a request as if it arrived at `now`.
    pub fn check_at(&self, client_ip: Option<IpAddr>, now: Instant) -> RateLimitResult {
        if !self.config.enabled {
            return RateLimitResult::Allowed;
        }
        // Without a peer address there is nothing to key on.
        let Some(ip) = client_ip else {
            return RateLimitResult::Allowed;
        };

        if self.windows.len() > self.config.max_tracked_clients {
            self.cleanup_at(now);
        }

        let mut window = self.windows.entry(ip).or_insert(Window {
            started: now,
            count: 0,
        });

        if now.saturating_duration_since(window.started) >= self.config.window {
            window.started = now;
            window.count = 0;
        }

        if window.count < self.config.max_requests {
            window.count += 1;
            return RateLimitResult::Allowed;
        }

        let remaining = self
            .config
            .window
            .saturating_sub(now.saturating_duration_since(window.started));
        RateLimitResult::Limited {
            retry_after: remaining.as_secs().max(1),
        }
    }

    /// Drops windows that have already ended.
    pub fn cleanup(&self) {
        self.cleanup_at(Instant::now());
    }

    fn cleanup_at(&self, now: Instant) {
        let window = self.config.window;
        self.windows
            .retain(|_, w| now.saturating_duration_since(w.started) < window);
    }

    /// Returns the number of tracked clients.
    pub fn tracked_clients(&self) -> usize {
        self.windows.len()
    }
}

/// Result of a rate limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitResult {
    /// Request is allowed.
    Allowed,
    /// Request is rate limited.
    Limited {
        /// Seconds until the client can retry.
        retry_after: u64,
    },
}

// =============================================================================
// RateLimitLayer
// =============================================================================

/// Layer for rate limiting.
#[derive(Clone)]
pub struct RateLimitLayer {
    state: Arc<RateLimiterState>,
}

impl RateLimitLayer {
    /// Creates a new rate limit layer.
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            state: Arc::new(RateLimiterState::new(config)),
        }
    }

    /// Creates a disabled rate limit layer.
    pub fn disabled() -> Self {
        Self::new(RateLimitConfig::disabled())
    }

    /// Returns the shared state.
    pub fn state(&self) -> Arc<RateLimiterState> {
        self.state.clone()
    }
}

impl<S> Layer<S> for RateLimitLayer {
    type Service = RateLimitMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RateLimitMiddleware {
            inner,
            state: self.state.clone(),
        }
    }
}

// =============================================================================
// RateLimitMiddleware
// =============================================================================

/// Middleware for rate limiting.
#[derive(Clone)]
pub struct RateLimitMiddleware<S> {
    inner: S,
    state: Arc<RateLimiterState>,
}

impl<S> Service<Request<Body>> for RateLimitMiddleware<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let state = self.state.clone();
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let client_ip = req
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ci| ci.0.ip());

            match state.check(client_ip) {
                RateLimitResult::Allowed => inner.call(req).await,
                RateLimitResult::Limited { retry_after } => {
                    tracing::warn!(
                        target: "portal::audit",
                        client_ip = ?client_ip,
                        path = %req.uri().path(),
                        retry_after = retry_after,
                        "Rate limit exceeded"
                    );
                    Ok(ApiError::rate_limit_exceeded(Some(retry_after)).into_response())
                }
            }
        })
    }
}

// =============================================================================
// Tests
// =============================================================================
