// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Client error types.

use portal_core::ErrorPayload;
use thiserror::Error;

/// Result type alias for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors returned by [`crate::ApiClient`].
///
/// Callers branch on [`ClientError::status`], never on message text.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The server answered with a non-2xx status.
    #[error("API error {status}{}", .payload.as_ref().map(|p| format!(": {} ({})", p.message, p.code)).unwrap_or_default())]
    Api {
        /// HTTP status code.
        status: u16,
        /// Parsed `error` object, when the body had one.
        payload: Option<ErrorPayload>,
    },

    /// The refresh token was rejected; the session has been cleared.
    #[error("Session expired")]
    SessionExpired,

    /// The request never produced a response.
    #[error("Transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
    },

    /// A response body could not be decoded.
    #[error("Decode error: {message}")]
    Decode {
        /// Error message.
        message: String,
    },

    /// Client configuration is invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Error message.
        message: String,
    },
}

impl ClientError {
    /// Creates an API error.
    pub fn api(status: u16, payload: Option<ErrorPayload>) -> Self {
        Self::Api { status, payload }
    }

    /// Creates a transport error.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Creates a decode error.
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Returns the HTTP status, if the server answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns `true` for a 401 answer.
    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }

    /// Returns `true` if the session has to be re-established by logging in.
    pub fn is_session_expired(&self) -> bool {
        matches!(self, ClientError::SessionExpired)
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        ClientError::transport(err.to_string())
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        ClientError::decode(err.to_string())
    }
}
