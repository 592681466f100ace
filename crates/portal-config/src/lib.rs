// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # portal-config
//!
//! Configuration file handling for the portal auth service.
//!
//! ## Features
//!
//! - **Multi-Format Support**: YAML, TOML, and JSON configuration files
//! - **Placeholders**: `${VAR}` and `${VAR:default}` resolved from the environment
//! - **Environment Overrides**: `PORTAL_*` variables win over file values
//! - **Validation**: secrets, token lifetimes and paths checked before startup
//!
//! ## Quick Start
//!
//! ```no_run
//! use portal_config::load_config;
//!
//! let config = load_config("portal.yaml").unwrap();
//! println!("Listening on {}", config.api.socket_addr());
//! ```
//!
//! ## Configuration Schema
//!
//! - `api` - HTTP server, JWT, CORS, rate limiting and registration settings
//! - `logging` - Log level and output format

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod error;
pub mod loader;
pub mod schema;

pub use error::{ConfigError, ConfigResult};
pub use loader::{load_config, load_config_str, ConfigFormat, ConfigLoader, ConfigLoaderBuilder};
pub use schema::{LogFormat, LogLevel, LoggingConfig, PortalConfig};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
