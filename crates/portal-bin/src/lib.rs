// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # portal-bin
//!
//! CLI for the portal auth service.
//!
//! - CLI argument parsing with clap
//! - Logging initialization
//! - Graceful shutdown on SIGINT/SIGTERM
//! - Commands: `serve`, `validate`, `token issue`, `token verify`,
//!   `hash-password`, `version`
//!
//! ## Usage
//!
//! ```bash
//! # Start the server (default command)
//! portal -c /etc/portal/portal.yaml
//!
//! # Check a configuration file
//! portal validate --strict
//!
//! # Hash a password for the bootstrap admin
//! portal hash-password --stdin < password.txt
//!
//! # Mint an access token for manual testing
//! portal token issue u-1 --role editor
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod cli;
pub mod commands;
pub mod error;
pub mod logging;
pub mod shutdown;

pub use cli::{Cli, Commands};
pub use error::{BinError, BinResult};
pub use logging::init_logging;
pub use shutdown::ShutdownCoordinator;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
