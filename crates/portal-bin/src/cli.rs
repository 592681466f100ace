// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! CLI argument parsing and command definitions.
//!
//! - `serve`: Start the auth service (default)
//! - `validate`: Validate the configuration file
//! - `token issue` / `token verify`: Mint or inspect tokens with the configured secrets
//! - `hash-password`: Produce an Argon2 hash for `bootstrap_admin.password_hash`
//! - `version`: Show version information

use std::net::IpAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use portal_config::LoggingConfig;
use portal_core::TokenKind;

// =============================================================================
// Main CLI Structure
// =============================================================================

/// Portal auth service
///
/// Issues and verifies JWT sessions for the marketing site admin backend.
#[derive(Parser, Debug)]
#[command(
    name = "portal",
    author = "Sylvex <contact@sylvex.io>",
    version = portal_api::VERSION,
    about = "Authentication service for the portal admin backend",
    long_about = None,
    propagate_version = true
)]
pub struct Cli {
    /// Configuration file path
    #[arg(
        short,
        long,
        default_value = "portal.yaml",
        env = "PORTAL_CONFIG",
        global = true
    )]
    pub config: PathBuf,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(short, long, env = "PORTAL_LOG_LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Log format; overrides the config file
    #[arg(long, env = "PORTAL_LOG_FORMAT", global = true)]
    pub log_format: Option<LogFormat>,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Log at debug level
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

// =============================================================================
// Subcommands
// =============================================================================

/// Available subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Start the HTTP server
    ///
    /// This is the default command when no subcommand is specified.
    Serve(ServeArgs),

    /// Validate the configuration file
    ///
    /// Loads, resolves and validates the configuration without binding a port.
    Validate(ValidateArgs),

    /// Issue or verify tokens with the configured secrets
    #[command(subcommand)]
    Token(TokenCommands),

    /// Hash a password with Argon2
    #[command(name = "hash-password")]
    HashPassword(HashPasswordArgs),

    /// Show detailed version information
    Version,
}

/// Token subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum TokenCommands {
    /// Issue an access token
    ///
    /// Refresh tokens are only issued by a running server, which tracks them.
    Issue(TokenIssueArgs),

    /// Verify a token and print its claims
    Verify(TokenVerifyArgs),
}

// =============================================================================
// Command Arguments
// =============================================================================

/// Arguments for the `serve` command.
#[derive(Args, Debug, Default, Clone)]
pub struct ServeArgs {
    /// Bind address, overriding `api.host`
    #[arg(long)]
    pub host: Option<IpAddr>,

    /// Port, overriding `api.port`
    #[arg(short, long)]
    pub port: Option<u16>,
}

/// Arguments for the `validate` command.
#[derive(Args, Debug, Default, Clone)]
pub struct ValidateArgs {
    /// Print the parsed configuration (secrets omitted)
    #[arg(short, long)]
    pub show_config: bool,

    /// Output format for validation results
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,

    /// Treat warnings as errors
    #[arg(long)]
    pub strict: bool,
}

/// Arguments for `token issue`.
#[derive(Args, Debug, Clone)]
pub struct TokenIssueArgs {
    /// Subject (user id)
    pub subject: String,

    /// Role to grant; repeat or comma-separate for several
    #[arg(short, long = "role", value_delimiter = ',')]
    pub roles: Vec<String>,

    /// Extra permission (`resource:action`); repeatable
    #[arg(short, long = "permission", value_delimiter = ',')]
    pub permissions: Vec<String>,

    /// Email claim
    #[arg(long)]
    pub email: Option<String>,

    /// Output format
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,
}

/// Arguments for `token verify`.
#[derive(Args, Debug, Clone)]
pub struct TokenVerifyArgs {
    /// The encoded token
    pub token: String,

    /// Which kind of token to expect
    #[arg(short, long, default_value = "access")]
    pub kind: TokenKindArg,

    /// Output format
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,
}

/// Arguments for `hash-password`.
#[derive(Args, Debug, Clone)]
pub struct HashPasswordArgs {
    /// Password to hash
    #[arg(required_unless_present = "stdin")]
    pub password: Option<String>,

    /// Read the password from stdin
    #[arg(long)]
    pub stdin: bool,
}

// =============================================================================
// Enums
// =============================================================================

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// JSON format for structured logging
    Json,
    /// Compact format for minimal output
    Compact,
}

impl From<portal_config::LogFormat> for LogFormat {
    fn from(format: portal_config::LogFormat) -> Self {
        match format {
            portal_config::LogFormat::Text => LogFormat::Text,
            portal_config::LogFormat::Json => LogFormat::Json,
            portal_config::LogFormat::Compact => LogFormat::Compact,
        }
    }
}

/// Output format for command results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// JSON format for programmatic parsing
    Json,
}

/// Token kind as a CLI value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum TokenKindArg {
    /// Access token
    #[default]
    Access,
    /// Refresh token
    Refresh,
}

impl From<TokenKindArg> for TokenKind {
    fn from(kind: TokenKindArg) -> Self {
        match kind {
            TokenKindArg::Access => TokenKind::Access,
            TokenKindArg::Refresh => TokenKind::Refresh,
        }
    }
}

// =============================================================================
// Helper Methods
// =============================================================================

impl Cli {
    /// Parse CLI arguments from the command line.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Get the effective command, defaulting to `Serve`.
    pub fn effective_command(&self) -> Commands {
        self.command
            .clone()
            .unwrap_or_else(|| Commands::Serve(ServeArgs::default()))
    }

    /// Get the effective log level.
    ///
    /// `--quiet` and `--verbose` win, then `--log-level`, then the config file.
    pub fn effective_log_level(&self, file: Option<&LoggingConfig>) -> String {
        if self.quiet {
            "warn".to_string()
        } else if self.verbose {
            "debug".to_string()
        } else if let Some(level) = &self.log_level {
            level.clone()
        } else {
            file.map(|l| l.level.as_str())
                .unwrap_or("info")
                .to_string()
        }
    }

    /// Get the effective log format.
    pub fn effective_log_format(&self, file: Option<&LoggingConfig>) -> LogFormat {
        self.log_format
            .or_else(|| file.map(|l| l.format.into()))
            .unwrap_or_default()
    }
}

// =============================================================================
// Tests
// =============================================================================
