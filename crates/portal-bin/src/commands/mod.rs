// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! CLI command implementations.

mod hash_password;
mod serve;
mod token;
mod validate;
mod version;

pub use hash_password::hash_password;
pub use serve::serve;
pub use token::{issue_token, verify_token};
pub use validate::validate;
pub use version::version;

use portal_config::{ConfigLoader, PortalConfig};

use crate::cli::{Cli, Commands, TokenCommands};
use crate::error::BinResult;
use crate::logging::init_logging;

/// Executes the command selected on the command line.
pub async fn execute(cli: Cli) -> BinResult<()> {
    let command = cli.effective_command();

    // `serve` initializes logging itself once the config file is read.
    if !matches!(command, Commands::Serve(_)) {
        init_logging(&cli.effective_log_level(None), cli.effective_log_format(None));
    }

    match command {
        Commands::Serve(args) => serve::serve(&cli, args).await,
        Commands::Validate(args) => validate::validate(&cli, args),
        Commands::Token(TokenCommands::Issue(args)) => token::issue_token(&cli, args),
        Commands::Token(TokenCommands::Verify(args)) => token::verify_token(&cli, args),
        Commands::HashPassword(args) => hash_password::hash_password(&cli, args),
        Commands::Version => version::version(&cli),
    }
}

/// Loads and validates the configuration file named on the command line.
pub(crate) fn load(cli: &Cli) -> BinResult<PortalConfig> {
    Ok(ConfigLoader::new().load(&cli.config)?)
}
