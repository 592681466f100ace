// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `version` command.

use crate::cli::Cli;
use crate::error::BinResult;

/// Prints component versions.
pub fn version(_cli: &Cli) -> BinResult<()> {
    println!("portal - authentication service for the portal admin backend");
    println!();
    println!("Version Information:");
    println!("  portal-bin:    {}", crate::VERSION);
    println!("  portal-core:   {}", portal_core::VERSION);
    println!("  portal-api:    {}", portal_api::VERSION);
    println!("  portal-config: {}", portal_config::VERSION);
    println!();
    println!("Build Information:");
    println!("  Target:        {}", std::env::consts::ARCH);
    println!("  OS:            {}", std::env::consts::OS);
    println!();
    println!("License: PolyForm Noncommercial License 1.0.0");
    println!("Copyright (c) 2025 Sylvex. All rights reserved.");

    Ok(())
}
