// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Portal auth service binary.

use anyhow::Context;
use portal_bin::error::report_error_and_exit;
use portal_bin::{commands, Cli};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse_args();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start the async runtime")?;

    if let Err(e) = runtime.block_on(commands::execute(cli)) {
        report_error_and_exit(e);
    }
    Ok(())
}
