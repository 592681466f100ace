// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `serve` command.

use portal_api::{ApiResult, ApiServerBuilder};
use tracing::{info, warn};

use crate::cli::{Cli, ServeArgs};
use crate::error::{BinError, BinResult};
use crate::logging::init_logging;
use crate::shutdown::ShutdownCoordinator;

/// Runs the HTTP server until SIGINT/SIGTERM.
pub async fn serve(cli: &Cli, args: ServeArgs) -> BinResult<()> {
    let mut config = super::load(cli)?;

    init_logging(
        &cli.effective_log_level(Some(&config.logging)),
        cli.effective_log_format(Some(&config.logging)),
    );

    if let Some(host) = args.host {
        config.api.host = host;
    }
    if let Some(port) = args.port {
        config.api.port = port;
    }

    info!(
        version = crate::VERSION,
        config = %cli.config.display(),
        "Starting portal auth service"
    );

    let shutdown_timeout = config.api.shutdown_timeout;
    let server = ApiServerBuilder::new().config(config.api).build()?;

    let coordinator = ShutdownCoordinator::new();
    let mut handle = tokio::spawn(server.run_with_shutdown(coordinator.shutdown_signal()));

    tokio::select! {
        // Server stopped on its own, e.g. the port was taken.
        result = &mut handle => return joined(result),
        _ = coordinator.wait_for_shutdown() => {}
    }

    info!(timeout_secs = shutdown_timeout.as_secs(), "Draining connections");
    match tokio::time::timeout(shutdown_timeout, &mut handle).await {
        Ok(result) => joined(result),
        Err(_) => {
            warn!("Graceful shutdown timed out, aborting open connections");
            handle.abort();
            Ok(())
        }
    }
}

fn joined(result: Result<ApiResult<()>, tokio::task::JoinError>) -> BinResult<()> {
    match result {
        Ok(served) => served.map_err(BinError::from),
        Err(e) => Err(BinError::runtime(format!("Server task failed: {}", e))),
    }
}

