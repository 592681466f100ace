// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `validate` command.

use portal_config::PortalConfig;

use crate::cli::{Cli, OutputFormat, ValidateArgs};
use crate::error::{BinError, BinResult};

const RECOMMENDED_SECRET_LEN: usize = 32;

/// Loads and validates the configuration, then prints a summary.
pub fn validate(cli: &Cli, args: ValidateArgs) -> BinResult<()> {
    let config_path = &cli.config;
    let config = super::load(cli)
        .map_err(|e| e.with_context("Configuration validation failed"))?;
    let warnings = collect_warnings(&config);

    match args.format {
        OutputFormat::Text => {
            println!("✓ Configuration is valid: {}", config_path.display());
            println!();
            println!("Summary:");
            println!("  Listen:        {}", config.api.socket_addr());
            println!("  Base path:     {}", display_base_path(&config));
            println!("  Access TTL:    {}s", config.api.jwt.access_ttl_secs);
            println!("  Refresh TTL:   {}s", config.api.jwt.refresh_ttl_secs);
            println!("  Registration:  {}", enabled(config.api.allow_registration));
            println!("  Rate limit:    {}", enabled(config.api.rate_limit.enabled));
            println!("  Bootstrap:     {}", config.api.bootstrap_admin.as_ref().map(|a| a.email.as_str()).unwrap_or("(none)"));

            if !warnings.is_empty() {
                println!();
                println!("Warnings:");
                for warning in &warnings {
                    println!("  ⚠ {}", warning);
                }
            }

            if args.show_config {
                println!();
                println!("Parsed configuration:");
                println!("{}", to_json(&config)?);
            }
        }
        OutputFormat::Json => {
            let output = serde_json::json!({
                "valid": true,
                "config_path": config_path.display().to_string(),
                "summary": {
                    "listen": config.api.socket_addr().to_string(),
                    "base_path": config.api.base_path,
                    "access_ttl_secs": config.api.jwt.access_ttl_secs,
                    "refresh_ttl_secs": config.api.jwt.refresh_ttl_secs,
                    "allow_registration": config.api.allow_registration,
                    "rate_limit_enabled": config.api.rate_limit.enabled,
                },
                "warnings": warnings,
                "config": if args.show_config { Some(&config) } else { None },
            });
            println!("{}", to_json(&output)?);
        }
    }

    if args.strict && !warnings.is_empty() {
        return Err(BinError::config(format!(
            "Strict mode: {} warning(s) found",
            warnings.len()
        )));
    }

    Ok(())
}

/// Issues that do not stop the server from starting.
pub(crate) fn collect_warnings(config: &PortalConfig) -> Vec<String> {
    let api = &config.api;
    let mut warnings = Vec::new();

    for (name, secret) in [
        ("access", &api.jwt.access_secret),
        ("refresh", &api.jwt.refresh_secret),
    ] {
        if secret.len() < RECOMMENDED_SECRET_LEN {
            warnings.push(format!(
                "JWT {} secret is shorter than {} bytes",
                name, RECOMMENDED_SECRET_LEN
            ));
        }
    }
    if api.bootstrap_admin.is_none() {
        warnings.push("No bootstrap_admin configured; nobody can log in to a fresh server".to_string());
    }
    if api.allow_registration {
        warnings.push("Self-registration is open".to_string());
    }
    if !api.rate_limit.enabled {
        warnings.push("Rate limiting of /auth endpoints is disabled".to_string());
    }
    if api.cors.allows_any_origin() && api.cors.allow_credentials {
        warnings.push("CORS allow_credentials is ignored while any origin is allowed".to_string());
    }

    warnings
}

fn display_base_path(config: &PortalConfig) -> &str {
    if config.api.base_path.is_empty() {
        "(root)"
    } else {
        &config.api.base_path
    }
}

fn enabled(flag: bool) -> &'static str {
    if flag {
        "enabled"
    } else {
        "disabled"
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> BinResult<String> {
    serde_json::to_string_pretty(value).map_err(|e| BinError::runtime(e.to_string()))
}
