// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Configuration loading.
//!
//! # Loading Pipeline
//!
//! 1. Read the file and pick the format from its extension
//! 2. Resolve `${VAR}` / `${VAR:default}` placeholders in the raw text
//! 3. Deserialize into [`PortalConfig`]
//! 4. Apply `PORTAL_*` environment overrides
//! 5. Validate
//!
//! # Environment Variable Override
//!
//! ```text
//! PORTAL_API_HOST=127.0.0.1
//! PORTAL_API_PORT=9090
//! PORTAL_API_BASE_PATH=/api
//! PORTAL_JWT_ACCESS_SECRET=...
//! PORTAL_JWT_REFRESH_SECRET=...
//! PORTAL_ALLOW_REGISTRATION=false
//! PORTAL_RATE_LIMIT_ENABLED=true
//! PORTAL_LOG_LEVEL=debug
//! PORTAL_LOG_FORMAT=json
//! ```

use crate::error::{ConfigError, ConfigResult};
use crate::schema::{LogFormat, LogLevel, PortalConfig};
use serde::de::DeserializeOwned;
use std::env;
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

// =============================================================================
// ConfigLoader
// =============================================================================

/// Configuration loader.
///
/// ```no_run
/// use portal_config::ConfigLoader;
///
/// let config = ConfigLoader::new().load("portal.yaml").unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Environment variable prefix.
    env_prefix: String,

    /// Whether placeholders and overrides are applied.
    resolve_env_vars: bool,

    /// Whether the result is validated.
    validate: bool,
}

impl ConfigLoader {
    /// Creates a new configuration loader with default settings.
    pub fn new() -> Self {
        Self {
            env_prefix: "PORTAL".to_string(),
            resolve_env_vars: true,
            validate: true,
        }
    }

    /// Creates a builder for configuring the loader.
    pub fn builder() -> ConfigLoaderBuilder {
        ConfigLoaderBuilder::new()
    }

    /// Sets the environment variable prefix.
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Enables or disables environment variable resolution.
    pub fn with_env_vars(mut self, enabled: bool) -> Self {
        self.resolve_env_vars = enabled;
        self
    }

    /// Enables or disables validation.
    pub fn with_validation(mut self, enabled: bool) -> Self {
        self.validate = enabled;
        self
    }

    /// Loads configuration from a file.
    ///
    /// The format is determined by the extension: `.yaml`/`.yml`, `.toml`
    /// or `.json`.
    pub fn load(&self, path: impl AsRef<Path>) -> ConfigResult<PortalConfig> {
        let path = path.as_ref();
        info!("Loading configuration from: {}", path.display());

        let content = self.read_file(path)?;
        let format = ConfigFormat::from_path(path)?;
        let config = self.process(&content, format).map_err(|e| match e {
            ConfigError::Serialization { message } => ConfigError::parse(path, message),
            other => other,
        })?;

        info!("Configuration loaded successfully");
        debug!(
            port = config.api.port,
            base_path = %config.api.base_path,
            registration = config.api.allow_registration,
            rate_limit = config.api.rate_limit.enabled,
            "Effective API settings"
        );

        Ok(config)
    }

    /// Loads configuration from a string.
    pub fn load_from_str(&self, content: &str, format: ConfigFormat) -> ConfigResult<PortalConfig> {
        self.process(content, format)
    }

    fn process(&self, content: &str, format: ConfigFormat) -> ConfigResult<PortalConfig> {
        let mut config: PortalConfig = if self.resolve_env_vars {
            parse_str(&self.resolve_env_placeholders(content), format)?
        } else {
            parse_str(content, format)?
        };

        if self.resolve_env_vars {
            self.apply_env_overrides(&mut config)?;
        }
        if self.validate {
            config.validate()?;
        }
        Ok(config)
    }

    fn read_file(&self, path: &Path) -> ConfigResult<String> {
        if !path.exists() {
            return Err(ConfigError::file_not_found(path));
        }

        fs::read_to_string(path).map_err(|e| ConfigError::io(path, e))
    }

    /// Resolves `${VAR_NAME}` and `${VAR_NAME:default}` placeholders.
    ///
    /// An unset variable without default is left in place.
    fn resolve_env_placeholders(&self, content: &str) -> String {
        let mut result = String::with_capacity(content.len());
        let mut rest = content;

        while let Some(start) = rest.find("${") {
            result.push_str(&rest[..start]);
            let after = &rest[start + 2..];

            let Some(end) = after.find('}') else {
                result.push_str(&rest[start..]);
                return result;
            };

            let placeholder = &after[..end];
            let (name, default) = match placeholder.split_once(':') {
                Some((name, default)) => (name, Some(default)),
                None => (placeholder, None),
            };

            match (env::var(name), default) {
                (Ok(value), _) => result.push_str(&value),
                (Err(_), Some(default)) => result.push_str(default),
                (Err(_), None) => {
                    warn!("Environment variable '{}' not found", name);
                    result.push_str(&rest[start..start + 2 + end + 1]);
                }
            }
            rest = &after[end + 1..];
        }

        result.push_str(rest);
        result
    }

    fn var(&self, suffix: &str) -> (String, Option<String>) {
        let name = format!("{}_{}", self.env_prefix, suffix);
        let value = env::var(&name).ok();
        (name, value)
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&self, config: &mut PortalConfig) -> ConfigResult<()> {
        if let (name, Some(value)) = self.var("API_HOST") {
            config.api.host = value
                .parse()
                .map_err(|_| ConfigError::invalid_env_var(name, "expected an IP address"))?;
        }
        if let (name, Some(value)) = self.var("API_PORT") {
            config.api.port = value
                .parse()
                .map_err(|_| ConfigError::invalid_env_var(name, "expected valid port number"))?;
        }
        if let (_, Some(value)) = self.var("API_BASE_PATH") {
            config.api.base_path = value;
        }

        if let (_, Some(value)) = self.var("JWT_ACCESS_SECRET") {
            config.api.jwt.access_secret = value;
        }
        if let (_, Some(value)) = self.var("JWT_REFRESH_SECRET") {
            config.api.jwt.refresh_secret = value;
        }

        if let (_, Some(value)) = self.var("ALLOW_REGISTRATION") {
            config.api.allow_registration = parse_bool(&value);
        }
        if let (_, Some(value)) = self.var("RATE_LIMIT_ENABLED") {
            config.api.rate_limit.enabled = parse_bool(&value);
        }

        if let (name, Some(value)) = self.var("LOG_LEVEL") {
            match LogLevel::parse(&value) {
                Some(level) => config.logging.level = level,
                None => warn!(variable = %name, value = %value, "Ignoring unknown log level"),
            }
        }
        if let (name, Some(value)) = self.var("LOG_FORMAT") {
            config.logging.format = parse_log_format(&value)
                .ok_or_else(|| ConfigError::invalid_env_var(name, "expected text, compact or json"))?;
        }

        Ok(())
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// ConfigLoaderBuilder
// =============================================================================

/// Builder for [`ConfigLoader`].
#[derive(Debug, Default)]
pub struct ConfigLoaderBuilder {
    env_prefix: Option<String>,
    resolve_env_vars: Option<bool>,
    validate: Option<bool>,
}

impl ConfigLoaderBuilder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the environment prefix.
    pub fn env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = Some(prefix.into());
        self
    }

    /// Enables or disables environment variable resolution.
    pub fn resolve_env_vars(mut self, enabled: bool) -> Self {
        self.resolve_env_vars = Some(enabled);
        self
    }

    /// Enables or disables validation.
    pub fn validate(mut self, enabled: bool) -> Self {
        self.validate = Some(enabled);
        self
    }

    /// Builds the loader.
    pub fn build(self) -> ConfigLoader {
        let mut loader = ConfigLoader::new();

        if let Some(prefix) = self.env_prefix {
            loader.env_prefix = prefix;
        }
        if let Some(resolve_env_vars) = self.resolve_env_vars {
            loader.resolve_env_vars = resolve_env_vars;
        }
        if let Some(validate) = self.validate {
            loader.validate = validate;
        }

        loader
    }
}

// =============================================================================
// ConfigFormat
// =============================================================================

/// Supported configuration file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// YAML format.
    Yaml,
    /// TOML format.
    Toml,
    /// JSON format.
    Json,
}

impl ConfigFormat {
    /// Determines the format from a file path.
    pub fn from_path(path: &Path) -> ConfigResult<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase());

        match ext.as_deref() {
            Some("yaml") | Some("yml") => Ok(ConfigFormat::Yaml),
            Some("toml") => Ok(ConfigFormat::Toml),
            Some("json") => Ok(ConfigFormat::Json),
            Some(other) => Err(ConfigError::unsupported_format(other)),
            None => Err(ConfigError::unsupported_format("(no extension)")),
        }
    }

    /// Returns the file extension for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            ConfigFormat::Yaml => "yaml",
            ConfigFormat::Toml => "toml",
            ConfigFormat::Json => "json",
        }
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

fn parse_str<T: DeserializeOwned>(content: &str, format: ConfigFormat) -> ConfigResult<T> {
    match format {
        ConfigFormat::Yaml => yaml_parse(content),
        ConfigFormat::Toml => {
            toml::from_str(content).map_err(|e| ConfigError::serialization(e.to_string()))
        }
        ConfigFormat::Json => {
            serde_json::from_str(content).map_err(|e| ConfigError::serialization(e.to_string()))
        }
    }
}

/// YAML goes through the `config` crate.
fn yaml_parse<T: DeserializeOwned>(content: &str) -> ConfigResult<T> {
    let config = config::Config::builder()
        .add_source(config::File::from_str(content, config::FileFormat::Yaml))
        .build()
        .map_err(|e| ConfigError::serialization(e.to_string()))?;

    config
        .try_deserialize()
        .map_err(|e| ConfigError::serialization(e.to_string()))
}

fn parse_bool(value: &str) -> bool {
    matches!(
        value.to_lowercase().as_str(),
        "true" | "1" | "yes" | "on" | "enabled"
    )
}

fn parse_log_format(value: &str) -> Option<LogFormat> {
    match value.to_lowercase().as_str() {
        "text" | "pretty" => Some(LogFormat::Text),
        "compact" => Some(LogFormat::Compact),
        "json" => Some(LogFormat::Json),
        _ => None,
    }
}

// =============================================================================
// Convenience Functions
// =============================================================================

/// Loads configuration from a file with default settings.
pub fn load_config(path: impl AsRef<Path>) -> ConfigResult<PortalConfig> {
    ConfigLoader::new().load(path)
}

/// Loads configuration from a string with the specified format.
pub fn load_config_str(content: &str, format: ConfigFormat) -> ConfigResult<PortalConfig> {
    ConfigLoader::new().load_from_str(content, format)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::time::Duration;
    use tempfile::NamedTempFile;

    const YAML: &str = r#"
api:
  host: 127.0.0.1
  port: 9000
  base_path: /api
  allow_registration: true
  jwt:
    access_secret: access-secret-access-secret-0123
    refresh_secret: refresh-secret-refresh-secret-01
    access_ttl_secs: 600
  rate_limit:
    max_requests: 5
    window: 30

logging:
  level: debug
  format: json
"#;

    // Each test uses its own prefix so parallel tests never see each other's variables.
    fn isolated(prefix: &str) -> ConfigLoader {
        ConfigLoader::new().with_env_prefix(prefix)
    }

    #[test]
    fn test_load_yaml() {
        let mut file = NamedTempFile::with_suffix(".yaml").unwrap();
        file.write_all(YAML.as_bytes()).unwrap();

        let config = isolated("PORTAL_TEST_YAML").load(file.path()).unwrap();

        assert_eq!(config.api.port, 9000);
        assert_eq!(config.api.host.to_string(), "127.0.0.1");
        assert!(config.api.allow_registration);
        assert_eq!(config.api.jwt.access_ttl_secs, 600);
        assert_eq!(config.api.rate_limit.max_requests, 5);
        assert_eq!(config.api.rate_limit.window, Duration::from_secs(30));
        assert_eq!(config.logging.level, LogLevel::Debug);
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_load_toml() {
        let toml = r#"
[api]
port = 8181

[api.jwt]
access_secret = "access-secret-access-secret-0123"
refresh_secret = "refresh-secret-refresh-secret-01"

[logging]
level = "warn"
"#;
        let mut file = NamedTempFile::with_suffix(".toml").unwrap();
        file.write_all(toml.as_bytes()).unwrap();

        let config = isolated("PORTAL_TEST_TOML").load(file.path()).unwrap();
        assert_eq!(config.api.port, 8181);
        assert_eq!(config.api.base_path, "/api");
        assert_eq!(config.logging.level, LogLevel::Warn);
    }

    #[test]
    fn test_load_json_from_str() {
        let json = r#"{"api": {"jwt": {"access_secret": "a-secret", "refresh_secret": "r-secret"}}}"#;
        let config = isolated("PORTAL_TEST_JSON")
            .load_from_str(json, ConfigFormat::Json)
            .unwrap();
        assert_eq!(config.api.jwt.refresh_secret, "r-secret");
        assert_eq!(config.api.port, 8080);
    }

    #[test]
    fn test_missing_secrets_fail_validation() {
        let err = isolated("PORTAL_TEST_NOSECRET")
            .load_from_str("api:\n  port: 8080\n", ConfigFormat::Yaml)
            .unwrap_err();
        assert!(matches!(err, ConfigError::Validation { .. }));

        let unvalidated = ConfigLoader::builder()
            .env_prefix("PORTAL_TEST_NOSECRET")
            .validate(false)
            .build()
            .load_from_str("api:\n  port: 8080\n", ConfigFormat::Yaml);
        assert!(unvalidated.is_ok());
    }

    #[test]
    fn test_identical_secrets_fail_validation() {
        let json = r#"{"api": {"jwt": {"access_secret": "same", "refresh_secret": "same"}}}"#;
        let err = isolated("PORTAL_TEST_SAME")
            .load_from_str(json, ConfigFormat::Json)
            .unwrap_err();
        assert!(err.to_string().contains("must differ"));
    }

    #[test]
    fn test_env_overrides() {
        env::set_var("PORTAL_TEST_OVR_API_PORT", "7070");
        env::set_var("PORTAL_TEST_OVR_JWT_ACCESS_SECRET", "from-env-access");
        env::set_var("PORTAL_TEST_OVR_ALLOW_REGISTRATION", "no");
        env::set_var("PORTAL_TEST_OVR_LOG_LEVEL", "error");

        let config = isolated("PORTAL_TEST_OVR")
            .load_from_str(YAML, ConfigFormat::Yaml)
            .unwrap();

        assert_eq!(config.api.port, 7070);
        assert_eq!(config.api.jwt.access_secret, "from-env-access");
        assert!(!config.api.allow_registration);
        assert_eq!(config.logging.level, LogLevel::Error);
    }

    #[test]
    fn test_invalid_port_override() {
        env::set_var("PORTAL_TEST_BADPORT_API_PORT", "not-a-port");
        let err = isolated("PORTAL_TEST_BADPORT")
            .load_from_str(YAML, ConfigFormat::Yaml)
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar { ref name, .. } if name == "PORTAL_TEST_BADPORT_API_PORT"));
    }

    #[test]
    fn test_placeholders() {
        env::set_var("PORTAL_TEST_PLACEHOLDER_SECRET", "resolved");
        let loader = ConfigLoader::new();

        assert_eq!(
            loader.resolve_env_placeholders("secret: ${PORTAL_TEST_PLACEHOLDER_SECRET}"),
            "secret: resolved"
        );
        assert_eq!(
            loader.resolve_env_placeholders("secret: ${PORTAL_TEST_UNSET_VAR:fallback}"),
            "secret: fallback"
        );
        assert_eq!(
            loader.resolve_env_placeholders("secret: ${PORTAL_TEST_UNSET_VAR}"),
            "secret: ${PORTAL_TEST_UNSET_VAR}"
        );
        assert_eq!(loader.resolve_env_placeholders("cost: ${unterminated"), "cost: ${unterminated");
        assert_eq!(loader.resolve_env_placeholders("price: $5"), "price: $5");
    }

    #[test]
    fn test_placeholder_disabled() {
        let yaml = "api:\n  base_path: ${PORTAL_TEST_UNUSED:/v1}\n";
        let config = ConfigLoader::builder()
            .resolve_env_vars(false)
            .validate(false)
            .build()
            .load_from_str(yaml, ConfigFormat::Yaml)
            .unwrap();
        assert_eq!(config.api.base_path, "${PORTAL_TEST_UNUSED:/v1}");
    }

    #[test]
    fn test_config_format_from_path() {
        assert_eq!(ConfigFormat::from_path(Path::new("portal.yml")).unwrap(), ConfigFormat::Yaml);
        assert_eq!(ConfigFormat::from_path(Path::new("portal.TOML")).unwrap(), ConfigFormat::Toml);
        assert_eq!(ConfigFormat::from_path(Path::new("portal.json")).unwrap(), ConfigFormat::Json);
        assert!(ConfigFormat::from_path(Path::new("portal.ini")).is_err());
        assert!(ConfigFormat::from_path(Path::new("portal")).is_err());
    }

    #[test]
    fn test_file_not_found() {
        let result = ConfigLoader::new().load("/nonexistent/path/portal.yaml");
        assert!(matches!(result, Err(ConfigError::FileNotFound { .. })));
    }

    #[test]
    fn test_parse_error_carries_path() {
        let mut file = NamedTempFile::with_suffix(".json").unwrap();
        file.write_all(b"{ not json").unwrap();

        let err = isolated("PORTAL_TEST_PARSE").load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_parse_bool() {
        assert!(parse_bool("true"));
        assert!(parse_bool("ON"));
        assert!(parse_bool("enabled"));
        assert!(!parse_bool("false"));
        assert!(!parse_bool("0"));
    }
}
