//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::GatewayConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load, override and validate configuration.
///
/// With no path the built-in defaults are used as the base. Environment
/// overrides are applied on top of either.
pub fn load_config(path: Option<&Path>) -> Result<GatewayConfig, ConfigError> {
    let config = match path {
        Some(path) => parse_config(&fs::read_to_string(path)?)?,
        None => GatewayConfig::default(),
    };
    finish(config, |name| std::env::var(name).ok())
}

/// Parse a TOML document without validating it.
pub fn parse_config(content: &str) -> Result<GatewayConfig, ConfigError> {
    Ok(toml::from_str(content)?)
}

fn finish<F>(mut config: GatewayConfig, lookup: F) -> Result<GatewayConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut errors = apply_env_overrides(&mut config, lookup);
    if let Err(mut invalid) = validate_config(&config) {
        errors.append(&mut invalid);
    }
    if errors.is_empty() {
        Ok(config)
    } else {
        Err(ConfigError::Validation(errors))
    }
}

/// Apply `APP_*`, `HTTP_*`, `PRODUCT_*`, `BACKEND_*` and `LOG_LEVEL` overrides.
///
/// Returns parse failures instead of aborting so they are reported together
/// with the semantic checks.
pub fn apply_env_overrides<F>(config: &mut GatewayConfig, lookup: F) -> Vec<ValidationError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut errors = Vec::new();

    if let Some(v) = lookup("APP_NAME") {
        config.app.name = v;
    }
    if let Some(v) = lookup("APP_VERSION") {
        config.app.version = v;
    }
    if let Some(v) = lookup("HTTP_HOST") {
        config.listener.host = v;
    }
    if let Some(v) = lookup("HTTP_PORT") {
        match v.parse() {
            Ok(port) => config.listener.port = port,
            Err(_) => errors.push(ValidationError::InvalidEnvOverride {
                name: "HTTP_PORT",
                value: v,
            }),
        }
    }
    if let Some(v) = lookup("BACKEND_TRANSPORT") {
        config.backend.transport = v;
    }
    if let Some(v) = lookup("PRODUCT_HOST") {
        config.backend.host = v;
    }
    if let Some(v) = lookup("PRODUCT_PORT") {
        match v.parse() {
            Ok(port) => config.backend.port = port,
            Err(_) => errors.push(ValidationError::InvalidEnvOverride {
                name: "PRODUCT_PORT",
                value: v,
            }),
        }
    }
    if let Some(v) = lookup("BACKEND_SOCKET") {
        config.backend.path = Some(v.into());
    }
    if let Some(v) = lookup("LOG_LEVEL") {
        config.observability.log_level = v;
    }

    errors
}
