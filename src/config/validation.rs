//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Resolve the backend transport kind into a closed endpoint
//! - Validate value ranges (timeouts > 0, ports valid)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use thiserror::Error;
use tracing_subscriber::EnvFilter;

use crate::config::schema::GatewayConfig;

/// A single semantic problem with the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Backend transport kind is not one the connector can dial.
    #[error("unsupported backend transport {0:?} (expected \"tcp\" or \"unix\")")]
    UnsupportedTransport(String),

    /// A required value is empty.
    #[error("{0} must not be empty")]
    EmptyField(&'static str),

    /// Port 0 is not a usable port here.
    #[error("{0} must be a non-zero port")]
    InvalidPort(&'static str),

    /// A duration that must be positive is zero.
    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),

    /// Log level could not be parsed as a filter directive.
    #[error("invalid log level {0:?}")]
    InvalidLogLevel(String),

    /// Metrics address is not a socket address.
    #[error("invalid metrics address {0:?}")]
    InvalidMetricsAddress(String),

    /// An environment override could not be parsed.
    #[error("environment variable {name} has invalid value {value:?}")]
    InvalidEnvOverride { name: &'static str, value: String },
}

/// Check a loaded configuration, collecting every problem found.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.host.is_empty() {
        errors.push(ValidationError::EmptyField("listener.host"));
    }

    if let Err(e) = config.backend.endpoint() {
        errors.push(e);
    }

    if config.backend.connect_timeout_secs == 0 {
        errors.push(ValidationError::ZeroDuration("backend.connect_timeout_secs"));
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::ZeroDuration("timeouts.request_secs"));
    }
    if config.timeouts.shutdown_grace_secs == 0 {
        errors.push(ValidationError::ZeroDuration("timeouts.shutdown_grace_secs"));
    }

    if EnvFilter::try_new(&config.observability.log_level).is_err() {
        errors.push(ValidationError::InvalidLogLevel(
            config.observability.log_level.clone(),
        ));
    }

    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<std::net::SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::InvalidMetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if config.security.max_body_size == 0 {
        errors.push(ValidationError::EmptyField("security.max_body_size"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
