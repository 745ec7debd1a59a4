//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::config::validation::ValidationError;

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Process identity reported at startup.
    pub app: AppConfig,

    /// HTTP listener configuration.
    pub listener: ListenerConfig,

    /// Backend service the gateway translates requests for.
    pub backend: BackendConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Request hardening settings.
    pub security: SecurityConfig,
}

/// Process name and version.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    pub name: String,
    pub version: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// HTTP listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Interface to bind (e.g., "0.0.0.0").
    pub host: String,

    /// Port to bind.
    pub port: u16,
}

impl ListenerConfig {
    /// The `host:port` string handed to the TCP listener.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
        }
    }
}

/// Backend connection configuration.
///
/// `transport` is kept as free text here and resolved into a
/// [`BackendEndpoint`] during validation.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Transport kind: "tcp" / "stream-socket" or "unix" / "domain-socket".
    pub transport: String,

    /// Backend host for stream sockets.
    pub host: String,

    /// Backend port for stream sockets.
    pub port: u16,

    /// Filesystem path for domain sockets.
    pub path: Option<PathBuf>,

    /// Dial timeout in seconds.
    pub connect_timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            transport: "tcp".to_string(),
            host: "127.0.0.1".to_string(),
            port: 5001,
            path: None,
            connect_timeout_secs: 5,
        }
    }
}

impl BackendConfig {
    /// Resolve the configured transport into a closed endpoint description.
    pub fn endpoint(&self) -> Result<BackendEndpoint, ValidationError> {
        match self.transport.to_ascii_lowercase().as_str() {
            "tcp" | "stream-socket" => {
                if self.host.is_empty() {
                    return Err(ValidationError::EmptyField("backend.host"));
                }
                if self.port == 0 {
                    return Err(ValidationError::InvalidPort("backend.port"));
                }
                Ok(BackendEndpoint::StreamSocket {
                    host: self.host.clone(),
                    port: self.port,
                })
            }
            "unix" | "domain-socket" => match &self.path {
                Some(path) if !path.as_os_str().is_empty() => Ok(BackendEndpoint::DomainSocket {
                    path: path.clone(),
                }),
                _ => Err(ValidationError::EmptyField("backend.path")),
            },
            other => Err(ValidationError::UnsupportedTransport(other.to_string())),
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

/// Where the backend lives. Immutable after startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendEndpoint {
    /// Network stream socket at `host:port`.
    StreamSocket { host: String, port: u16 },
    /// Local domain socket at a filesystem path.
    DomainSocket { path: PathBuf },
}

impl std::fmt::Display for BackendEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendEndpoint::StreamSocket { host, port } => write!(f, "tcp://{}:{}", host, port),
            BackendEndpoint::DomainSocket { path } => write!(f, "unix://{}", path.display()),
        }
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Default deadline for a backend call in seconds.
    pub request_secs: u64,

    /// Time allowed for in-flight requests to finish during shutdown.
    pub shutdown_grace_secs: u64,
}

impl TimeoutConfig {
    pub fn request(&self) -> Duration {
        Duration::from_secs(self.request_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_secs: 30,
            shutdown_grace_secs: 15,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Human-readable or JSON log lines.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Security hardening configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Maximum request body size in bytes.
    pub max_body_size: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_body_size: 4 * 1024 * 1024, // 4MB
        }
    }
}
