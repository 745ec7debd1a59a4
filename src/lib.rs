//! HTTP/JSON to gRPC gateway library.

pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod routing;
pub mod rpc;
pub mod services;

pub use config::GatewayConfig;
pub use error::{GatewayError, StartupError};
pub use lifecycle::{Gateway, Phase, Shutdown};
