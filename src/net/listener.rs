//! Inbound TCP listener.
//!
//! # Responsibilities
//! - Resolve and bind the configured `host:port`
//! - Report the bound address (port 0 resolves to an ephemeral port)

use std::net::SocketAddr;

use thiserror::Error;
use tokio::net::TcpListener;

use crate::config::ListenerConfig;

/// Error type for listener operations.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// Failed to bind to address.
    #[error("Failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    /// The server stopped accepting before shutdown was requested.
    #[error("HTTP server failed: {0}")]
    Serve(#[source] std::io::Error),
}

/// Bind the HTTP listener.
pub async fn bind(config: &ListenerConfig) -> Result<TcpListener, ListenerError> {
    let address = config.bind_address();
    let listener = TcpListener::bind(&address)
        .await
        .map_err(|source| ListenerError::Bind {
            address: address.clone(),
            source,
        })?;

    let local_addr: SocketAddr = listener.local_addr().map_err(|source| ListenerError::Bind {
        address: address.clone(),
        source,
    })?;

    tracing::info!(address = %local_addr, "Listener bound");
    Ok(listener)
}
