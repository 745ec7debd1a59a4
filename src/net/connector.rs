//! Outbound connection to the backend service.
//!
//! # Responsibilities
//! - Dial the backend over a TCP stream socket or a Unix domain socket
//! - Fail fast: a dial error is returned to the caller, never retried here
//! - Hold the single channel every request multiplexes over
//! - Close it exactly once on behalf of the lifecycle orchestrator

use std::path::Path;
use std::time::Duration;

use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use bytes::Bytes;
use hyper_util::rt::TokioIo;
use thiserror::Error;
use tokio::net::UnixStream;
use tonic::client::Grpc;
use tonic::transport::{Channel, Endpoint, Uri};
use tonic::Status;
use tower::service_fn;

use crate::config::BackendEndpoint;
use crate::rpc::{Backend, Call, CloseError, Invoke, MessageStream, RawCodec, Reply};

/// Transport security policy for the backend channel.
///
/// Only plaintext is supported; the variant is explicit so a TLS policy can
/// be added at this one site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Credentials {
    #[default]
    Insecure,
}

impl Credentials {
    fn scheme(self) -> &'static str {
        match self {
            Credentials::Insecure => "http",
        }
    }
}

/// Dial parameters.
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    pub connect_timeout: Duration,
    pub credentials: Credentials,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            credentials: Credentials::Insecure,
        }
    }
}

/// Error establishing the backend connection.
#[derive(Debug, Error)]
pub enum ConnectError {
    /// The endpoint could not be turned into a URI.
    #[error("invalid backend address {address}: {source}")]
    InvalidAddress {
        address: String,
        #[source]
        source: tonic::transport::Error,
    },

    /// The dial itself failed (refused, timed out, no such socket).
    #[error("failed to connect to backend at {endpoint}: {source}")]
    Dial {
        endpoint: String,
        #[source]
        source: tonic::transport::Error,
    },
}

/// Establish the backend connection.
pub async fn connect(
    endpoint: &BackendEndpoint,
    options: &ConnectOptions,
) -> Result<Connection, ConnectError> {
    tracing::info!(endpoint = %endpoint, "Connecting to backend");

    let channel = match endpoint {
        BackendEndpoint::StreamSocket { host, port } => dial_tcp(host, *port, options).await?,
        BackendEndpoint::DomainSocket { path } => dial_unix(path, options).await?,
    };

    tracing::info!(endpoint = %endpoint, "Backend connection established");
    Ok(Connection::new(endpoint.clone(), channel))
}

async fn dial_tcp(
    host: &str,
    port: u16,
    options: &ConnectOptions,
) -> Result<Channel, ConnectError> {
    let host = if host.contains(':') && !host.starts_with('[') {
        format!("[{}]", host)
    } else {
        host.to_string()
    };
    let address = format!("{}://{}:{}", options.credentials.scheme(), host, port);

    let endpoint = Endpoint::from_shared(address.clone())
        .map_err(|source| ConnectError::InvalidAddress { address, source })?
        .connect_timeout(options.connect_timeout);

    endpoint.connect().await.map_err(|source| ConnectError::Dial {
        endpoint: format!("tcp://{}:{}", host, port),
        source,
    })
}

async fn dial_unix(path: &Path, options: &ConnectOptions) -> Result<Channel, ConnectError> {
    let socket = path.to_path_buf();

    // The URI only feeds the :authority header; the connector ignores it.
    let endpoint =
        Endpoint::from_static("http://localhost").connect_timeout(options.connect_timeout);

    endpoint
        .connect_with_connector(service_fn(move |_: Uri| {
            let socket = socket.clone();
            async move { Ok::<_, std::io::Error>(TokioIo::new(UnixStream::connect(socket).await?)) }
        }))
        .await
        .map_err(|source| ConnectError::Dial {
            endpoint: format!("unix://{}", path.display()),
            source,
        })
}

/// The live backend connection.
///
/// Cloning the inner channel is how concurrent calls share one HTTP/2
/// connection; `close` drops the gateway's handle so the channel shuts down
/// once in-flight calls release theirs.
pub struct Connection {
    endpoint: BackendEndpoint,
    channel: ArcSwapOption<Channel>,
}

impl Connection {
    fn new(endpoint: BackendEndpoint, channel: Channel) -> Self {
        Self {
            endpoint,
            channel: ArcSwapOption::from_pointee(channel),
        }
    }

    /// Endpoint this connection was dialed to.
    pub fn endpoint(&self) -> &BackendEndpoint {
        &self.endpoint
    }

    /// Whether `close` has been called.
    pub fn is_closed(&self) -> bool {
        self.channel.load().is_none()
    }

    async fn client(&self) -> Result<Grpc<Channel>, Status> {
        let channel = self
            .channel
            .load_full()
            .ok_or_else(|| {
                Status::unavailable(format!("connection to {} is closed", self.endpoint))
            })?;

        let mut grpc = Grpc::new(Channel::clone(&channel));
        grpc.ready()
            .await
            .map_err(|e| Status::unavailable(format!("backend not ready: {}", e)))?;
        Ok(grpc)
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("endpoint", &self.endpoint)
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[async_trait]
impl Invoke for Connection {
    async fn unary(&self, call: Call) -> Result<Reply<Bytes>, Status> {
        let mut grpc = self.client().await?;
        let path = call.procedure.path();
        let response = grpc.unary(call.into_request(), path, RawCodec).await?;
        let (metadata, message, _) = response.into_parts();
        Ok(Reply { metadata, message })
    }

    async fn server_streaming(&self, call: Call) -> Result<Reply<MessageStream>, Status> {
        let mut grpc = self.client().await?;
        let path = call.procedure.path();
        let response = grpc
            .server_streaming(call.into_request(), path, RawCodec)
            .await?;
        let (metadata, stream, _) = response.into_parts();
        Ok(Reply {
            metadata,
            message: Box::pin(stream),
        })
    }
}

#[async_trait]
impl Backend for Connection {
    async fn close(&self) -> Result<(), CloseError> {
        match self.channel.swap(None) {
            Some(_) => {
                tracing::info!(endpoint = %self.endpoint, "Backend connection closed");
                Ok(())
            }
            None => Err(CloseError::AlreadyClosed(self.endpoint.to_string())),
        }
    }
}
