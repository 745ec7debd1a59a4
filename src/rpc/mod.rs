//! Backend procedure-call interface.
//!
//! # Data Flow
//! ```text
//! RouteBinding (typed JSON ⇄ protobuf)
//!     → Call { procedure, message bytes, metadata, deadline }
//!     → Invoke (net::Connection over a tonic channel, or a test double)
//!     → Reply { metadata, message bytes | message stream }
//! ```
//!
//! # Design Decisions
//! - The transport only moves bytes; message shapes live in the bindings
//! - `Invoke` is what request handlers see; `Backend` adds `close`, which only
//!   the lifecycle orchestrator holds
//! - Implementations must tolerate concurrent calls on one instance

pub mod codec;
pub mod status;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::http::uri::PathAndQuery;
use bytes::Bytes;
use futures_util::stream::BoxStream;
use thiserror::Error;
use tonic::metadata::MetadataMap;
use tonic::Status;

pub use codec::RawCodec;
pub use status::{http_status, ErrorBody};

use crate::routing::RegistrationError;

/// Stream of encoded messages from a server-streaming procedure.
pub type MessageStream = BoxStream<'static, Result<Bytes, Status>>;

/// Fully-qualified procedure name, e.g. `/pkg.Service/Method`.
#[derive(Clone, PartialEq, Eq)]
pub struct Procedure {
    path: PathAndQuery,
}

impl Procedure {
    /// Validate and wrap a procedure path.
    pub fn new(path: &str) -> Result<Self, RegistrationError> {
        let invalid = || RegistrationError::InvalidProcedure(path.to_string());

        let rest = path.strip_prefix('/').ok_or_else(invalid)?;
        let (service, method) = rest.split_once('/').ok_or_else(invalid)?;
        if service.is_empty() || method.is_empty() || method.contains('/') {
            return Err(invalid());
        }

        let path = path.parse::<PathAndQuery>().map_err(|_| invalid())?;
        Ok(Self { path })
    }

    /// The `/pkg.Service/Method` string.
    pub fn as_str(&self) -> &str {
        self.path.path()
    }

    /// Path used on the wire.
    pub fn path(&self) -> PathAndQuery {
        self.path.clone()
    }

    /// Method segment only.
    pub fn method(&self) -> &str {
        self.as_str().rsplit('/').next().unwrap_or_default()
    }
}

impl fmt::Debug for Procedure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Procedure").field(&self.as_str()).finish()
    }
}

impl fmt::Display for Procedure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One invocation of a remote procedure.
#[derive(Debug, Clone)]
pub struct Call {
    pub procedure: Procedure,
    /// Protobuf-encoded request message.
    pub message: Bytes,
    /// Outgoing gRPC metadata.
    pub metadata: MetadataMap,
    /// Deadline relative to the start of the call.
    pub timeout: Option<Duration>,
}

impl Call {
    pub fn new(procedure: Procedure, message: Bytes) -> Self {
        Self {
            procedure,
            message,
            metadata: MetadataMap::new(),
            timeout: None,
        }
    }

    /// Convert into a tonic request carrying the metadata and deadline.
    pub fn into_request(self) -> tonic::Request<Bytes> {
        let mut request = tonic::Request::new(self.message);
        *request.metadata_mut() = self.metadata;
        if let Some(timeout) = self.timeout {
            request.set_timeout(timeout);
        }
        request
    }
}

/// Result of a successful invocation.
#[derive(Debug)]
pub struct Reply<T> {
    /// Response headers sent by the backend.
    pub metadata: MetadataMap,
    pub message: T,
}

impl<T> Reply<T> {
    pub fn new(message: T) -> Self {
        Self {
            metadata: MetadataMap::new(),
            message,
        }
    }
}

/// Invocation side of the backend connection, shared by every handler.
#[async_trait]
pub trait Invoke: Send + Sync + 'static {
    /// Single request, single response.
    async fn unary(&self, call: Call) -> Result<Reply<Bytes>, Status>;

    /// Single request, stream of responses in backend emission order.
    async fn server_streaming(&self, call: Call) -> Result<Reply<MessageStream>, Status>;
}

/// Error closing a backend connection.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CloseError {
    /// `close` was already called on this connection.
    #[error("connection to {0} already closed")]
    AlreadyClosed(String),
}

/// A backend connection as owned by the lifecycle orchestrator.
#[async_trait]
pub trait Backend: Invoke {
    /// Release the connection. Calls after the first return `AlreadyClosed`.
    async fn close(&self) -> Result<(), CloseError>;
}

/// Handle given to the router: invocation only.
pub type SharedInvoker = Arc<dyn Invoke>;
