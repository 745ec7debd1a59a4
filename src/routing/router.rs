//! Request dispatch: HTTP request in, backend call, HTTP response out.
//!
//! # Responsibilities
//! - Resolve the binding for verb + path
//! - Build the request message from body, path variables and query string
//! - Invoke the backend under the request's deadline and cancellation token
//! - Render the reply (JSON object, or NDJSON for streams) or the error body
//!
//! # Design Decisions
//! - The registry is frozen before the router is built; dispatch never locks
//! - Streams are forwarded message by message, never buffered
//! - Every failure becomes a [`GatewayError`] and renders the JSON error body

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::http::header::{AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE};
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures_util::StreamExt;
use http_body_util::LengthLimitError;
use serde_json::json;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tonic::metadata::MetadataMap;
use tonic::Status;

use crate::error::GatewayError;
use crate::http::context::{RequestContext, X_REQUEST_ID};
use crate::observability::metrics;
use crate::routing::binding::{CallKind, DecodeError, MessageCodec, RequestInput};
use crate::routing::registry::{MethodRegistry, ResolveError, RouteMatch};
use crate::rpc::{Call, ErrorBody, MessageStream, SharedInvoker};

/// Prefix for headers mapped to and from gRPC metadata.
pub const METADATA_PREFIX: &str = "grpc-metadata-";

/// Header a client uses to set its own deadline.
pub const GRPC_TIMEOUT: &str = "grpc-timeout";

const STREAM_CONTENT_TYPE: &str = "application/json";

/// Terminal stage of the pipeline.
pub struct Router {
    registry: Arc<MethodRegistry>,
    invoker: SharedInvoker,
    default_timeout: Duration,
    max_body_size: usize,
}

impl Router {
    pub fn new(registry: MethodRegistry, invoker: SharedInvoker) -> Self {
        Self {
            registry: Arc::new(registry),
            invoker,
            default_timeout: Duration::from_secs(30),
            max_body_size: 4 * 1024 * 1024,
        }
    }

    /// Deadline applied when the client does not send `Grpc-Timeout`.
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub fn with_max_body_size(mut self, limit: usize) -> Self {
        self.max_body_size = limit;
        self
    }

    pub fn registry(&self) -> &MethodRegistry {
        &self.registry
    }

    /// Handle one request. Never fails: errors are rendered as responses.
    pub async fn dispatch(&self, ctx: &mut RequestContext, body: Body) -> Response {
        match self.try_dispatch(ctx, body).await {
            Ok(response) => response,
            Err(err) => {
                let status = err.status();
                if status.is_server_error() {
                    tracing::warn!(
                        request_id = %ctx.request_id,
                        status = %status,
                        error = %err,
                        "Request failed"
                    );
                } else {
                    tracing::debug!(
                        request_id = %ctx.request_id,
                        status = %status,
                        error = %err,
                        "Request rejected"
                    );
                }
                err.into_response()
            }
        }
    }

    async fn try_dispatch(
        &self,
        ctx: &mut RequestContext,
        body: Body,
    ) -> Result<Response, GatewayError> {
        let route = self.resolve(ctx)?;
        ctx.route = Some(route.binding.pattern().as_str().to_string());

        let body = self.read_body(&ctx.headers, body).await?;
        let query = parse_query(ctx.uri.query())?;
        let binding = &route.binding;

        let message = binding.codec.decode_request(
            binding.body,
            RequestInput {
                body: &body,
                path: &route.params,
                query: &query,
            },
        )?;

        let timeout = client_timeout(&ctx.headers).unwrap_or(self.default_timeout);
        let mut call = Call::new(binding.procedure().clone(), message);
        call.metadata = outgoing_metadata(&ctx.headers);
        call.timeout = Some(timeout);

        tracing::debug!(
            request_id = %ctx.request_id,
            procedure = %binding.procedure(),
            timeout_ms = timeout.as_millis() as u64,
            "Invoking backend"
        );

        match binding.kind() {
            CallKind::Unary => self.unary(ctx, &route, call, timeout).await,
            CallKind::ServerStreaming => self.server_streaming(ctx, &route, call, timeout).await,
        }
    }

    fn resolve(&self, ctx: &RequestContext) -> Result<RouteMatch, GatewayError> {
        self.registry
            .resolve(&ctx.method, ctx.path())
            .map_err(|err| match err {
                ResolveError::NotFound => GatewayError::RouteNotFound(ctx.path().to_string()),
                ResolveError::MethodNotAllowed(allowed) => GatewayError::MethodNotAllowed {
                    method: ctx.method.clone(),
                    path: ctx.path().to_string(),
                    allowed,
                },
            })
    }

    async fn read_body(&self, headers: &HeaderMap, body: Body) -> Result<Bytes, GatewayError> {
        let declared = headers
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<usize>().ok());
        if declared.is_some_and(|len| len > self.max_body_size) {
            return Err(GatewayError::PayloadTooLarge(self.max_body_size));
        }

        axum::body::to_bytes(body, self.max_body_size)
            .await
            .map_err(|err| {
                let inner = err.into_inner();
                if inner.downcast_ref::<LengthLimitError>().is_some() {
                    GatewayError::PayloadTooLarge(self.max_body_size)
                } else {
                    GatewayError::Body(inner.to_string())
                }
            })
    }

    async fn unary(
        &self,
        ctx: &RequestContext,
        route: &RouteMatch,
        call: Call,
        timeout: Duration,
    ) -> Result<Response, GatewayError> {
        let procedure = route.binding.procedure().to_string();
        let result = guarded(&ctx.cancel, timeout, self.invoker.unary(call)).await;
        metrics::record_backend_call(&procedure, code_of(&result));
        let reply = result?;

        let value = route.binding.codec.encode_response(&reply.message)?;
        let mut response = Json(value).into_response();
        copy_response_metadata(&reply.metadata, response.headers_mut());
        Ok(response)
    }

    async fn server_streaming(
        &self,
        ctx: &RequestContext,
        route: &RouteMatch,
        call: Call,
        timeout: Duration,
    ) -> Result<Response, GatewayError> {
        let procedure = route.binding.procedure().to_string();
        let deadline = Instant::now() + timeout;
        let result = guarded(&ctx.cancel, timeout, self.invoker.server_streaming(call)).await;
        metrics::record_backend_call(&procedure, code_of(&result));
        let reply = result?;

        let lines = ndjson(
            reply.message,
            Arc::clone(&route.binding.codec),
            ctx.cancel.clone(),
            deadline,
        );

        let mut response = Response::new(Body::from_stream(lines));
        *response.status_mut() = StatusCode::OK;
        response
            .headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static(STREAM_CONTENT_TYPE));
        copy_response_metadata(&reply.metadata, response.headers_mut());
        Ok(response)
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("routes", &self.registry.len())
            .field("default_timeout", &self.default_timeout)
            .field("max_body_size", &self.max_body_size)
            .finish()
    }
}

/// Race a backend call against cancellation and the deadline.
async fn guarded<T>(
    cancel: &CancellationToken,
    timeout: Duration,
    call: impl std::future::Future<Output = Result<T, Status>>,
) -> Result<T, Status> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Status::cancelled("request cancelled")),
        result = tokio::time::timeout(timeout, call) => {
            result.unwrap_or_else(|_| Err(Status::deadline_exceeded("deadline exceeded")))
        }
    }
}

fn code_of<T>(result: &Result<T, Status>) -> tonic::Code {
    match result {
        Ok(_) => tonic::Code::Ok,
        Err(status) => status.code(),
    }
}

/// Render a message stream as newline-delimited JSON.
///
/// Each message becomes `{"result": ...}`. A failure (backend error,
/// undecodable message, deadline) becomes a final `{"error": ...}` line.
/// Cancellation ends the body without a trailer line.
fn ndjson(
    stream: MessageStream,
    codec: Arc<dyn MessageCodec>,
    cancel: CancellationToken,
    deadline: Instant,
) -> impl futures_util::Stream<Item = Result<Bytes, Infallible>> + Send + 'static {
    futures_util::stream::unfold(Some((stream, codec, cancel)), move |state| async move {
        let (mut stream, codec, cancel) = state?;

        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => return None,
            _ = tokio::time::sleep_until(deadline) => {
                Err(Status::deadline_exceeded("deadline exceeded"))
            }
            item = stream.next() => item?,
        };

        match next.and_then(|message| codec.encode_response(&message)) {
            Ok(value) => {
                let frame = line(&json!({ "result": value }));
                Some((Ok(frame), Some((stream, codec, cancel))))
            }
            Err(status) => {
                tracing::warn!(
                    code = ?status.code(),
                    message = status.message(),
                    "Stream terminated with error"
                );
                Some((Ok(line(&json!({ "error": ErrorBody::from(&status) }))), None))
            }
        }
    })
}

fn line(value: &serde_json::Value) -> Bytes {
    let mut buf = value.to_string().into_bytes();
    buf.push(b'\n');
    Bytes::from(buf)
}

fn parse_query(query: Option<&str>) -> Result<Vec<(String, String)>, GatewayError> {
    match query {
        None | Some("") => Ok(Vec::new()),
        Some(query) => serde_urlencoded::from_str(query)
            .map_err(|e| GatewayError::Decode(DecodeError::Params(e.to_string()))),
    }
}

/// Headers forwarded to the backend as gRPC metadata.
fn outgoing_metadata(headers: &HeaderMap) -> MetadataMap {
    let mut forwarded = HeaderMap::new();
    for (name, value) in headers {
        if *name == AUTHORIZATION || name.as_str() == X_REQUEST_ID {
            forwarded.append(name.clone(), value.clone());
        } else if let Some(key) = name.as_str().strip_prefix(METADATA_PREFIX) {
            if let Ok(key) = HeaderName::from_bytes(key.as_bytes()) {
                forwarded.append(key, value.clone());
            }
        }
    }
    MetadataMap::from_headers(forwarded)
}

/// Backend response metadata exposed to the client as `Grpc-Metadata-*`.
fn copy_response_metadata(metadata: &MetadataMap, headers: &mut HeaderMap) {
    for (name, value) in metadata.clone().into_headers().iter() {
        let key = name.as_str();
        if key.starts_with("grpc-") || matches!(key, "content-type" | "date" | "te" | "trailer") {
            continue;
        }
        if let Ok(name) = HeaderName::from_bytes(format!("{}{}", METADATA_PREFIX, key).as_bytes()) {
            headers.append(name, value.clone());
        }
    }
}

/// Parse a `Grpc-Timeout` header: up to 8 digits and a unit (H M S m u n).
fn client_timeout(headers: &HeaderMap) -> Option<Duration> {
    let value = headers.get(GRPC_TIMEOUT)?.to_str().ok()?;
    parse_grpc_timeout(value)
}

fn parse_grpc_timeout(value: &str) -> Option<Duration> {
    if !value.is_ascii() || value.len() < 2 {
        return None;
    }
    let (digits, unit) = value.split_at(value.len() - 1);
    if digits.len() > 8 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let amount: u64 = digits.parse().ok()?;

    let duration = match unit {
        "H" => Duration::from_secs(amount * 3600),
        "M" => Duration::from_secs(amount * 60),
        "S" => Duration::from_secs(amount),
        "m" => Duration::from_millis(amount),
        "u" => Duration::from_micros(amount),
        "n" => Duration::from_nanos(amount),
        _ => return None,
    };
    Some(duration)
}
