//! Per-request state shared by pipeline stages and the router.

use std::time::Instant;

use axum::http::request::Parts;
use axum::http::{HeaderMap, Method, Uri};
use axum::response::Response;
use tokio_util::sync::CancellationToken;

/// Header carrying the correlation ID.
pub const X_REQUEST_ID: &str = "x-request-id";

/// What the gateway knows about one in-flight request.
#[derive(Debug)]
pub struct RequestContext {
    pub request_id: String,
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    /// Headers stages want on the final response, whoever produces it.
    pub response_headers: HeaderMap,
    /// Cancelled when the client goes away or the gateway aborts in-flight work.
    pub cancel: CancellationToken,
    /// Matched path template, once routed.
    pub route: Option<String>,
    pub started: Instant,
}

impl RequestContext {
    pub fn new(parts: &Parts, cancel: CancellationToken) -> Self {
        let request_id = parts
            .headers
            .get(X_REQUEST_ID)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown")
            .to_string();

        Self {
            request_id,
            method: parts.method.clone(),
            uri: parts.uri.clone(),
            headers: parts.headers.clone(),
            response_headers: HeaderMap::new(),
            cancel,
            route: None,
            started: Instant::now(),
        }
    }

    pub fn path(&self) -> &str {
        self.uri.path()
    }

    /// Copy accumulated response headers onto `response`.
    pub fn apply_response_headers(&self, response: &mut Response) {
        for (name, value) in &self.response_headers {
            response.headers_mut().insert(name.clone(), value.clone());
        }
    }
}
