//! Permissive CORS stage.
//!
//! Reflects any `Origin` back and answers preflight requests itself.

use axum::http::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
    ACCESS_CONTROL_REQUEST_METHOD, ORIGIN,
};
use axum::http::{HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::http::context::RequestContext;
use crate::http::middleware::{Outcome, Stage};

const ALLOWED_HEADERS: &str = "Content-Type, Accept, Authorization";
const ALLOWED_METHODS: &str = "GET, HEAD, POST, PUT, DELETE";

#[derive(Debug, Default, Clone, Copy)]
pub struct Cors;

impl Cors {
    fn is_preflight(ctx: &RequestContext) -> bool {
        ctx.method == Method::OPTIONS && ctx.headers.contains_key(ACCESS_CONTROL_REQUEST_METHOD)
    }

    fn preflight_response() -> Response {
        (
            StatusCode::OK,
            [
                (ACCESS_CONTROL_ALLOW_HEADERS, HeaderValue::from_static(ALLOWED_HEADERS)),
                (ACCESS_CONTROL_ALLOW_METHODS, HeaderValue::from_static(ALLOWED_METHODS)),
            ],
        )
            .into_response()
    }
}

impl Stage for Cors {
    fn name(&self) -> &'static str {
        "cors"
    }

    fn on_request(&self, ctx: &mut RequestContext) -> Outcome {
        if let Some(origin) = ctx.headers.get(ORIGIN).cloned() {
            ctx.response_headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, origin);
        }

        if Self::is_preflight(ctx) {
            tracing::debug!(request_id = %ctx.request_id, path = ctx.path(), "CORS preflight");
            return Outcome::ShortCircuit(Self::preflight_response());
        }
        Outcome::Delegate
    }
}
