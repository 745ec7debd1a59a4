//! Gateway error types.
//!
//! Request-time failures are [`GatewayError`]s and always render as the JSON
//! error body; startup failures are [`StartupError`]s and end the process.

use axum::http::header::ALLOW;
use axum::http::{HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;
use tonic::{Code, Status};

use crate::config::ConfigError;
use crate::net::{ConnectError, ListenerError};
use crate::observability::LoggingError;
use crate::routing::{DecodeError, RegistrationError};
use crate::rpc::{http_status, ErrorBody};

/// A request failed before or during the backend call.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("no route for {0}")]
    RouteNotFound(String),

    #[error("method {method} not allowed for {path}")]
    MethodNotAllowed {
        method: Method,
        path: String,
        allowed: Vec<Method>,
    },

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("request body exceeds {0} bytes")]
    PayloadTooLarge(usize),

    #[error("failed to read request body: {0}")]
    Body(String),

    #[error("{}", .0.message())]
    Remote(#[from] Status),
}

impl GatewayError {
    /// gRPC code reported in the error body.
    pub fn code(&self) -> Code {
        match self {
            GatewayError::RouteNotFound(_) => Code::NotFound,
            GatewayError::MethodNotAllowed { .. } => Code::Unimplemented,
            GatewayError::Decode(_) | GatewayError::Body(_) => Code::InvalidArgument,
            GatewayError::PayloadTooLarge(_) => Code::ResourceExhausted,
            GatewayError::Remote(status) => status.code(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::RouteNotFound(_) => StatusCode::NOT_FOUND,
            GatewayError::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            GatewayError::Decode(_) | GatewayError::Body(_) => StatusCode::BAD_REQUEST,
            GatewayError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            GatewayError::Remote(status) => http_status(status.code()),
        }
    }

    pub fn body(&self) -> ErrorBody {
        match self {
            GatewayError::Remote(status) => ErrorBody::from(status),
            other => ErrorBody::new(other.code(), other.to_string()),
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let mut response = (self.status(), Json(self.body())).into_response();

        if let GatewayError::MethodNotAllowed { allowed, .. } = &self {
            let list = allowed
                .iter()
                .map(Method::as_str)
                .collect::<Vec<_>>()
                .join(", ");
            if let Ok(value) = HeaderValue::from_str(&list) {
                response.headers_mut().insert(ALLOW, value);
            }
        }
        response
    }
}

/// The gateway could not start.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("logging error: {0}")]
    Logging(#[from] LoggingError),

    #[error("backend connection error: {0}")]
    Connect(#[from] ConnectError),

    #[error("route registration error: {0}")]
    Registration(#[from] RegistrationError),

    #[error("listener error: {0}")]
    Listener(#[from] ListenerError),
}
