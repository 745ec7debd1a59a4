//! Mapping of backend failures onto HTTP.
//!
//! # Design Decisions
//! - Only the failure classes a JSON client can act on get a dedicated status;
//!   everything else is a 500
//! - The error body mirrors the gRPC status: numeric code, message, details

use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use tonic::{Code, Status};

/// HTTP status for a gRPC failure class.
pub fn http_status(code: Code) -> StatusCode {
    match code {
        Code::Ok => StatusCode::OK,
        Code::InvalidArgument => StatusCode::BAD_REQUEST,
        Code::NotFound => StatusCode::NOT_FOUND,
        Code::DeadlineExceeded => StatusCode::GATEWAY_TIMEOUT,
        Code::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        Code::PermissionDenied => StatusCode::FORBIDDEN,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// JSON error body written for every failed request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Numeric gRPC status code.
    pub code: i32,
    pub message: String,
    #[serde(default)]
    pub details: Vec<serde_json::Value>,
}

impl ErrorBody {
    pub fn new(code: Code, message: impl Into<String>) -> Self {
        Self {
            code: code as i32,
            message: message.into(),
            details: Vec::new(),
        }
    }
}

impl From<&Status> for ErrorBody {
    fn from(status: &Status) -> Self {
        Self::new(status.code(), status.message())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_failure_classes_map_to_http() {
        let cases = [
            (Code::InvalidArgument, 400),
            (Code::NotFound, 404),
            (Code::DeadlineExceeded, 504),
            (Code::Unavailable, 503),
            (Code::PermissionDenied, 403),
            (Code::Internal, 500),
            (Code::Unknown, 500),
            (Code::AlreadyExists, 500),
            (Code::Unauthenticated, 500),
            (Code::Cancelled, 500),
        ];
        for (code, expected) in cases {
            assert_eq!(http_status(code).as_u16(), expected, "{code:?}");
        }
    }

    #[test]
    fn error_body_uses_numeric_code() {
        let body = ErrorBody::from(&Status::not_found("no such item type"));
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"code": 5, "message": "no such item type", "details": []})
        );
    }
}
