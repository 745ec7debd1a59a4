//! Request logging stage.

use crate::http::context::RequestContext;
use crate::http::middleware::{Outcome, Stage};

/// Logs verb and full URL of every request, then delegates.
#[derive(Debug, Default, Clone, Copy)]
pub struct RequestLogger;

impl Stage for RequestLogger {
    fn name(&self) -> &'static str {
        "request_logger"
    }

    fn on_request(&self, ctx: &mut RequestContext) -> Outcome {
        tracing::info!(
            request_id = %ctx.request_id,
            method = %ctx.method,
            url = %ctx.uri,
            "Request received"
        );
        Outcome::Delegate
    }
}
