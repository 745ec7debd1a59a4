//! Middleware pipeline.
//!
//! ```text
//! Request ──► RequestLogger ──► Cors ──► Router
//!                                 │
//!                                 └── preflight answered here
//! ```
//!
//! Stages run in order against the shared [`RequestContext`]. The first
//! stage that short-circuits produces the response; otherwise the router
//! does. Headers a stage places in `ctx.response_headers` are applied to the
//! response either way.

mod cors;
mod logger;

pub use cors::Cors;
pub use logger::RequestLogger;

use std::sync::Arc;

use axum::response::Response;

use crate::http::context::RequestContext;

/// What a stage wants done with the request.
#[derive(Debug)]
pub enum Outcome {
    /// Hand the request to the next stage (or the router).
    Delegate,
    /// Stop here and reply with this response.
    ShortCircuit(Response),
}

/// One step of the pipeline.
pub trait Stage: Send + Sync {
    /// Identifier used in logs.
    fn name(&self) -> &'static str;

    fn on_request(&self, ctx: &mut RequestContext) -> Outcome;
}

/// Ordered stages in front of the router.
#[derive(Clone)]
pub struct Pipeline {
    stages: Vec<Arc<dyn Stage>>,
}

impl Pipeline {
    pub fn new(stages: Vec<Arc<dyn Stage>>) -> Self {
        Self { stages }
    }

    /// Logger, then CORS.
    pub fn standard() -> Self {
        Self::new(vec![Arc::new(RequestLogger), Arc::new(Cors)])
    }

    /// Run stages in order; `Some` if one of them answered the request.
    pub fn run(&self, ctx: &mut RequestContext) -> Option<Response> {
        for stage in &self.stages {
            if let Outcome::ShortCircuit(response) = stage.on_request(ctx) {
                tracing::debug!(
                    request_id = %ctx.request_id,
                    stage = stage.name(),
                    status = %response.status(),
                    "Request answered by pipeline stage"
                );
                return Some(response);
            }
        }
        None
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.stages.iter().map(|s| s.name()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::response::IntoResponse;
    use tokio_util::sync::CancellationToken;

    struct Counting(Arc<AtomicUsize>);

    impl Stage for Counting {
        fn name(&self) -> &'static str {
            "counting"
        }

        fn on_request(&self, _ctx: &mut RequestContext) -> Outcome {
            self.0.fetch_add(1, Ordering::SeqCst);
            Outcome::Delegate
        }
    }

    struct Teapot;

    impl Stage for Teapot {
        fn name(&self) -> &'static str {
            "teapot"
        }

        fn on_request(&self, _ctx: &mut RequestContext) -> Outcome {
            Outcome::ShortCircuit(StatusCode::IM_A_TEAPOT.into_response())
        }
    }

    fn ctx() -> RequestContext {
        let (parts, _) = Request::builder().uri("/").body(Body::empty()).unwrap().into_parts();
        RequestContext::new(&parts, CancellationToken::new())
    }

    #[test]
    fn first_short_circuit_wins_and_later_stages_are_skipped() {
        let before = Arc::new(AtomicUsize::new(0));
        let after = Arc::new(AtomicUsize::new(0));
        let pipeline = Pipeline::new(vec![
            Arc::new(Counting(before.clone())),
            Arc::new(Teapot),
            Arc::new(Counting(after.clone())),
        ]);

        let response = pipeline.run(&mut ctx()).unwrap();
        assert_eq!(response.status(), StatusCode::IM_A_TEAPOT);
        assert_eq!(before.load(Ordering::SeqCst), 1);
        assert_eq!(after.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn all_delegating_yields_none() {
        let seen = Arc::new(AtomicUsize::new(0));
        let pipeline = Pipeline::new(vec![
            Arc::new(Counting(seen.clone())),
            Arc::new(Counting(seen.clone())),
        ]);
        assert!(pipeline.run(&mut ctx()).is_none());
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn standard_pipeline_is_logger_then_cors() {
        assert_eq!(format!("{:?}", Pipeline::standard()), r#"["request_logger", "cors"]"#);
    }
}
