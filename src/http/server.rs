//! HTTP server setup.
//!
//! # Responsibilities
//! - Build the axum app: one fallback handler behind the request ID layers
//! - Run the pipeline, then the router, for every request
//! - Record per-request metrics and the completion log line
//! - Serve until the shutdown token fires, then drain

use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::Request;
use axum::response::Response;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};

use crate::http::context::RequestContext;
use crate::http::middleware::Pipeline;
use crate::observability::metrics;
use crate::routing::Router;

/// Application state injected into the handler.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Pipeline,
    pub router: Arc<Router>,
    /// Parent of every request's cancellation token.
    pub abort: CancellationToken,
}

impl AppState {
    pub fn new(router: Router, abort: CancellationToken) -> Self {
        Self {
            pipeline: Pipeline::standard(),
            router: Arc::new(router),
            abort,
        }
    }
}

/// Build the axum app serving every path through the gateway handler.
pub fn build_app(state: AppState) -> axum::Router {
    axum::Router::new()
        .fallback(gateway_handler)
        .with_state(state)
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

async fn gateway_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let (parts, body) = request.into_parts();
    let mut ctx = RequestContext::new(&parts, state.abort.child_token());

    let mut response = match state.pipeline.run(&mut ctx) {
        Some(response) => response,
        None => state.router.dispatch(&mut ctx, body).await,
    };
    ctx.apply_response_headers(&mut response);

    let status = response.status();
    let route = ctx.route.as_deref().unwrap_or("unmatched");
    metrics::record_request(ctx.method.as_str(), route, status.as_u16(), ctx.started);
    tracing::info!(
        request_id = %ctx.request_id,
        method = %ctx.method,
        route,
        status = status.as_u16(),
        latency_ms = ctx.started.elapsed().as_millis() as u64,
        "Request completed"
    );

    response
}

/// HTTP front end of the gateway.
pub struct HttpServer {
    app: axum::Router,
}

impl HttpServer {
    pub fn new(state: AppState) -> Self {
        Self {
            app: build_app(state),
        }
    }

    /// Serve on `listener` until `shutdown` fires, then drain open requests.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown: CancellationToken,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.app)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use axum::http::header::{
        ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_REQUEST_METHOD,
        ORIGIN,
    };
    use axum::http::{Method, StatusCode};
    use bytes::Bytes;
    use serde::{Deserialize, Serialize};
    use tonic::Status;
    use tower::ServiceExt;

    use crate::routing::{MethodRegistry, RouteBinding};
    use crate::rpc::{Call, Invoke, MessageStream, Reply};

    #[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
    struct Ping {
        #[prost(string, tag = "1")]
        #[serde(default)]
        note: String,
    }

    #[derive(Default)]
    struct CountingBackend {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Invoke for CountingBackend {
        async fn unary(&self, call: Call) -> Result<Reply<Bytes>, Status> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Reply::new(call.message))
        }

        async fn server_streaming(&self, _call: Call) -> Result<Reply<MessageStream>, Status> {
            Err(Status::unimplemented("no streams here"))
        }
    }

    fn app(backend: Arc<CountingBackend>) -> axum::Router {
        let mut registry = MethodRegistry::new();
        let ping = RouteBinding::unary::<Ping, Ping>(Method::POST, "/v1/ping", "/test.Ping/Ping")
            .unwrap()
            .with_body();
        registry.register(ping).unwrap();
        build_app(AppState::new(Router::new(registry, backend), CancellationToken::new()))
    }

    #[tokio::test]
    async fn request_id_is_generated_and_echoed() {
        let response = app(Arc::default())
            .oneshot(Request::post("/v1/ping").body(Body::from("{}")).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(!response.headers()["x-request-id"].is_empty());

        let response = app(Arc::default())
            .oneshot(
                Request::post("/v1/ping")
                    .header("x-request-id", "given-id")
                    .body(Body::from("{}"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.headers()["x-request-id"], "given-id");
    }

    #[tokio::test]
    async fn origin_is_echoed_on_routed_and_error_responses() {
        let response = app(Arc::default())
            .oneshot(
                Request::post("/v1/ping")
                    .header(ORIGIN, "http://shop.example")
                    .body(Body::from(r#"{"note": "hi"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.headers()[ACCESS_CONTROL_ALLOW_ORIGIN], "http://shop.example");

        let response = app(Arc::default())
            .oneshot(
                Request::get("/no-such-route")
                    .header(ORIGIN, "http://shop.example")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(response.headers()[ACCESS_CONTROL_ALLOW_ORIGIN], "http://shop.example");
    }

    #[tokio::test]
    async fn preflight_never_reaches_the_backend() {
        let backend = Arc::new(CountingBackend::default());
        let response = app(backend.clone())
            .oneshot(
                Request::options("/v1/ping")
                    .header(ORIGIN, "http://shop.example")
                    .header(ACCESS_CONTROL_REQUEST_METHOD, "POST")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[ACCESS_CONTROL_ALLOW_METHODS],
            "GET, HEAD, POST, PUT, DELETE"
        );
        assert_eq!(response.headers()[ACCESS_CONTROL_ALLOW_ORIGIN], "http://shop.example");
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(body.is_empty());
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn serve_stops_when_token_fires() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let token = CancellationToken::new();
        let server = HttpServer::new(AppState::new(
            Router::new(MethodRegistry::new(), Arc::new(CountingBackend::default())),
            CancellationToken::new(),
        ));
        let handle = tokio::spawn(server.run(listener, token.clone()));

        token.cancel();
        let result = tokio::time::timeout(std::time::Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
    }
}
