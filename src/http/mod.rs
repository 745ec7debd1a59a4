//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (axum, request ID layers)
//!     → context.rs (per-request state, cancellation token)
//!     → middleware (logger → CORS)
//!     → routing::Router (backend call)
//!     → response (+ headers accumulated by the middleware)
//! ```

pub mod context;
pub mod middleware;
pub mod server;

pub use context::{RequestContext, X_REQUEST_ID};
pub use middleware::{Cors, Outcome, Pipeline, RequestLogger, Stage};
pub use server::{build_app, AppState, HttpServer};
