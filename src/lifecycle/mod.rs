//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Config → connect backend → register services → freeze router
//!
//! Serving:
//!     Phase::Serving published; HTTP server and connection closer spawned
//!
//! Shutdown (shutdown.rs, signals.rs):
//!     SIGTERM/SIGINT → token fires → drain HTTP ∥ close connection → Terminated
//! ```
//!
//! # Design Decisions
//! - One top-level cancellation token; everything else is a child or a waiter
//! - Shutdown has a grace period: in-flight requests are cancelled after it
//! - Errors during shutdown are logged, never escalated

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use signals::spawn_signal_listener;
pub use startup::Gateway;

/// Externally observable state of the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Initializing,
    Serving,
    ShuttingDown,
    Terminated,
}
