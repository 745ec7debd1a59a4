//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Every subsystem produces:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters and histograms via the metrics facade)
//!
//! Consumers:
//!     → stdout (pretty for development, JSON for production)
//!     → Prometheus scrape endpoint (optional)
//! ```
//!
//! # Design Decisions
//! - Request ID flows through every log line of a request
//! - Metrics are no-ops until a recorder is installed

pub mod logging;
pub mod metrics;

pub use logging::{init_logging, LoggingError};
