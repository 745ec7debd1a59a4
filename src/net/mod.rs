//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound:
//!     listener.rs (bind host:port) → handed to axum::serve
//!
//! Outbound:
//!     BackendEndpoint
//!         → connector.rs (dial tcp:// or unix://, plaintext)
//!         → Connection (one per process, shared by all requests)
//!         → closed once by the lifecycle orchestrator
//! ```
//!
//! # Design Decisions
//! - Dial failures are fatal at startup; there is no reconnect loop
//! - One HTTP/2 connection multiplexes every concurrent backend call

pub mod connector;
pub mod listener;

pub use connector::{connect, ConnectError, ConnectOptions, Connection, Credentials};
pub use listener::{bind, ListenerError};
