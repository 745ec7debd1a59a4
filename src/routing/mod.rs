//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     ServiceRegistration[] (one per backend service)
//!     → binding.rs (verb + template + procedure + message codec)
//!     → registry.rs (reject duplicates, sort by specificity)
//!     → frozen into an immutable Router
//!
//! Per request:
//!     verb + path
//!     → registry.rs / matcher.rs (most specific match, captured variables)
//!     → router.rs (decode, invoke, render)
//! ```
//!
//! # Design Decisions
//! - Bindings registered at startup, immutable at runtime
//! - No regex: templates are literal segments and `{name}` variables
//! - Deterministic: same request always resolves to the same binding

pub mod binding;
pub mod matcher;
pub mod registry;
pub mod router;

pub use binding::{
    BodyRule, CallKind, DecodeError, JsonProto, MessageCodec, RequestInput, RouteBinding,
};
pub use matcher::{PathParams, PathPattern};
pub use registry::{
    MethodRegistry, RegistrationError, ResolveError, RouteMatch, ServiceRegistration,
};
pub use router::Router;
