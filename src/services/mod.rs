//! Backend services exposed over HTTP.
//!
//! Each submodule declares its message types (prost + serde, so one struct
//! serves both the wire and JSON) and a registration function binding HTTP
//! routes to its procedures.

pub mod counter;
pub mod product;

use crate::routing::ServiceRegistration;

/// Every service the gateway binds at startup.
pub const ALL: &[ServiceRegistration] = &[product::register, counter::register];
