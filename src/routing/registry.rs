//! Method registry: the frozen table of route bindings.
//!
//! # Responsibilities
//! - Accept bindings at startup, rejecting duplicates and malformed ones
//! - Resolve a verb + path to the most specific binding
//! - Distinguish "no such path" from "path exists under another verb"
//!
//! # Design Decisions
//! - Bindings kept sorted by specificity; first match wins
//! - Immutable once handed to the router (shared via Arc, no locks)

use std::sync::Arc;

use axum::http::Method;
use thiserror::Error;

use crate::routing::binding::RouteBinding;
use crate::routing::matcher::PathParams;

/// A binding could not be attached.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    #[error("malformed path pattern {pattern:?}: {reason}")]
    MalformedPattern { pattern: String, reason: &'static str },

    #[error("duplicate binding for {method} {pattern}")]
    Duplicate { method: Method, pattern: String },

    #[error("invalid procedure name {0:?}")]
    InvalidProcedure(String),
}

/// Why a request did not resolve to a binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// No template matches the path.
    NotFound,
    /// Templates match the path, but only under these verbs.
    MethodNotAllowed(Vec<Method>),
}

/// A resolved request.
#[derive(Debug, Clone)]
pub struct RouteMatch {
    pub binding: Arc<RouteBinding>,
    pub params: PathParams,
}

/// Function that attaches one backend service's bindings.
pub type ServiceRegistration = fn(&mut MethodRegistry) -> Result<(), RegistrationError>;

/// Table of route bindings.
#[derive(Debug, Default)]
pub struct MethodRegistry {
    /// Sorted by descending specificity.
    bindings: Vec<Arc<RouteBinding>>,
}

impl MethodRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a binding.
    pub fn register(&mut self, binding: RouteBinding) -> Result<(), RegistrationError> {
        if self
            .bindings
            .iter()
            .any(|b| b.method == binding.method && b.pattern.overlaps(&binding.pattern))
        {
            return Err(RegistrationError::Duplicate {
                method: binding.method.clone(),
                pattern: binding.pattern.as_str().to_string(),
            });
        }

        tracing::debug!(
            method = %binding.method,
            pattern = %binding.pattern,
            procedure = %binding.procedure,
            "Route registered"
        );

        let rank = binding.pattern.specificity();
        let pos = self
            .bindings
            .partition_point(|b| b.pattern.specificity() >= rank);
        self.bindings.insert(pos, Arc::new(binding));
        Ok(())
    }

    /// Run a service's registration function against this registry.
    pub fn register_service(
        &mut self,
        service: ServiceRegistration,
    ) -> Result<(), RegistrationError> {
        service(self)
    }

    /// Find the binding for a request.
    pub fn resolve(&self, method: &Method, path: &str) -> Result<RouteMatch, ResolveError> {
        let mut allowed = Vec::new();

        for binding in &self.bindings {
            if let Some(params) = binding.pattern.matches(path) {
                if binding.method == *method {
                    return Ok(RouteMatch {
                        binding: Arc::clone(binding),
                        params,
                    });
                }
                if !allowed.contains(&binding.method) {
                    allowed.push(binding.method.clone());
                }
            }
        }

        if allowed.is_empty() {
            Err(ResolveError::NotFound)
        } else {
            Err(ResolveError::MethodNotAllowed(allowed))
        }
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Bindings in resolution order.
    pub fn bindings(&self) -> impl Iterator<Item = &RouteBinding> {
        self.bindings.iter().map(|b| b.as_ref())
    }
}
