//! Runtime failures. Most are logged at the point of failure and only
//! returned where a caller can act on them.
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    #[error("Failed to construct service '{service}': {reason}")]
    Construction { service: String, reason: String },
    #[error("Failed to dispose service '{service}': {reason}")]
    Dispose { service: String, reason: String },
    #[error("Service '{service}' asked for '{dependency}', which it does not depend on")]
    MissingDependency { service: String, dependency: &'static str },
    #[error("Registered instance is not a '{expected}'")]
    TypeMismatch { expected: &'static str },
    #[error("Scope '{scope}' could not resolve '{key}': no enclosing scope provides it")]
    Unresolved { scope: String, key: &'static str },

    // --- Hierarchy misuse ---
    #[error("Hierarchy node #{0} does not exist")]
    InvalidNode(u32),
    #[error("Hierarchy node #{0} already has a parent or is the root")]
    AlreadyParented(u32),
    #[error("Hierarchy node #{child} is not a child of #{parent}")]
    NotAChild { parent: u32, child: u32 },
    #[error("Adding #{child} under #{parent} would make the hierarchy cyclic")]
    WouldCycle { parent: u32, child: u32 },
}
