//! The runtime scope engine and the hierarchy glue that drives it.
//!
//! Scopes own a registry of services keyed by type. Hosts register instances
//! into their nearest scope, users resolve from it, and the `Hierarchy` delivers
//! attach, ready and detach notifications in the order those roles rely on.
pub mod error;
pub mod hierarchy;
pub mod host;
pub mod key;
pub mod scope;
pub mod service;
pub mod user;

pub use error::RuntimeError;
pub use hierarchy::{Hierarchy, NodeHandle, NodeRole};
pub use host::HostBinding;
pub use key::{Instance, ServiceKey};
pub use scope::{Scope, ScopeBuilder, WeakScope};
pub use service::{Dependencies, Dispose, ServiceBuilder, ServiceDescriptor};
pub use user::UserBinding;
