//! The declaration side-table and the value types it is made of.
pub mod registry;
pub mod types;

pub use registry::{DeclarationTable, DuplicateDecl, Snapshot};
pub use types::*;
