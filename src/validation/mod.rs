//! Diagnostic records, their collector, and the per-role constraint validator.

pub use self::collector::DiagnosticBag;
pub use self::error::{Category, Diagnostic, DiagnosticKind, Severity};
pub use self::validator::validate_constraints;

mod collector;
mod error;
mod validator;
