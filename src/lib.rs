//! Static analysis and runtime support for hierarchy-scoped dependency injection.
//!
//! The analysis half reads a `Snapshot` of declared types, classifies each one
//! into a DI role, validates it, builds the dependency graph and reports cycles.
//! The runtime half is the scope protocol that generated wiring code targets.

pub mod analysis;
pub mod display;
pub mod graph;
pub mod runtime;
pub mod store;
pub mod type_system;
pub mod validation;

pub use analysis::{analyze, analyze_batch, AnalysisError, AnalysisReport, AnalyzerOptions, CancellationToken};
pub use graph::Graph;
pub use store::Snapshot;
pub use validation::{Diagnostic, Severity};
