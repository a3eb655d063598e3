//! Pass orchestration, cycle detection, and the configuration around a pass.
pub mod error;
pub mod options;
pub mod pipeline;
pub mod topology;

pub use error::AnalysisError;
pub use options::AnalyzerOptions;
pub use pipeline::{analyze, analyze_batch, AnalysisReport, CancellationToken};
pub use topology::{find_cycles, service_subgraph, Cycle};
