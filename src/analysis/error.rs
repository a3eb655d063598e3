//! Failures around an analysis pass. Structural violations inside a pass are
//! never errors here; they are reported as `Diagnostic`s.
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Analysis pass was cancelled before it started")]
    Cancelled,
    #[error("Failed to read '{}': {source}", path.display())]
    Io { path: PathBuf, source: std::io::Error },
    #[error("Malformed input: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Failed to serialise the analysis report: {0}")]
    Serialize(serde_json::Error),
    #[error("Invalid analyzer options: {0}")]
    Options(String),
}
