//! Analyzer configuration, loadable from JSON.
use super::error::AnalysisError;
use crate::validation::DiagnosticKind;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalyzerOptions {
    /// Promote every Warning to Error. Promoted warnings exclude their type from the graph.
    pub warnings_as_errors: bool,
    /// Diagnostic ids to drop, e.g. `"M006"`. Error-severity diagnostics are never dropped.
    pub suppress: Vec<String>,
    /// Emit an Info diagnostic summarising what each auto-scan scope collected.
    pub report_auto_scan: bool,
}

impl AnalyzerOptions {
    pub fn from_json_str(s: &str) -> Result<Self, AnalysisError> {
        let options: Self = serde_json::from_str(s)?;
        options.check()?;
        Ok(options)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, AnalysisError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|source| AnalysisError::Io { path: path.to_path_buf(), source })?;
        Self::from_json_str(&text)
    }

    pub fn is_suppressed(&self, kind: DiagnosticKind) -> bool {
        let id = kind.id();
        self.suppress.iter().any(|s| *s == id)
    }

    fn check(&self) -> Result<(), AnalysisError> {
        for id in &self.suppress {
            let well_formed = id.len() == 4
                && matches!(id.chars().next(), Some('T' | 'C' | 'M' | 'G' | 'E'))
                && id[1..].chars().all(|c| c.is_ascii_digit());
            if !well_formed {
                return Err(AnalysisError::Options(format!("'{}' is not a diagnostic id", id)));
            }
        }
        Ok(())
    }
}
