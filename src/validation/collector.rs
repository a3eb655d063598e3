//! Collects diagnostics for one pass, applying the analyzer options as they arrive.
use super::error::{Diagnostic, Severity};
use crate::analysis::AnalyzerOptions;
use crate::store::TypeName;
use std::collections::HashSet;

#[derive(Debug, Default)]
pub struct DiagnosticBag {
    options: AnalyzerOptions,
    items: Vec<Diagnostic>,
    errored: HashSet<TypeName>,
}

impl DiagnosticBag {
    pub fn new(options: AnalyzerOptions) -> Self {
        Self { options, ..Default::default() }
    }

    pub fn push(&mut self, mut diagnostic: Diagnostic) {
        if diagnostic.severity == Severity::Warning && self.options.warnings_as_errors {
            diagnostic.severity = Severity::Error;
        }
        if !diagnostic.is_error() && self.options.is_suppressed(diagnostic.kind) {
            return;
        }
        if diagnostic.is_error() {
            self.errored.insert(diagnostic.subject.clone());
        }
        self.items.push(diagnostic);
    }

    pub fn extend(&mut self, diagnostics: impl IntoIterator<Item = Diagnostic>) {
        for d in diagnostics {
            self.push(d);
        }
    }

    /// Whether the type carries at least one Error diagnostic so far.
    pub fn has_errors(&self, ty: &TypeName) -> bool { self.errored.contains(ty) }

    /// Marks a type as excluded without a diagnostic of its own (e.g. cycle members).
    pub fn exclude(&mut self, ty: &TypeName) {
        self.errored.insert(ty.clone());
    }

    pub fn options(&self) -> &AnalyzerOptions { &self.options }

    pub fn len(&self) -> usize { self.items.len() }

    pub fn is_empty(&self) -> bool { self.items.is_empty() }

    /// Returns all diagnostics sorted by location, then id.
    pub fn into_sorted(self) -> Vec<Diagnostic> {
        let mut items = self.items;
        items.sort_by(|a, b| (&a.location, &a.id, &a.message).cmp(&(&b.location, &b.id, &b.message)));
        items
    }
}
