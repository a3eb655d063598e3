//! Orchestrates one static analysis pass over a declaration snapshot.
//!
//! The pass is a pure function of its snapshot: classify, validate, select
//! constructors, process members, then build the graph, dropping services
//! with unresolved dependencies and cycle members along the way. Every
//! stage reports into one `DiagnosticBag`, so a single pass surfaces every
//! structural problem at once.
use super::error::AnalysisError;
use super::options::AnalyzerOptions;
use crate::graph::{Graph, GraphBuilder, ModuleDeclaration, TypeFacts};
use crate::store::{DeclarationTable, Location, Role, Snapshot, TypeDecl, TypeName};
use crate::type_system::{
    classify, process_members, select_constructor, service_exposed_types, ExposedTypeSet, TypeContext,
};
use crate::validation::{validate_constraints, Diagnostic, DiagnosticBag, DiagnosticKind};
use rayon::prelude::*;
use serde::Serialize;
use std::any::Any;
use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error};

/// Cooperative cancellation, checked once at pass entry.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self { Self::default() }

    pub fn cancel(&self) { self.0.store(true, Ordering::Relaxed) }

    pub fn is_cancelled(&self) -> bool { self.0.load(Ordering::Relaxed) }
}

/// The output of one pass: sorted diagnostics plus the graph of every type
/// that came through without an Error.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub diagnostics: Vec<Diagnostic>,
    pub graph: Graph,
}

impl AnalysisReport {
    pub fn has_errors(&self) -> bool { self.diagnostics.iter().any(Diagnostic::is_error) }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> { self.diagnostics.iter().filter(|d| d.is_error()) }

    /// Diagnostics of one kind, in report order.
    pub fn of_kind(&self, kind: DiagnosticKind) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(move |d| d.kind == kind)
    }

    pub fn to_json(&self) -> Result<String, AnalysisError> {
        serde_json::to_string_pretty(self).map_err(AnalysisError::Serialize)
    }
}

/// Runs one analysis pass.
///
/// Returns `Err` only when the pass never started. A failure inside the pass is
/// caught here and turned into a single `E001` diagnostic.
pub fn analyze(
    snapshot: &Snapshot,
    options: &AnalyzerOptions,
    cancel: &CancellationToken,
) -> Result<AnalysisReport, AnalysisError> {
    if cancel.is_cancelled() {
        return Err(AnalysisError::Cancelled);
    }
    debug!(types = snapshot.types.len(), "analysis pass started");

    let report = match catch_unwind(AssertUnwindSafe(|| run_pass(snapshot, options))) {
        Ok(report) => report,
        Err(payload) => internal_failure(payload.as_ref()),
    };

    debug!(
        diagnostics = report.diagnostics.len(),
        nodes = report.graph.len(),
        "analysis pass finished"
    );
    Ok(report)
}

/// Runs independent passes concurrently, one result per snapshot in input order.
pub fn analyze_batch(
    snapshots: &[Snapshot],
    options: &AnalyzerOptions,
    cancel: &CancellationToken,
) -> Vec<Result<AnalysisReport, AnalysisError>> {
    snapshots.par_iter().map(|snapshot| analyze(snapshot, options, cancel)).collect()
}

fn run_pass(snapshot: &Snapshot, options: &AnalyzerOptions) -> AnalysisReport {
    let table = DeclarationTable::from_snapshot(snapshot);
    let mut bag = DiagnosticBag::new(options.clone());

    // 1. Declarations that could not be merged
    for dup in &table.duplicates {
        bag.push(
            Diagnostic::new(
                DiagnosticKind::DuplicateDeclaration,
                &dup.name,
                &dup.location,
                format!("'{}' is declared more than once and is not extensible", dup.name),
            )
            .with_locations([dup.first.clone()]),
        );
    }

    // 2. Roles, needed before any rule can look at another type
    let mut ctx = TypeContext::new(&table);
    for decl in table.iter() {
        let declared = classify(decl, &mut bag);
        ctx.classified.insert(decl.name.clone(), declared);
    }
    debug!(types = ctx.classified.len(), "classification done");

    // 3. Per-type rules
    let mut facts: BTreeMap<TypeName, TypeFacts> = BTreeMap::new();
    for decl in table.iter() {
        let Some(declared) = ctx.declared(&decl.name).cloned() else {
            continue;
        };
        validate_constraints(decl, &declared, &mut bag);
        let selection = select_constructor(&ctx, decl, &declared, &mut bag);
        let exposes = if declared.role == Role::Service {
            service_exposed_types(&ctx, decl, &mut bag)
        } else {
            ExposedTypeSet::new()
        };
        let members = process_members(&ctx, decl, &declared, &mut bag);
        let modules = module_declaration(decl, declared.role);

        facts.insert(
            decl.name.clone(),
            TypeFacts { declared, location: decl.location.clone(), selection, exposes, members, modules },
        );
    }
    debug!(diagnostics = bag.len(), "per-type rules done");

    // 4. Graph, with unresolved dependencies and cycles already excluded
    let graph = GraphBuilder::new(&ctx, &mut bag).build(&facts);
    debug!(nodes = graph.len(), "graph built");

    AnalysisReport { diagnostics: bag.into_sorted(), graph }
}

fn module_declaration(decl: &TypeDecl, role: Role) -> Option<ModuleDeclaration> {
    if role != Role::Scope {
        return None;
    }
    match (&decl.modules, decl.auto_scan) {
        (Some(modules), false) => Some(ModuleDeclaration::Explicit {
            instantiate: modules.instantiate.clone(),
            expect: modules.expect.clone(),
        }),
        (None, true) => Some(ModuleDeclaration::AutoScan),
        // Missing or conflicting; already reported by the validator.
        _ => None,
    }
}

fn internal_failure(payload: &(dyn Any + Send)) -> AnalysisReport {
    let reason = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    error!(%reason, "analysis pass failed internally");

    let diagnostic = Diagnostic::new(
        DiagnosticKind::InternalError,
        &TypeName::new("<analysis>"),
        &Location::default(),
        format!("Internal analyzer failure: {}", reason),
    );
    AnalysisReport { diagnostics: vec![diagnostic], graph: Graph::new() }
}
