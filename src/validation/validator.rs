//! Per-role structural constraints, independent of the dependency graph.
use super::collector::DiagnosticBag;
use super::error::{Diagnostic, DiagnosticKind};
use crate::store::{DeclaredType, Role, TypeDecl};

/// Applies the role constraints to one classified declaration.
///
/// Like a linter, every violated rule is reported; nothing short-circuits.
pub fn validate_constraints(decl: &TypeDecl, declared: &DeclaredType, bag: &mut DiagnosticBag) {
    let role = declared.role;
    let mut report = |kind: DiagnosticKind, message: String| {
        bag.push(Diagnostic::new(kind, &decl.name, &decl.location, message));
    };

    // 1. Hierarchy membership
    if role == Role::Service && declared.hierarchy_member {
        report(
            DiagnosticKind::ServiceIsHierarchyMember,
            format!("Service '{}' must be a plain object, not a hierarchy member", decl.name),
        );
    }
    if role.is_hierarchy_role() && !declared.hierarchy_member {
        report(
            DiagnosticKind::HierarchyMemberRequired,
            format!("{} '{}' must be a hierarchy member to receive attach/detach notifications", role, decl.name),
        );
    }

    // 2. Module configuration
    if role == Role::Scope {
        match (decl.modules.is_some(), decl.auto_scan) {
            (false, false) => report(
                DiagnosticKind::MissingModules,
                format!("Scope '{}' declares no modules; declare a module list or auto-scan", decl.name),
            ),
            (true, true) => report(
                DiagnosticKind::ConflictingModules,
                format!("Scope '{}' declares both a module list and auto-scan", decl.name),
            ),
            _ => {}
        }
        for marker in &decl.service {
            report(
                DiagnosticKind::MarkerConflict,
                format!("Scope '{}' cannot carry a {} Service marker", decl.name, marker.lifetime),
            );
        }
        if decl.host {
            report(DiagnosticKind::MarkerConflict, format!("Scope '{}' cannot carry a Host marker", decl.name));
        }
        if decl.user {
            report(DiagnosticKind::MarkerConflict, format!("Scope '{}' cannot carry a User marker", decl.name));
        }
    } else {
        if decl.modules.is_some() {
            report(
                DiagnosticKind::MarkerConflict,
                format!("The Modules marker on '{}' requires the Scope capability", decl.name),
            );
        }
        if decl.auto_scan {
            report(
                DiagnosticKind::MarkerConflict,
                format!("The auto-scan marker on '{}' requires the Scope capability", decl.name),
            );
        }
        if role == Role::Service && (decl.host || decl.user) {
            report(
                DiagnosticKind::MarkerConflict,
                format!("Service '{}' cannot also carry Host or User markers", decl.name),
            );
        }
    }

    // 3. Extensibility
    if decl.is_di_relevant() && !decl.extensible {
        report(
            DiagnosticKind::NotExtensible,
            format!("'{}' takes part in injection and must be declared in extensible (partial) form", decl.name),
        );
    }
}
