//! Derives a single `Role` from the raw markers on a declaration.
use crate::store::{Capability, DeclaredType, Lifetime, Role, TypeDecl};
use crate::validation::{Diagnostic, DiagnosticBag, DiagnosticKind};

/// Classifies one declaration.
///
/// Decision order: the Scope capability wins, then any Service marker, then
/// Host+User, Host, User, and finally `Role::None`. Conflicts found on the way
/// are reported but never change the chosen role, so later rules still run.
pub fn classify(decl: &TypeDecl, bag: &mut DiagnosticBag) -> DeclaredType {
    let role = if decl.has(Capability::Scope) {
        Role::Scope
    } else if !decl.service.is_empty() {
        Role::Service
    } else if decl.host && decl.user {
        Role::HostAndUser
    } else if decl.host {
        Role::Host
    } else if decl.user {
        Role::User
    } else {
        Role::None
    };

    let lifetime = match role {
        Role::Service => {
            let singleton = decl.service.iter().any(|m| m.lifetime == Lifetime::Singleton);
            let transient = decl.service.iter().any(|m| m.lifetime == Lifetime::Transient);
            if singleton && transient {
                bag.push(Diagnostic::new(
                    DiagnosticKind::LifetimeConflict,
                    &decl.name,
                    &decl.location,
                    format!("Service '{}' is marked both Singleton and Transient", decl.name),
                ));
            }
            decl.service.first().map(|m| m.lifetime)
        }
        _ => None,
    };

    let services_ready = decl.has(Capability::ServicesReady);
    if services_ready && !role.injects() {
        bag.push(Diagnostic::new(
            DiagnosticKind::ServicesReadyRequiresUser,
            &decl.name,
            &decl.location,
            format!(
                "'{}' declares the services-ready capability but its role is {}; it needs the User or HostAndUser role",
                decl.name, role
            ),
        ));
    }

    DeclaredType {
        name: decl.name.clone(),
        role,
        lifetime,
        hierarchy_member: decl.has(Capability::HierarchyMember),
        services_ready,
    }
}
