//! Rule for exposed types: the types an instance is registered and looked up under.
use crate::store::{Location, Role, TypeDecl, TypeKind, TypeName};
use crate::type_system::TypeContext;
use crate::validation::{Diagnostic, DiagnosticBag, DiagnosticKind};
use smallvec::SmallVec;

pub type ExposedTypeSet = SmallVec<[TypeName; 2]>;

/// Validates that every exposed type is declared and implemented by `provider`.
///
/// Class-typed exposures are a Warning only when `warn_classes` is set. Returns
/// the exposed types that passed, in declaration order.
pub fn validate_exposed_types(
    ctx: &TypeContext<'_>,
    subject: &TypeName,
    provider: &TypeName,
    exposes: &[TypeName],
    location: &Location,
    warn_classes: bool,
    bag: &mut DiagnosticBag,
) -> ExposedTypeSet {
    let mut accepted = ExposedTypeSet::new();
    for exposed in exposes {
        let Some(exposed_decl) = ctx.decl(exposed) else {
            bag.push(Diagnostic::new(
                DiagnosticKind::UnknownType,
                subject,
                location,
                format!("Exposed type '{}' of '{}' is not declared", exposed, subject),
            ));
            continue;
        };
        if !ctx.table.implements(provider, exposed) {
            bag.push(Diagnostic::new(
                DiagnosticKind::ExposedTypeNotImplemented,
                subject,
                location,
                format!("'{}' does not implement or inherit exposed type '{}'", provider, exposed),
            ));
            continue;
        }
        if warn_classes && exposed_decl.kind != TypeKind::Interface {
            bag.push(Diagnostic::new(
                DiagnosticKind::ExposedTypeShouldBeInterface,
                subject,
                location,
                format!("Exposed type '{}' of '{}' should be an interface", exposed, subject),
            ));
        }
        if !accepted.contains(exposed) {
            accepted.push(exposed.clone());
        }
    }
    accepted
}

/// The exposed types of a Service: its markers' explicit lists, or the service
/// type itself when no list is given.
pub fn service_exposed_types(ctx: &TypeContext<'_>, decl: &TypeDecl, bag: &mut DiagnosticBag) -> ExposedTypeSet {
    debug_assert_eq!(ctx.role_of(&decl.name), Some(Role::Service));

    let explicit: Vec<TypeName> = decl.service.iter().flat_map(|m| m.exposes.iter().cloned()).collect();
    if explicit.is_empty() {
        return SmallVec::from_elem(decl.name.clone(), 1);
    }
    validate_exposed_types(ctx, &decl.name, &decl.name, &explicit, &decl.location, true, bag)
}
