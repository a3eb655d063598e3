//! Rule for what may appear as a constructor parameter or an injected member.
use crate::store::{Capability, Role, TypeKind, TypeName};
use crate::type_system::TypeContext;
use std::fmt;

/// Why a type cannot be injected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InjectTypeProblem {
    /// The type is not part of the snapshot.
    Unknown,
    OpenGeneric,
    HierarchyMember,
    /// Hierarchy-resident DI roles are wired by attach/detach, never injected.
    DiRole(Role),
    NotInstantiable(TypeKind),
}

impl fmt::Display for InjectTypeProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InjectTypeProblem::Unknown => f.write_str("the type is not declared"),
            InjectTypeProblem::OpenGeneric => f.write_str("open generic types cannot be injected"),
            InjectTypeProblem::HierarchyMember => f.write_str("hierarchy members cannot be injected"),
            InjectTypeProblem::DiRole(role) => write!(f, "{} types cannot be injected", role),
            InjectTypeProblem::NotInstantiable(kind) => {
                write!(f, "only interfaces and concrete classes can be injected (found {:?})", kind)
            }
        }
    }
}

/// Checks that `ty` is a valid inject type: declared, closed, not a hierarchy
/// member, not Host/User/Scope classified, and an interface or concrete class.
pub fn check_inject_type(ctx: &TypeContext<'_>, ty: &TypeName) -> Result<(), InjectTypeProblem> {
    let decl = ctx.decl(ty).ok_or(InjectTypeProblem::Unknown)?;

    if decl.open_generic {
        return Err(InjectTypeProblem::OpenGeneric);
    }
    if decl.has(Capability::HierarchyMember) {
        return Err(InjectTypeProblem::HierarchyMember);
    }
    if let Some(role) = ctx.role_of(ty) {
        if role.is_hierarchy_role() {
            return Err(InjectTypeProblem::DiRole(role));
        }
    }
    match decl.kind {
        TypeKind::Interface | TypeKind::Class => Ok(()),
        kind => Err(InjectTypeProblem::NotInstantiable(kind)),
    }
}
