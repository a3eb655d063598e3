//! Per-type analysis: classification into DI roles and the constructor,
//! member and exposed-type rules that run once roles are known.
//!
//! Every rule reports into a shared `DiagnosticBag` and keeps going, so a
//! single pass surfaces every structural problem in the snapshot.

pub use self::classifier::classify;
pub use self::rules::constructors::{select_constructor, ConstructorSelection};
pub use self::rules::exposure::{service_exposed_types, validate_exposed_types, ExposedTypeSet};
pub use self::rules::inject::{check_inject_type, InjectTypeProblem};
pub use self::rules::members::{process_members, Injection, ProcessedMembers, Provision};

use crate::store::{DeclarationTable, DeclaredType, Role, TypeDecl, TypeName};
use std::collections::BTreeMap;

// --- MODULE DECLARATIONS ---
mod classifier;
mod rules {
    pub mod constructors;
    pub mod exposure;
    pub mod inject;
    pub mod members;
}

/// The declaration table together with the roles derived for every type.
pub struct TypeContext<'a> {
    pub table: &'a DeclarationTable,
    pub classified: BTreeMap<TypeName, DeclaredType>,
}

impl<'a> TypeContext<'a> {
    pub fn new(table: &'a DeclarationTable) -> Self {
        Self { table, classified: BTreeMap::new() }
    }

    pub fn decl(&self, ty: &TypeName) -> Option<&'a TypeDecl> { self.table.get(ty) }

    pub fn declared(&self, ty: &TypeName) -> Option<&DeclaredType> { self.classified.get(ty) }

    pub fn role_of(&self, ty: &TypeName) -> Option<Role> { self.classified.get(ty).map(|d| d.role) }
}
