//! Defines the `DependencyEdge` type, representing a dependency between two types.
use crate::store::{Location, TypeName};
use serde::Serialize;

/// Where a dependency was declared.
///
/// Only constructor edges take part in cycle detection: injected members are
/// resolved after attach, so they can never block construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum EdgeSource {
    ConstructorParameter,
    InjectedMember,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DependencyEdge {
    pub from: TypeName,
    /// The exposed type being asked for, not the type that ends up providing it.
    pub to: TypeName,
    pub source: EdgeSource,
    /// The parameter or member name the edge came from.
    pub via: String,
    pub location: Location,
}

impl DependencyEdge {
    pub fn participates_in_cycles(&self) -> bool { self.source == EdgeSource::ConstructorParameter }
}
