//! Defines the graph nodes: one per validated Service, Host, User or Scope type.
use super::edge::DependencyEdge;
use crate::store::{Lifetime, Location, Role, TypeName};
use crate::type_system::{ConstructorSelection, ExposedTypeSet, Provision};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// How a Scope names the services it owns and the hosts it expects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ModuleDeclaration {
    Explicit { instantiate: Vec<TypeName>, expect: Vec<TypeName> },
    /// Every graph Service is instantiated and every graph Host is expected.
    AutoScan,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceNode {
    pub lifetime: Lifetime,
    pub exposes: ExposedTypeSet,
    pub constructor: ConstructorSelection,
    /// One `ConstructorParameter` edge per parameter, in parameter order.
    pub dependencies: Vec<DependencyEdge>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostNode {
    pub provisions: Vec<Provision>,
    /// Union of every provision's exposed types.
    pub provided_services: BTreeSet<TypeName>,
}

impl HostNode {
    pub fn new(provisions: Vec<Provision>) -> Self {
        let provided_services = provisions.iter().flat_map(|p| p.exposes.iter().cloned()).collect();
        Self { provisions, provided_services }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserNode {
    /// One `InjectedMember` edge per injected member.
    pub injections: Vec<DependencyEdge>,
    pub services_ready: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScopeNode {
    pub modules: ModuleDeclaration,
    /// Resolved Service nodes this scope constructs on attach.
    pub instantiate: Vec<TypeName>,
    /// Resolved Host nodes expected to register into this scope.
    pub expect: Vec<TypeName>,
    /// Exposed type -> the service or host supplying it.
    pub all_provided_services: BTreeMap<TypeName, TypeName>,
}

impl ScopeNode {
    /// Drops module entries that no longer have a node, with everything they supplied.
    pub(crate) fn retain_sources(&mut self, keep: impl Fn(&TypeName) -> bool) {
        self.instantiate.retain(|s| keep(s));
        self.expect.retain(|h| keep(h));
        self.all_provided_services.retain(|_, source| keep(source));
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum NodeKind {
    Service(ServiceNode),
    Host(HostNode),
    User(UserNode),
    HostAndUser { host: HostNode, user: UserNode },
    Scope(ScopeNode),
}

/// A validated type in the dependency graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Node {
    pub name: TypeName,
    pub location: Location,
    pub kind: NodeKind,
}

impl Node {
    pub fn role(&self) -> Role {
        match self.kind {
            NodeKind::Service(_) => Role::Service,
            NodeKind::Host(_) => Role::Host,
            NodeKind::User(_) => Role::User,
            NodeKind::HostAndUser { .. } => Role::HostAndUser,
            NodeKind::Scope(_) => Role::Scope,
        }
    }

    pub fn as_service(&self) -> Option<&ServiceNode> {
        match &self.kind {
            NodeKind::Service(s) => Some(s),
            _ => None,
        }
    }

    /// Host data for both `Host` and `HostAndUser` nodes.
    pub fn as_host(&self) -> Option<&HostNode> {
        match &self.kind {
            NodeKind::Host(h) | NodeKind::HostAndUser { host: h, .. } => Some(h),
            _ => None,
        }
    }

    /// User data for both `User` and `HostAndUser` nodes.
    pub fn as_user(&self) -> Option<&UserNode> {
        match &self.kind {
            NodeKind::User(u) | NodeKind::HostAndUser { user: u, .. } => Some(u),
            _ => None,
        }
    }

    pub fn as_scope(&self) -> Option<&ScopeNode> {
        match &self.kind {
            NodeKind::Scope(s) => Some(s),
            _ => None,
        }
    }

    pub(crate) fn as_scope_mut(&mut self) -> Option<&mut ScopeNode> {
        match &mut self.kind {
            NodeKind::Scope(s) => Some(s),
            _ => None,
        }
    }

    /// All outgoing dependency edges, constructor and injected alike.
    pub fn edges(&self) -> impl Iterator<Item = &DependencyEdge> {
        let ctor = self.as_service().map(|s| s.dependencies.as_slice()).unwrap_or_default();
        let injected = self.as_user().map(|u| u.injections.as_slice()).unwrap_or_default();
        ctor.iter().chain(injected)
    }
}
