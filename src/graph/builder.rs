//! builder.rs
//! Assembles the dependency graph from the per-type analysis results.

use super::edge::{DependencyEdge, EdgeSource};
use super::node::{HostNode, ModuleDeclaration, Node, NodeKind, ScopeNode, ServiceNode, UserNode};
use super::storage::Graph;
use crate::analysis::topology::{find_cycles, Cycle};
use crate::store::{DeclaredType, Location, Role, TypeName};
use crate::type_system::{ConstructorSelection, ExposedTypeSet, ProcessedMembers, TypeContext};
use crate::validation::{Diagnostic, DiagnosticBag, DiagnosticKind};
use std::collections::BTreeMap;
use tracing::debug;

/// Everything the per-type stages learned about one type.
#[derive(Debug, Clone)]
pub struct TypeFacts {
    pub declared: DeclaredType,
    pub location: Location,
    pub selection: Option<ConstructorSelection>,
    /// Exposed types of a Service; empty for other roles.
    pub exposes: ExposedTypeSet,
    pub members: ProcessedMembers,
    pub modules: Option<ModuleDeclaration>,
}

pub struct GraphBuilder<'a, 'b> {
    ctx: &'b TypeContext<'a>,
    bag: &'b mut DiagnosticBag,
    graph: Graph,
}

impl<'a, 'b> GraphBuilder<'a, 'b> {
    pub fn new(ctx: &'b TypeContext<'a>, bag: &'b mut DiagnosticBag) -> Self {
        Self { ctx, bag, graph: Graph::new() }
    }

    /// Builds the graph. Types carrying an Error diagnostic never get a node, and
    /// neither does a service whose constructor closure reaches an excluded type.
    pub fn build(mut self, facts: &BTreeMap<TypeName, TypeFacts>) -> Graph {
        // 1. Service, Host and User nodes
        for (name, fact) in facts {
            if self.bag.has_errors(name) {
                continue;
            }
            if let Some(kind) = self.member_node_kind(name, fact) {
                self.graph.insert(Node { name: name.clone(), location: fact.location.clone(), kind });
            }
        }

        // 2. Constructor edges must point at something that is provided somewhere
        self.prune_unresolved();

        // 3. Cycle members go next; whatever depended on them is now unresolved too
        if self.exclude_cycles() {
            self.prune_unresolved();
        }

        // 4. Scopes resolve their modules against the surviving nodes
        for (name, fact) in facts {
            if fact.declared.role != Role::Scope || self.bag.has_errors(name) {
                continue;
            }
            if let Some(modules) = &fact.modules {
                let scope = self.resolve_scope(name, &fact.location, modules);
                if !self.bag.has_errors(name) {
                    self.graph.insert(Node { name: name.clone(), location: fact.location.clone(), kind: NodeKind::Scope(scope) });
                }
            }
        }

        self.graph
    }

    fn member_node_kind(&self, name: &TypeName, fact: &TypeFacts) -> Option<NodeKind> {
        let kind = match fact.declared.role {
            Role::Service => {
                let constructor = fact.selection.clone()?;
                let dependencies = constructor
                    .params
                    .iter()
                    .map(|p| DependencyEdge {
                        from: name.clone(),
                        to: p.ty.clone(),
                        source: EdgeSource::ConstructorParameter,
                        via: p.name.clone(),
                        location: p.location.clone(),
                    })
                    .collect();
                NodeKind::Service(ServiceNode {
                    lifetime: fact.declared.lifetime?,
                    exposes: fact.exposes.clone(),
                    constructor,
                    dependencies,
                })
            }
            Role::Host => NodeKind::Host(HostNode::new(fact.members.provisions.clone())),
            Role::User => NodeKind::User(self.user_node(name, fact)),
            Role::HostAndUser => NodeKind::HostAndUser {
                host: HostNode::new(fact.members.provisions.clone()),
                user: self.user_node(name, fact),
            },
            Role::Scope | Role::None => return None,
        };
        Some(kind)
    }

    fn user_node(&self, name: &TypeName, fact: &TypeFacts) -> UserNode {
        let injections = fact
            .members
            .injections
            .iter()
            .map(|i| DependencyEdge {
                from: name.clone(),
                to: i.ty.clone(),
                source: EdgeSource::InjectedMember,
                via: i.member.clone(),
                location: i.location.clone(),
            })
            .collect();
        UserNode { injections, services_ready: fact.declared.services_ready }
    }

    /// Reports and removes services with an unprovided constructor edge until
    /// every remaining service has its whole constructor closure in the graph.
    fn prune_unresolved(&mut self) {
        loop {
            let before = self.graph.len();
            self.report_unresolved_dependencies();
            let bag = &*self.bag;
            self.graph.retain(|name| !bag.has_errors(name));
            if self.graph.len() == before {
                break;
            }
            debug!(removed = before - self.graph.len(), "services pruned for unresolved dependencies");
        }
    }

    /// Reports every elementary cycle and removes its members. Returns whether anything was removed.
    fn exclude_cycles(&mut self) -> bool {
        let cycles = find_cycles(&self.graph);
        for cycle in &cycles {
            self.report_cycle(cycle);
        }
        let bag = &*self.bag;
        self.graph.retain(|name| !bag.has_errors(name));
        !cycles.is_empty()
    }

    /// One diagnostic per cycle, on its first member; the others are excluded silently.
    fn report_cycle(&mut self, cycle: &Cycle) {
        let Some(first) = cycle.members.first() else {
            return;
        };
        let graph = &self.graph;
        let location_of = |name: &TypeName| graph.get(name).map(|n| n.location.clone()).unwrap_or_default();

        self.bag.push(
            Diagnostic::new(
                DiagnosticKind::CircularDependency,
                first,
                &location_of(first),
                format!("Circular dependency detected: {}", cycle.describe()),
            )
            .with_locations(cycle.members[1..].iter().map(location_of)),
        );
        for member in &cycle.members[1..] {
            self.bag.exclude(member);
        }
    }

    fn report_unresolved_dependencies(&mut self) {
        let unresolved: Vec<Diagnostic> = self
            .graph
            .services()
            .flat_map(|(_, s)| s.dependencies.iter())
            .filter(|edge| !self.graph.is_provided(&edge.to))
            .map(|edge| {
                Diagnostic::new(
                    DiagnosticKind::UnresolvedDependency,
                    &edge.from,
                    &edge.location,
                    format!(
                        "'{}' depends on '{}' (parameter '{}') but no Service or Host provides it",
                        edge.from, edge.to, edge.via
                    ),
                )
            })
            .collect();
        self.bag.extend(unresolved);
    }

    fn resolve_scope(&mut self, name: &TypeName, location: &Location, modules: &ModuleDeclaration) -> ScopeNode {
        let (instantiate, expect) = match modules {
            ModuleDeclaration::Explicit { instantiate, expect } => {
                let mut services = Vec::new();
                for entry in instantiate {
                    match self.check_module_entry(name, location, entry, Role::Service) {
                        Ok(()) => services.push(entry.clone()),
                        Err(Some(d)) => self.bag.push(d),
                        Err(None) => {}
                    }
                }
                let mut hosts = Vec::new();
                for entry in expect {
                    match self.check_module_entry(name, location, entry, Role::Host) {
                        Ok(()) => hosts.push(entry.clone()),
                        Err(Some(d)) => self.bag.push(d),
                        Err(None) => {}
                    }
                }
                (services, hosts)
            }
            ModuleDeclaration::AutoScan => {
                let services: Vec<TypeName> = self.graph.services().map(|(n, _)| n.clone()).collect();
                let hosts: Vec<TypeName> = self.graph.hosts().map(|(n, _)| n.clone()).collect();
                if self.bag.options().report_auto_scan {
                    self.bag.push(Diagnostic::new(
                        DiagnosticKind::AutoScanSummary,
                        name,
                        location,
                        format!(
                            "Scope '{}' auto-scan collected {} services and {} hosts",
                            name,
                            services.len(),
                            hosts.len()
                        ),
                    ));
                }
                (services, hosts)
            }
        };

        // Collect every (exposed type, source) pair of the closure, services first.
        let mut supplied: Vec<(TypeName, &TypeName, &Location)> = Vec::new();
        for service in &instantiate {
            if let Some(node) = self.graph.get(service) {
                let exposes = node.as_service().map(|s| s.exposes.as_slice()).unwrap_or_default();
                supplied.extend(exposes.iter().map(|e| (e.clone(), service, &node.location)));
            }
        }
        for host in &expect {
            if let Some(node) = self.graph.get(host) {
                if let Some(h) = node.as_host() {
                    supplied.extend(h.provided_services.iter().map(|e| (e.clone(), host, &node.location)));
                }
            }
        }

        let mut all_provided_services: BTreeMap<TypeName, TypeName> = BTreeMap::new();
        let mut conflicts = Vec::new();
        for (exposed, source, source_location) in supplied {
            match all_provided_services.get(&exposed) {
                None => {
                    all_provided_services.insert(exposed, source.clone());
                }
                Some(first) if first == source => {}
                Some(first) => {
                    let first_location = self.graph.get(first).map(|n| n.location.clone()).unwrap_or_default();
                    conflicts.push(
                        Diagnostic::new(
                            DiagnosticKind::DuplicateProvider,
                            name,
                            location,
                            format!(
                                "Scope '{}' receives '{}' from both '{}' and '{}'",
                                name, exposed, first, source
                            ),
                        )
                        .with_locations([first_location, source_location.clone()]),
                    );
                }
            }
        }
        self.bag.extend(conflicts);

        ScopeNode { modules: modules.clone(), instantiate, expect, all_provided_services }
    }

    /// Checks one module entry resolves to a node of the wanted role.
    ///
    /// `Err(None)` means the entry's type was already rejected and reported.
    fn check_module_entry(
        &self,
        scope: &TypeName,
        location: &Location,
        entry: &TypeName,
        wanted: Role,
    ) -> Result<(), Option<Diagnostic>> {
        let resolved = match self.graph.get(entry) {
            Some(node) if wanted == Role::Service => node.as_service().is_some(),
            Some(node) => node.as_host().is_some(),
            None => false,
        };
        if resolved {
            return Ok(());
        }

        let (kind, message) = match self.ctx.role_of(entry) {
            None => (
                DiagnosticKind::UnknownType,
                format!("Module entry '{}' of scope '{}' is not declared", entry, scope),
            ),
            Some(role) if matches_wanted(role, wanted) => return Err(None),
            Some(_) if wanted == Role::Service => (
                DiagnosticKind::ModuleEntryNotService,
                format!("Instantiated module entry '{}' of scope '{}' must be a service", entry, scope),
            ),
            Some(_) => (
                DiagnosticKind::ModuleEntryNotHost,
                format!("Expected module entry '{}' of scope '{}' must be a host", entry, scope),
            ),
        };
        Err(Some(Diagnostic::new(kind, scope, location, message)))
    }
}

fn matches_wanted(role: Role, wanted: Role) -> bool {
    match wanted {
        Role::Service => role == Role::Service,
        _ => role.provides(),
    }
}
