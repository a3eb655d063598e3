//! storage.rs
//! Node map keyed by type identity, plus the exposed-type index over Services.

use super::edge::DependencyEdge;
use super::node::{HostNode, Node, ScopeNode, ServiceNode, UserNode};
use crate::store::TypeName;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, Serialize)]
pub struct Graph {
    nodes: BTreeMap<TypeName, Node>,
    /// Exposed type -> Service nodes exposing it, in name order.
    #[serde(skip)]
    service_exposures: BTreeMap<TypeName, Vec<TypeName>>,
}

impl Graph {
    pub fn new() -> Self { Self::default() }

    pub fn len(&self) -> usize { self.nodes.len() }

    pub fn is_empty(&self) -> bool { self.nodes.is_empty() }

    pub fn insert(&mut self, node: Node) {
        if let Some(service) = node.as_service() {
            for exposed in &service.exposes {
                let providers = self.service_exposures.entry(exposed.clone()).or_default();
                if !providers.contains(&node.name) {
                    providers.push(node.name.clone());
                    providers.sort();
                }
            }
        }
        self.nodes.insert(node.name.clone(), node);
    }

    pub fn get(&self, name: &TypeName) -> Option<&Node> { self.nodes.get(name) }

    pub fn contains(&self, name: &TypeName) -> bool { self.nodes.contains_key(name) }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> { self.nodes.values() }

    pub fn services(&self) -> impl Iterator<Item = (&TypeName, &ServiceNode)> {
        self.nodes.iter().filter_map(|(name, node)| node.as_service().map(|s| (name, s)))
    }

    pub fn hosts(&self) -> impl Iterator<Item = (&TypeName, &HostNode)> {
        self.nodes.iter().filter_map(|(name, node)| node.as_host().map(|h| (name, h)))
    }

    pub fn users(&self) -> impl Iterator<Item = (&TypeName, &UserNode)> {
        self.nodes.iter().filter_map(|(name, node)| node.as_user().map(|u| (name, u)))
    }

    pub fn scopes(&self) -> impl Iterator<Item = (&TypeName, &ScopeNode)> {
        self.nodes.iter().filter_map(|(name, node)| node.as_scope().map(|s| (name, s)))
    }

    pub fn edges(&self) -> impl Iterator<Item = &DependencyEdge> { self.nodes.values().flat_map(Node::edges) }

    /// The Service nodes exposing `exposed`. Empty if none.
    pub fn service_providers(&self, exposed: &TypeName) -> &[TypeName] {
        self.service_exposures.get(exposed).map(Vec::as_slice).unwrap_or_default()
    }

    /// Whether any Service or Host in the graph supplies `exposed`.
    pub fn is_provided(&self, exposed: &TypeName) -> bool {
        self.service_exposures.contains_key(exposed) || self.hosts().any(|(_, h)| h.provided_services.contains(exposed))
    }

    /// Keeps only the nodes for which `keep` holds; scopes forget removed module entries.
    pub fn retain(&mut self, keep: impl Fn(&TypeName) -> bool) {
        self.nodes.retain(|name, _| keep(name));
        for node in self.nodes.values_mut() {
            if let Some(scope) = node.as_scope_mut() {
                scope.retain_sources(&keep);
            }
        }
        for providers in self.service_exposures.values_mut() {
            providers.retain(|p| keep(p));
        }
        self.service_exposures.retain(|_, providers| !providers.is_empty());
    }
}
