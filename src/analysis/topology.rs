//! Cycle detection over the Service constructor subgraph.
//!
//! Only `ConstructorParameter` edges are considered: injected members resolve
//! after attach and can never block construction.
use crate::graph::Graph;
use crate::store::TypeName;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::BTreeMap;

/// One elementary cycle, in traversal order starting from the first node entered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cycle {
    pub members: Vec<TypeName>,
}

impl Cycle {
    /// Renders the cycle closed back onto its start, e.g. `"A -> B -> A"`.
    pub fn describe(&self) -> String {
        let mut names: Vec<&str> = self.members.iter().map(TypeName::as_str).collect();
        if let Some(first) = names.first().copied() {
            names.push(first);
        }
        names.join(" -> ")
    }
}

/// Builds the Service-only constructor subgraph.
///
/// Node indices follow service name order. Each constructor edge is resolved to
/// every Service exposing its target type; edges nothing resolves are skipped
/// since they were already reported as unresolved dependencies.
pub fn service_subgraph(graph: &Graph) -> DiGraph<TypeName, ()> {
    let mut dag = DiGraph::new();
    let mut index: BTreeMap<&TypeName, NodeIndex> = BTreeMap::new();
    for (name, _) in graph.services() {
        index.insert(name, dag.add_node(name.clone()));
    }

    for (name, service) in graph.services() {
        let from = index[name];
        let mut seen: Vec<NodeIndex> = Vec::new();
        for edge in service.dependencies.iter().filter(|e| e.participates_in_cycles()) {
            for provider in graph.service_providers(&edge.to) {
                if let Some(&to) = index.get(provider) {
                    if !seen.contains(&to) {
                        seen.push(to);
                        dag.add_edge(from, to, ());
                    }
                }
            }
        }
    }
    dag
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum VisitState {
    None,
    OnStack,
    Done,
}

/// Finds the cycles of the Service constructor subgraph.
///
/// Iterative depth-first search with an explicit stack, so chain depth is not
/// bounded by the call stack. Every back edge yields the stack slice from its
/// target to the top; a node is never entered twice, so disjoint cycles are
/// reported once each and never share members.
pub fn find_cycles(graph: &Graph) -> Vec<Cycle> {
    let dag = service_subgraph(graph);
    let count = dag.node_count();

    // petgraph yields neighbors newest-first; flip to parameter order.
    let adjacency: Vec<Vec<NodeIndex>> = dag
        .node_indices()
        .map(|n| {
            let mut out: Vec<NodeIndex> = dag.neighbors(n).collect();
            out.reverse();
            out
        })
        .collect();

    let mut state = vec![VisitState::None; count];
    let mut cycles = Vec::new();

    for start in dag.node_indices() {
        if state[start.index()] != VisitState::None {
            continue;
        }

        // (node, position of the next neighbor to follow)
        let mut stack: Vec<(NodeIndex, usize)> = vec![(start, 0)];
        state[start.index()] = VisitState::OnStack;

        while let Some(top) = stack.last_mut() {
            let (node, cursor) = *top;
            let Some(&next) = adjacency[node.index()].get(cursor) else {
                state[node.index()] = VisitState::Done;
                stack.pop();
                continue;
            };
            top.1 += 1;

            match state[next.index()] {
                VisitState::None => {
                    state[next.index()] = VisitState::OnStack;
                    stack.push((next, 0));
                }
                VisitState::OnStack => {
                    let from = stack.iter().position(|&(n, _)| n == next).unwrap_or(0);
                    let members = stack[from..].iter().map(|&(n, _)| dag[n].clone()).collect();
                    cycles.push(Cycle { members });
                }
                VisitState::Done => {}
            }
        }
    }
    cycles
}
