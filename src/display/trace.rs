//! Renders a scope's service closure as an indented text tree for verbose build output.
use crate::graph::{DependencyEdge, Graph, ModuleDeclaration, Node, ScopeNode};
use crate::store::TypeName;
use std::collections::HashMap;
use std::fmt::Write;

pub fn format_scope_trace(graph: &Graph, scope: &TypeName) -> String {
    let mut tracer = Tracer { graph, visited_at_level: HashMap::new(), output: String::new() };

    match graph.get(scope).and_then(Node::as_scope) {
        Some(node) => {
            let modules = match node.modules {
                ModuleDeclaration::Explicit { .. } => "explicit modules",
                ModuleDeclaration::AutoScan => "auto-scan",
            };
            let _ = writeln!(tracer.output, "SCOPE TRACE for '{}':", scope);
            let _ = writeln!(tracer.output, "--------------------------------------------------");
            let _ = writeln!(tracer.output, "[L1] {} ({})", scope, modules);

            let children: Vec<&TypeName> = node.instantiate.iter().chain(&node.expect).collect();
            for (i, child) in children.iter().enumerate() {
                let connector = if i == children.len() - 1 { "`--" } else { "|--" };
                tracer.trace_node(child, 2, connector, "", node);
            }
        }
        None => {
            let _ = writeln!(tracer.output, "Error: '{}' is not a scope in the graph", scope);
        }
    }
    tracer.output
}

struct Tracer<'a> {
    graph: &'a Graph,
    visited_at_level: HashMap<TypeName, usize>,
    output: String,
}

impl<'a> Tracer<'a> {
    /// `prefix` holds only tree connectors; `label` is printed between it and the node.
    fn trace_node(&mut self, name: &TypeName, level: usize, prefix: &str, label: &str, scope: &ScopeNode) {
        if let Some(&first_seen) = self.visited_at_level.get(name) {
            let _ = writeln!(self.output, "{}{}{} -> (Ref to L{})", prefix, label, name, first_seen);
            return;
        }
        let Some(node) = self.graph.get(name) else {
            let _ = writeln!(self.output, "{}{}{} [missing]", prefix, label, name);
            return;
        };
        self.visited_at_level.insert(name.clone(), level);

        let line_header = format!("{}{}[L{}] {}", prefix, label, level, name);
        if let Some(service) = node.as_service() {
            let _ = writeln!(self.output, "{} [{}] exposes {}", line_header, service.lifetime, join(&service.exposes));
            self.trace_dependencies(prefix, &service.dependencies, level, scope);
        } else if let Some(host) = node.as_host() {
            let _ = writeln!(self.output, "{} [Host] provides {}", line_header, join(&host.provided_services));
        } else {
            let _ = writeln!(self.output, "{} [{}]", line_header, node.role());
        }
    }

    fn trace_dependencies(&mut self, prefix: &str, deps: &[DependencyEdge], level: usize, scope: &ScopeNode) {
        let stem = build_child_stem(prefix);
        for (i, edge) in deps.iter().enumerate() {
            let connector = if i == deps.len() - 1 { "`--" } else { "|--" };
            let full_prefix = format!("{}{}", stem, connector);
            let label = format!("{}: {} <- ", edge.via, edge.to);

            match scope.all_provided_services.get(&edge.to) {
                Some(source) => self.trace_node(source, level + 1, &full_prefix, &label, scope),
                None => {
                    let _ = writeln!(self.output, "{}{}: {} (from an enclosing scope)", full_prefix, edge.via, edge.to);
                }
            }
        }
    }
}

fn build_child_stem(current_prefix: &str) -> String {
    current_prefix.replace("`--", "   ").replace("|--", "|  ")
}

fn join<'a>(names: impl IntoIterator<Item = &'a TypeName>) -> String {
    names.into_iter().map(TypeName::as_str).collect::<Vec<_>>().join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{analyze, AnalyzerOptions, CancellationToken};
    use crate::store::Snapshot;

    const WORLD: &str = r#"{"types": [
        {"name": "IClock", "kind": "Interface"},
        {"name": "ISpawner", "kind": "Interface"},
        {"name": "ILog", "kind": "Interface"},
        {"name": "SystemClock", "bases": ["IClock"]},
        {"name": "Spawner", "extensible": true, "bases": ["ISpawner"],
         "service": [{"lifetime": "Singleton", "exposes": ["ISpawner"]}],
         "constructors": [{"params": [{"name": "clock", "ty": "IClock"}, {"name": "log", "ty": "ILog"}]}]},
        {"name": "Log", "extensible": true, "bases": ["ILog"],
         "service": [{"lifetime": "Transient", "exposes": ["ILog"]}],
         "constructors": [{}]},
        {"name": "ClockHost", "extensible": true, "host": true, "capabilities": ["HierarchyMember"],
         "members": [{"name": "clock", "ty": "SystemClock", "kind": {"Field": {"read_only": false}},
                      "provide": {"exposes": ["IClock"]}}]},
        {"name": "World", "extensible": true, "capabilities": ["Scope", "HierarchyMember"],
         "modules": {"instantiate": ["Spawner"], "expect": ["ClockHost"]}}
    ]}"#;

    fn world_graph() -> Graph {
        let snapshot = Snapshot::from_json_str(WORLD).unwrap();
        let report = analyze(&snapshot, &AnalyzerOptions::default(), &CancellationToken::new()).unwrap();
        assert!(report.diagnostics.is_empty(), "{:?}", report.diagnostics);
        report.graph
    }

    #[test]
    fn test_scope_trace_tree() {
        let trace = format_scope_trace(&world_graph(), &"World".into());
        let expected = "\
SCOPE TRACE for 'World':
--------------------------------------------------
[L1] World (explicit modules)
|--[L2] Spawner [Singleton] exposes ISpawner
|  |--clock: IClock <- [L3] ClockHost [Host] provides IClock
|  `--log: ILog (from an enclosing scope)
`--ClockHost -> (Ref to L3)
";
        assert_eq!(trace, expected);
    }

    #[test]
    fn test_trace_of_non_scope() {
        let trace = format_scope_trace(&world_graph(), &"Spawner".into());
        assert!(trace.starts_with("Error: 'Spawner' is not a scope"));
    }
}
