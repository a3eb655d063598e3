//! Defines the dependency graph handed from the per-type rules to cycle detection.
pub mod builder;
pub mod edge;
pub mod node;
pub mod storage;

// Re-export key types for convenient access
pub use builder::{GraphBuilder, TypeFacts};
pub use edge::{DependencyEdge, EdgeSource};
pub use node::{HostNode, ModuleDeclaration, Node, NodeKind, ScopeNode, ServiceNode, UserNode};
pub use storage::Graph;
