//! A minimal parent/child object hierarchy that delivers lifecycle notifications.
//!
//! Nodes live in an arena and refer to each other by `NodeHandle`, so parent
//! links are lookups rather than owning pointers. Attaching a subtree notifies
//! attach in pre-order (parents first, so a scope exists before its hosts
//! register) and ready in post-order. Detach runs in post-order.
use super::error::RuntimeError;
use super::host::HostBinding;
use super::scope::Scope;
use super::user::UserBinding;
use std::fmt;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeHandle(u32);

impl NodeHandle {
    pub fn index(self) -> usize { self.0 as usize }
}

impl fmt::Display for NodeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "#{}", self.0) }
}

/// What a node does when lifecycle notifications reach it.
pub enum NodeRole {
    Plain,
    Scope(Scope),
    Host(HostBinding),
    User(UserBinding),
    /// The host side registers before the user side resolves.
    HostAndUser(HostBinding, UserBinding),
}

struct HierarchyNode {
    name: String,
    role: NodeRole,
    parent: Option<NodeHandle>,
    children: Vec<NodeHandle>,
    attached: bool,
}

#[derive(Default)]
pub struct Hierarchy {
    nodes: Vec<HierarchyNode>,
    root: Option<NodeHandle>,
}

impl Hierarchy {
    pub fn new() -> Self { Self::default() }

    /// Creates a detached node.
    pub fn create(&mut self, name: impl Into<String>, role: NodeRole) -> NodeHandle {
        let handle = NodeHandle(self.nodes.len() as u32);
        self.nodes.push(HierarchyNode { name: name.into(), role, parent: None, children: Vec::new(), attached: false });
        handle
    }

    pub fn name(&self, handle: NodeHandle) -> Result<&str, RuntimeError> { Ok(&self.node(handle)?.name) }

    pub fn role(&self, handle: NodeHandle) -> Result<&NodeRole, RuntimeError> { Ok(&self.node(handle)?.role) }

    pub fn parent(&self, handle: NodeHandle) -> Option<NodeHandle> { self.nodes.get(handle.index())?.parent }

    pub fn is_attached(&self, handle: NodeHandle) -> bool { self.nodes.get(handle.index()).is_some_and(|n| n.attached) }

    /// The closest Scope strictly above `handle`.
    pub fn nearest_scope(&self, handle: NodeHandle) -> Option<Scope> {
        let mut current = self.parent(handle);
        while let Some(h) = current {
            let node = self.nodes.get(h.index())?;
            if let NodeRole::Scope(scope) = &node.role {
                return Some(scope.clone());
            }
            current = node.parent;
        }
        None
    }

    /// Makes `handle` the attached root and notifies its whole subtree.
    ///
    /// Returns the unresolved-service errors collected at ready.
    pub fn set_root(&mut self, handle: NodeHandle) -> Result<Vec<RuntimeError>, RuntimeError> {
        let node = self.node(handle)?;
        if node.parent.is_some() || self.root.is_some() {
            return Err(RuntimeError::AlreadyParented(handle.0));
        }
        self.root = Some(handle);
        Ok(self.attach_subtree(handle))
    }

    /// Links `child` under `parent`; notifies the child's subtree if `parent` is attached.
    pub fn add_child(&mut self, parent: NodeHandle, child: NodeHandle) -> Result<Vec<RuntimeError>, RuntimeError> {
        self.node(parent)?;
        if self.node(child)?.parent.is_some() || self.root == Some(child) {
            return Err(RuntimeError::AlreadyParented(child.0));
        }
        let mut current = Some(parent);
        while let Some(h) = current {
            if h == child {
                return Err(RuntimeError::WouldCycle { parent: parent.0, child: child.0 });
            }
            current = self.parent(h);
        }

        self.nodes[child.index()].parent = Some(parent);
        self.nodes[parent.index()].children.push(child);
        if self.nodes[parent.index()].attached {
            return Ok(self.attach_subtree(child));
        }
        Ok(Vec::new())
    }

    /// Unlinks `child` from `parent`, detaching its subtree first if attached.
    ///
    /// Returns the disposal failures reported by detached scopes.
    pub fn remove_child(&mut self, parent: NodeHandle, child: NodeHandle) -> Result<Vec<RuntimeError>, RuntimeError> {
        self.node(parent)?;
        if self.node(child)?.parent != Some(parent) {
            return Err(RuntimeError::NotAChild { parent: parent.0, child: child.0 });
        }
        let failures = if self.nodes[child.index()].attached { self.detach_subtree(child) } else { Vec::new() };

        self.nodes[parent.index()].children.retain(|&c| c != child);
        self.nodes[child.index()].parent = None;
        Ok(failures)
    }

    /// Detaches the whole tree and clears the root.
    pub fn clear_root(&mut self) -> Vec<RuntimeError> {
        match self.root.take() {
            Some(root) => self.detach_subtree(root),
            None => Vec::new(),
        }
    }

    fn node(&self, handle: NodeHandle) -> Result<&HierarchyNode, RuntimeError> {
        self.nodes.get(handle.index()).ok_or(RuntimeError::InvalidNode(handle.0))
    }

    // --- Traversal ---

    fn preorder(&self, root: NodeHandle) -> Vec<NodeHandle> {
        let mut order = Vec::new();
        let mut stack = vec![root];
        while let Some(h) = stack.pop() {
            order.push(h);
            stack.extend(self.nodes[h.index()].children.iter().rev());
        }
        order
    }

    fn postorder(&self, root: NodeHandle) -> Vec<NodeHandle> {
        let mut order = Vec::new();
        let mut stack = vec![root];
        while let Some(h) = stack.pop() {
            order.push(h);
            stack.extend(self.nodes[h.index()].children.iter());
        }
        order.reverse();
        order
    }

    // --- Notifications ---

    fn attach_subtree(&mut self, root: NodeHandle) -> Vec<RuntimeError> {
        let preorder = self.preorder(root);
        debug!(root = %self.nodes[root.index()].name, nodes = preorder.len(), "attaching subtree");

        for &h in &preorder {
            let scope = self.nearest_scope(h);
            let node = &mut self.nodes[h.index()];
            node.attached = true;
            match &node.role {
                NodeRole::Plain => {}
                NodeRole::Scope(own) => own.attach(scope.as_ref()),
                NodeRole::Host(host) => host.attach(scope.as_ref()),
                NodeRole::User(user) => user.attach(scope.as_ref()),
                NodeRole::HostAndUser(host, user) => {
                    host.attach(scope.as_ref());
                    user.attach(scope.as_ref());
                }
            }
        }

        let mut issues = Vec::new();
        for h in self.postorder(root) {
            if let NodeRole::Scope(scope) = &self.nodes[h.index()].role {
                issues.extend(scope.ready());
            }
        }
        issues
    }

    fn detach_subtree(&mut self, root: NodeHandle) -> Vec<RuntimeError> {
        let mut failures = Vec::new();
        for h in self.postorder(root) {
            let node = &mut self.nodes[h.index()];
            node.attached = false;
            match &node.role {
                NodeRole::Plain => {}
                NodeRole::Scope(scope) => failures.extend(scope.detach()),
                NodeRole::Host(host) => host.detach(),
                NodeRole::User(user) => user.detach(),
                NodeRole::HostAndUser(host, user) => {
                    user.detach();
                    host.detach();
                }
            }
        }
        debug!(root = %self.nodes[root.index()].name, failures = failures.len(), "subtree detached");
        failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{Dispose, ServiceBuilder};
    use rstest::rstest;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    trait Clock {
        fn now(&self) -> u64;
    }

    struct Fixed(u64);

    impl Clock for Fixed {
        fn now(&self) -> u64 { self.0 }
    }

    trait Spawn {
        fn spawn(&self) -> u64;
    }

    struct Spawner {
        clock: Rc<dyn Clock>,
        disposed: Rc<Cell<bool>>,
    }

    impl Spawn for Spawner {
        fn spawn(&self) -> u64 { self.clock.now() * 2 }
    }

    impl Dispose for Spawner {
        fn dispose(&self) -> Result<(), Box<dyn std::error::Error>> {
            self.disposed.set(true);
            Ok(())
        }
    }

    struct World {
        tree: Hierarchy,
        root: NodeHandle,
        scope: NodeHandle,
        spawned: Rc<Cell<u64>>,
        ready: Rc<Cell<u32>>,
        disposed: Rc<Cell<bool>>,
    }

    /// root -> scope -> { clock host, player user }
    fn world() -> World {
        let disposed = Rc::new(Cell::new(false));
        let flag = Rc::clone(&disposed);
        let spawner = ServiceBuilder::singleton("Spawner", move |deps| {
            Ok(Spawner { clock: deps.get::<dyn Clock>()?, disposed: Rc::clone(&flag) })
        })
        .depends_on::<dyn Clock>()
        .exposes::<dyn Spawn>(|s| s)
        .disposable()
        .build();
        let scope = Scope::builder("WorldScope").instantiate(spawner).expect::<dyn Clock>().build();

        let spawned = Rc::new(Cell::new(0));
        let ready = Rc::new(Cell::new(0));
        let (spawned_out, ready_out) = (Rc::clone(&spawned), Rc::clone(&ready));
        let player = UserBinding::new("Player")
            .inject::<dyn Spawn>(move |s| spawned_out.set(s.spawn()))
            .on_services_ready(move || ready_out.set(ready_out.get() + 1));

        let mut tree = Hierarchy::new();
        let root = tree.create("Root", NodeRole::Plain);
        let scope_node = tree.create("World", NodeRole::Scope(scope));
        // The user sits before the host on purpose: resolution must wait for registration.
        let user_node = tree.create("Player", NodeRole::User(player));
        let host_node = tree.create(
            "ClockHost",
            NodeRole::Host(HostBinding::new("ClockHost").provide::<dyn Clock>(Rc::new(Fixed(21)))),
        );
        tree.add_child(root, scope_node).unwrap();
        tree.add_child(scope_node, user_node).unwrap();
        tree.add_child(scope_node, host_node).unwrap();

        World { tree, root, scope: scope_node, spawned, ready, disposed }
    }

    #[test]
    fn test_attach_wires_scope_host_and_user() {
        let mut w = world();
        let issues = w.tree.set_root(w.root).unwrap();

        assert!(issues.is_empty(), "{:?}", issues);
        assert_eq!(w.spawned.get(), 42);
        assert_eq!(w.ready.get(), 1);
        assert!(w.tree.is_attached(w.scope));
    }

    #[test]
    fn test_removing_scope_disposes_singletons() {
        let mut w = world();
        w.tree.set_root(w.root).unwrap();

        let failures = w.tree.remove_child(w.root, w.scope).unwrap();
        assert!(failures.is_empty());
        assert!(w.disposed.get());
        assert!(!w.tree.is_attached(w.scope));
        assert_eq!(w.tree.parent(w.scope), None);

        // Re-adding constructs a fresh singleton; the ready callback stays spent.
        w.spawned.set(0);
        w.tree.add_child(w.root, w.scope).unwrap();
        assert_eq!(w.spawned.get(), 42);
        assert_eq!(w.ready.get(), 1);
    }

    #[test]
    fn test_host_and_user_registers_before_resolving() {
        let seen = Rc::new(Cell::new(0));
        let out = Rc::clone(&seen);
        let role = NodeRole::HostAndUser(
            HostBinding::new("Clockwork").provide::<dyn Clock>(Rc::new(Fixed(5))),
            UserBinding::new("Clockwork").inject::<dyn Clock>(move |c| out.set(c.now())),
        );

        let mut tree = Hierarchy::new();
        let scope = tree.create("Scope", NodeRole::Scope(Scope::builder("s").expect::<dyn Clock>().build()));
        let both = tree.create("Clockwork", role);
        tree.add_child(scope, both).unwrap();
        tree.set_root(scope).unwrap();
        assert_eq!(seen.get(), 5);
    }

    #[test]
    fn test_nested_scope_delegates_to_outer() {
        let seen = Rc::new(Cell::new(0));
        let out = Rc::clone(&seen);

        let mut tree = Hierarchy::new();
        let outer = tree.create("Outer", NodeRole::Scope(Scope::builder("outer").expect::<dyn Clock>().build()));
        let inner = tree.create("Inner", NodeRole::Scope(Scope::builder("inner").build()));
        let host = tree.create(
            "Host",
            NodeRole::Host(HostBinding::new("Host").provide::<dyn Clock>(Rc::new(Fixed(9)))),
        );
        let user = tree.create(
            "User",
            NodeRole::User(UserBinding::new("User").inject::<dyn Clock>(move |c| out.set(c.now()))),
        );
        tree.add_child(outer, inner).unwrap();
        tree.add_child(inner, host).unwrap();
        tree.add_child(inner, user).unwrap();
        tree.set_root(outer).unwrap();

        assert_eq!(seen.get(), 9);
        if let Ok(NodeRole::Scope(scope)) = tree.role(outer) {
            assert!(scope.is_registered::<dyn Clock>());
        }
        assert!(tree.nearest_scope(user).is_some_and(|s| s.name() == "inner"));
    }

    #[test]
    fn test_unresolved_injection_is_reported_at_ready() {
        let mut tree = Hierarchy::new();
        let scope = tree.create("Scope", NodeRole::Scope(Scope::builder("root").build()));
        let user = tree.create("User", NodeRole::User(UserBinding::new("User").inject::<dyn Clock>(|_| {})));
        tree.add_child(scope, user).unwrap();

        let issues = tree.set_root(scope).unwrap();
        assert_eq!(issues.len(), 1);
        assert!(matches!(&issues[0], RuntimeError::Unresolved { scope, .. } if scope == "root"));
    }

    #[test]
    fn test_lifecycle_order() {
        let log: Rc<RefCell<Vec<String>>> = Rc::default();
        let mut tree = Hierarchy::new();
        let user = |tree: &mut Hierarchy, name: &'static str| {
            let log = Rc::clone(&log);
            tree.create(name, NodeRole::User(UserBinding::new(name).on_services_ready(move || log.borrow_mut().push(name.to_string()))))
        };
        let scope = tree.create("S", NodeRole::Scope(Scope::builder("s").build()));
        let a = user(&mut tree, "a");
        let b = user(&mut tree, "b");
        tree.add_child(scope, a).unwrap();
        tree.add_child(a, b).unwrap();
        tree.set_root(scope).unwrap();
        // Attach is pre-order, so the outer user is notified first.
        assert_eq!(*log.borrow(), vec!["a", "b"]);
    }

    #[rstest]
    #[case::missing_parent(NodeHandle(99), NodeHandle(0))]
    #[case::missing_child(NodeHandle(0), NodeHandle(99))]
    fn test_invalid_handles(#[case] parent: NodeHandle, #[case] child: NodeHandle) {
        let mut tree = Hierarchy::new();
        tree.create("only", NodeRole::Plain);
        assert!(matches!(tree.add_child(parent, child), Err(RuntimeError::InvalidNode(99))));
    }

    #[test]
    fn test_structural_misuse_is_rejected() {
        let mut tree = Hierarchy::new();
        let a = tree.create("a", NodeRole::Plain);
        let b = tree.create("b", NodeRole::Plain);
        tree.add_child(a, b).unwrap();

        assert!(matches!(tree.add_child(b, a), Err(RuntimeError::WouldCycle { .. })));
        assert!(matches!(tree.add_child(a, b), Err(RuntimeError::AlreadyParented(_))));
        assert!(matches!(tree.remove_child(b, a), Err(RuntimeError::NotAChild { .. })));
        assert!(matches!(tree.set_root(b), Err(RuntimeError::AlreadyParented(_))));
    }
}
