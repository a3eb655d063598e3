//! The per-scope service registry.
//!
//! A scope knows statically which exposed types it provides. Anything else is
//! delegated to the nearest enclosing scope, cached at attach. Resolution is
//! callback based: a `resolve` for a type that is known but not registered yet
//! is queued and fires exactly once, at the matching `register`.
//!
//! Everything runs on one thread and may re-enter: a waiter invoked from
//! `register` is free to call `register` or `resolve` again. No `RefCell`
//! borrow is ever held while user code runs.
use super::error::RuntimeError;
use super::key::{Instance, ServiceKey};
use super::service::{Constructed, Dependencies, Dispose, ServiceDescriptor};
use crate::store::Lifetime;
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::rc::{Rc, Weak};
use tracing::{debug, error, warn};

pub(crate) type Waiter = Box<dyn FnOnce(Instance)>;
/// Whether a queued waiter's owner is still attached. Must not borrow any scope state.
pub(crate) type Liveness = Box<dyn Fn() -> bool>;
type Factory = Rc<dyn Fn() -> Result<Instance, RuntimeError>>;

struct Pending {
    waiter: Waiter,
    live: Liveness,
}

impl Pending {
    fn is_live(&self) -> bool { (self.live)() }
}

enum Provided {
    Instance(Instance),
    /// Transient exposure: every lookup builds a fresh instance.
    Factory(Factory),
}

#[derive(Default)]
struct ScopeState {
    registry: HashMap<ServiceKey, Provided>,
    waiters: HashMap<ServiceKey, Vec<Pending>>,
    disposables: Vec<(&'static str, Rc<dyn Dispose>)>,
    /// Resolutions no scope in the chain knows about. Only ever filled on a root scope.
    orphaned: Vec<ServiceKey>,
}

struct ScopeInner {
    name: String,
    known: HashSet<ServiceKey>,
    descriptors: Vec<ServiceDescriptor>,
    parent: RefCell<Option<Weak<ScopeInner>>>,
    /// Bumped on detach so construction waiters from a previous attach are dropped.
    generation: Cell<u64>,
    state: RefCell<ScopeState>,
}

/// A shared handle to one scope.
#[derive(Clone)]
pub struct Scope(Rc<ScopeInner>);

/// A non-owning handle, held by hosts to reach the scope they registered into.
#[derive(Clone, Default)]
pub struct WeakScope(Weak<ScopeInner>);

impl WeakScope {
    pub fn upgrade(&self) -> Option<Scope> { self.0.upgrade().map(Scope) }
}

pub struct ScopeBuilder {
    name: String,
    known: HashSet<ServiceKey>,
    descriptors: Vec<ServiceDescriptor>,
}

impl ScopeBuilder {
    /// Constructs the service on attach and knows every type it exposes.
    pub fn instantiate(mut self, descriptor: ServiceDescriptor) -> Self {
        self.known.extend(descriptor.exposed.iter().copied());
        self.descriptors.push(descriptor);
        self
    }

    /// A type some host below this scope will register.
    pub fn expect<T: ?Sized + 'static>(mut self) -> Self {
        self.known.insert(ServiceKey::of::<T>());
        self
    }

    pub fn build(self) -> Scope {
        Scope(Rc::new(ScopeInner {
            name: self.name,
            known: self.known,
            descriptors: self.descriptors,
            parent: RefCell::new(None),
            generation: Cell::new(0),
            state: RefCell::new(ScopeState::default()),
        }))
    }
}

impl Scope {
    pub fn builder(name: impl Into<String>) -> ScopeBuilder {
        ScopeBuilder { name: name.into(), known: HashSet::new(), descriptors: Vec::new() }
    }

    pub fn name(&self) -> &str { &self.0.name }

    pub fn knows(&self, key: &ServiceKey) -> bool { self.0.known.contains(key) }

    pub fn downgrade(&self) -> WeakScope { WeakScope(Rc::downgrade(&self.0)) }

    pub fn ptr_eq(&self, other: &Scope) -> bool { Rc::ptr_eq(&self.0, &other.0) }

    fn parent(&self) -> Option<Scope> {
        self.0.parent.borrow().as_ref().and_then(Weak::upgrade).map(Scope)
    }

    // --- Public protocol ---

    pub fn register<T: ?Sized + 'static>(&self, instance: Rc<T>) { self.register_erased(Instance::new(instance)) }

    pub fn unregister<T: ?Sized + 'static>(&self) { self.unregister_erased(ServiceKey::of::<T>()) }

    /// Calls `callback` once an instance of `T` is available, immediately if it already is.
    pub fn resolve<T: ?Sized + 'static>(&self, callback: impl FnOnce(Rc<T>) + 'static) {
        let waiter: Waiter = Box::new(move |instance: Instance| match instance.downcast::<T>() {
            Ok(value) => callback(value),
            Err(e) => error!(error = %e, "resolved instance does not match the requested type"),
        });
        self.resolve_erased(ServiceKey::of::<T>(), waiter, Box::new(|| true));
    }

    /// Whether `T` currently has an instance in the scope that owns it.
    pub fn is_registered<T: ?Sized + 'static>(&self) -> bool { self.is_registered_erased(&ServiceKey::of::<T>()) }

    // --- Type-erased protocol ---

    pub(crate) fn register_erased(&self, instance: Instance) {
        let key = instance.key();
        if !self.knows(&key) {
            match self.parent() {
                Some(parent) => parent.register_erased(instance),
                None => warn!(
                    scope = %self.0.name,
                    service = key.name(),
                    "unresolvable registration: no enclosing scope knows this service"
                ),
            }
            return;
        }
        self.provide(key, Provided::Instance(instance));
    }

    pub(crate) fn unregister_erased(&self, key: ServiceKey) {
        if !self.knows(&key) {
            match self.parent() {
                Some(parent) => parent.unregister_erased(key),
                None => debug!(scope = %self.0.name, service = key.name(), "unregister of an unknown service ignored"),
            }
            return;
        }
        // Queued waiters stay queued and fire on the next registration.
        let removed = self.0.state.borrow_mut().registry.remove(&key);
        drop(removed);
    }

    /// Queues `waiter` until `key` is registered. Queued waiters whose `live`
    /// check fails are purged here and skipped when the queue drains.
    pub(crate) fn resolve_erased(&self, key: ServiceKey, waiter: Waiter, live: Liveness) {
        if !self.knows(&key) {
            match self.parent() {
                Some(parent) => parent.resolve_erased(key, waiter, live),
                None => {
                    debug!(scope = %self.0.name, service = key.name(), "no scope knows this service; pending until ready");
                    let mut state = self.0.state.borrow_mut();
                    if !state.orphaned.contains(&key) {
                        state.orphaned.push(key);
                    }
                }
            }
            return;
        }
        match self.lookup(&key) {
            Some(Ok(instance)) => waiter(instance),
            Some(Err(e)) => error!(scope = %self.0.name, service = key.name(), error = %e, "transient construction failed"),
            None => {
                let mut state = self.0.state.borrow_mut();
                let queue = state.waiters.entry(key).or_default();
                let before = queue.len();
                queue.retain(Pending::is_live);
                if queue.len() < before {
                    debug!(scope = %self.0.name, service = key.name(), dropped = before - queue.len(), "stale waiters purged");
                }
                queue.push(Pending { waiter, live });
            }
        }
    }

    fn is_registered_erased(&self, key: &ServiceKey) -> bool {
        if self.knows(key) {
            return self.0.state.borrow().registry.contains_key(key);
        }
        self.parent().is_some_and(|parent| parent.is_registered_erased(key))
    }

    /// Stores a local entry (first one wins), then drains its waiters in enqueue order.
    fn provide(&self, key: ServiceKey, provided: Provided) {
        let waiters = {
            let mut state = self.0.state.borrow_mut();
            if state.registry.contains_key(&key) {
                warn!(
                    scope = %self.0.name,
                    service = key.name(),
                    "duplicate registration ignored; the first instance stays registered"
                );
                return;
            }
            state.registry.insert(key, provided);
            state.waiters.remove(&key).unwrap_or_default()
        };

        let mut waiters = waiters.into_iter();
        while let Some(pending) = waiters.next() {
            if !pending.is_live() {
                continue;
            }
            match self.lookup(&key) {
                Some(Ok(instance)) => (pending.waiter)(instance),
                Some(Err(e)) => error!(scope = %self.0.name, service = key.name(), error = %e, "transient construction failed"),
                None => {
                    // A waiter unregistered the key; the rest wait for the next registration.
                    let mut state = self.0.state.borrow_mut();
                    let queue = state.waiters.entry(key).or_default();
                    queue.push(pending);
                    queue.extend(waiters);
                    return;
                }
            }
        }
    }

    fn lookup(&self, key: &ServiceKey) -> Option<Result<Instance, RuntimeError>> {
        let factory = {
            let state = self.0.state.borrow();
            match state.registry.get(key)? {
                Provided::Instance(instance) => return Some(Ok(instance.clone())),
                Provided::Factory(factory) => Rc::clone(factory),
            }
        };
        Some(factory())
    }

    // --- Lifecycle ---

    /// Caches the enclosing scope, then starts constructing every instantiated service.
    ///
    /// Each service waits on its dependencies through `resolve`, so construction
    /// order follows registration events rather than a precomputed sort.
    pub fn attach(&self, parent: Option<&Scope>) {
        *self.0.parent.borrow_mut() = parent.map(|p| Rc::downgrade(&p.0));
        debug!(
            scope = %self.0.name,
            parent = parent.map(Scope::name).unwrap_or("<none>"),
            services = self.0.descriptors.len(),
            "scope attached"
        );
        for descriptor in &self.0.descriptors {
            self.instantiate(descriptor);
        }
    }

    fn instantiate(&self, descriptor: &ServiceDescriptor) {
        if descriptor.dependencies.is_empty() {
            self.complete(descriptor, HashMap::new());
            return;
        }

        let generation = self.0.generation.get();
        let pending = Rc::new(RefCell::new((descriptor.dependencies.len(), HashMap::new())));
        for &key in &descriptor.dependencies {
            let scope = Rc::downgrade(&self.0);
            let owner = Weak::clone(&scope);
            let pending = Rc::clone(&pending);
            let descriptor = descriptor.clone();
            self.resolve_erased(
                key,
                Box::new(move |instance: Instance| {
                    let Some(scope) = scope.upgrade().map(Scope) else {
                        return;
                    };
                    let resolved = {
                        let mut pending = pending.borrow_mut();
                        pending.1.insert(key, instance);
                        pending.0 -= 1;
                        (pending.0 == 0).then(|| std::mem::take(&mut pending.1))
                    };
                    if let Some(resolved) = resolved {
                        scope.complete(&descriptor, resolved);
                    }
                }),
                Box::new(move || owner.upgrade().is_some_and(|s| s.generation.get() == generation)),
            );
        }
    }

    fn complete(&self, descriptor: &ServiceDescriptor, resolved: HashMap<ServiceKey, Instance>) {
        let deps = Dependencies::new(descriptor.name, resolved);
        match descriptor.lifetime {
            Lifetime::Singleton => match (descriptor.construct)(&deps) {
                Ok(Constructed { exposures, disposable }) => {
                    debug!(scope = %self.0.name, service = descriptor.name, "singleton constructed");
                    if let Some(disposable) = disposable {
                        self.0.state.borrow_mut().disposables.push((descriptor.name, disposable));
                    }
                    for instance in exposures {
                        self.provide(instance.key(), Provided::Instance(instance));
                    }
                }
                Err(e) => error!(scope = %self.0.name, service = descriptor.name, error = %e, "service construction failed"),
            },
            Lifetime::Transient => {
                let deps = Rc::new(deps);
                for (index, &key) in descriptor.exposed.iter().enumerate() {
                    let construct = Rc::clone(&descriptor.construct);
                    let deps = Rc::clone(&deps);
                    let name = descriptor.name;
                    let factory: Factory = Rc::new(move || {
                        construct(&deps)?.exposures.into_iter().nth(index).ok_or_else(|| RuntimeError::Construction {
                            service: name.to_string(),
                            reason: format!("no instance for exposure #{}", index),
                        })
                    });
                    self.provide(key, Provided::Factory(factory));
                }
            }
        }
    }

    /// Reports resolutions that no scope in the chain could ever satisfy.
    pub fn ready(&self) -> Vec<RuntimeError> {
        let orphaned = std::mem::take(&mut self.0.state.borrow_mut().orphaned);
        orphaned
            .into_iter()
            .map(|key| {
                error!(scope = %self.0.name, service = key.name(), "unresolved at ready: no scope provides this service");
                RuntimeError::Unresolved { scope: self.0.name.clone(), key: key.name() }
            })
            .collect()
    }

    /// Disposes every disposable singleton, then clears the registry and waiters.
    ///
    /// Each disposal is isolated: a failure or panic is logged and returned,
    /// and the remaining disposals still run.
    pub fn detach(&self) -> Vec<RuntimeError> {
        let (disposables, registry, waiters) = {
            self.0.generation.set(self.0.generation.get() + 1);
            let mut state = self.0.state.borrow_mut();
            state.orphaned.clear();
            (
                std::mem::take(&mut state.disposables),
                std::mem::take(&mut state.registry),
                std::mem::take(&mut state.waiters),
            )
        };
        *self.0.parent.borrow_mut() = None;

        let mut failures = Vec::new();
        for (service, disposable) in disposables.into_iter().rev() {
            let reason = match catch_unwind(AssertUnwindSafe(|| disposable.dispose())) {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => e.to_string(),
                Err(_) => "dispose panicked".to_string(),
            };
            error!(scope = %self.0.name, service, %reason, "disposal failed");
            failures.push(RuntimeError::Dispose { service: service.to_string(), reason });
        }
        drop(registry);
        drop(waiters);

        debug!(scope = %self.0.name, failures = failures.len(), "scope detached");
        failures
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope").field("name", &self.0.name).field("known", &self.0.known.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::ServiceBuilder;
    use std::cell::Cell;

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
    }

    impl Spawn for Spawner {
        fn spawn(&self) -> u64 { self.clock.now() + 1 }
    }

    fn clock_scope(name: &str) -> Scope {
        let scope = Scope::builder(name).expect::<dyn Clock>().build();
        scope.attach(None);
        scope
    }

    fn counter() -> (Rc<Cell<u32>>, Rc<Cell<u32>>) {
        let calls = Rc::new(Cell::new(0));
        (Rc::clone(&calls), calls)
    }

    #[test]
    fn test_resolve_before_register_fires_exactly_once() {
        let scope = clock_scope("world");
        let (calls, seen) = counter();
        scope.resolve::<dyn Clock>(move |clock| {
            assert_eq!(clock.now(), 5);
            calls.set(calls.get() + 1);
        });
        assert_eq!(seen.get(), 0);

        scope.register::<dyn Clock>(Rc::new(Fixed(5)));
        assert_eq!(seen.get(), 1);

        // The waiter was consumed; a conflicting registration must not re-fire it.
        scope.register::<dyn Clock>(Rc::new(Fixed(9)));
        assert_eq!(seen.get(), 1);
    }

    #[test]
    fn test_resolve_after_register_fires_immediately() {
        let scope = clock_scope("world");
        scope.register::<dyn Clock>(Rc::new(Fixed(2)));
        let (calls, seen) = counter();
        scope.resolve::<dyn Clock>(move |_| calls.set(calls.get() + 1));
        assert_eq!(seen.get(), 1);
    }

    #[test]
    fn test_first_registration_wins() {
        let scope = clock_scope("world");
        scope.register::<dyn Clock>(Rc::new(Fixed(1)));
        scope.register::<dyn Clock>(Rc::new(Fixed(2)));
        let now = Rc::new(Cell::new(0));
        let out = Rc::clone(&now);
        scope.resolve::<dyn Clock>(move |clock| out.set(clock.now()));
        assert_eq!(now.get(), 1);
    }

    #[test]
    fn test_unknown_registration_without_ancestor_is_noop() {
        let scope = clock_scope("world");
        scope.register::<Fixed>(Rc::new(Fixed(1)));
        assert!(!scope.is_registered::<Fixed>());
        assert!(!scope.is_registered::<dyn Clock>());
    }

    #[test]
    fn test_unknown_types_delegate_to_ancestor() {
        let root = clock_scope("root");
        let child = Scope::builder("child").build();
        child.attach(Some(&root));

        let (calls, seen) = counter();
        child.resolve::<dyn Clock>(move |_| calls.set(calls.get() + 1));
        child.register::<dyn Clock>(Rc::new(Fixed(4)));

        assert!(root.is_registered::<dyn Clock>());
        assert!(child.is_registered::<dyn Clock>());
        assert_eq!(seen.get(), 1);

        child.unregister::<dyn Clock>();
        assert!(!root.is_registered::<dyn Clock>());
    }

    #[test]
    fn test_unregister_keeps_waiters_queued() {
        let scope = clock_scope("world");
        let (calls, seen) = counter();
        scope.resolve::<dyn Clock>(move |_| calls.set(calls.get() + 1));
        scope.unregister::<dyn Clock>();
        assert_eq!(seen.get(), 0);

        scope.register::<dyn Clock>(Rc::new(Fixed(3)));
        assert_eq!(seen.get(), 1);
        scope.unregister::<dyn Clock>();
        assert!(!scope.is_registered::<dyn Clock>());
    }

    #[test]
    fn test_waiters_may_reenter_the_scope() {
        let scope = Scope::builder("world").expect::<dyn Clock>().expect::<Fixed>().build();
        scope.attach(None);
        let (calls, seen) = counter();

        let inner = scope.clone();
        scope.resolve::<dyn Clock>(move |clock| {
            inner.register::<Fixed>(Rc::new(Fixed(clock.now() * 10)));
            let calls = Rc::clone(&calls);
            inner.resolve::<Fixed>(move |fixed| {
                assert_eq!(fixed.0, 70);
                calls.set(calls.get() + 1);
            });
        });
        scope.register::<dyn Clock>(Rc::new(Fixed(7)));
        assert_eq!(seen.get(), 1);
    }

    #[test]
    fn test_orphaned_resolution_is_reported_at_ready() {
        let scope = clock_scope("world");
        scope.resolve::<Fixed>(|_| panic!("must never fire"));
        let errors = scope.ready();
        assert_eq!(errors.len(), 1);
        assert!(matches!(&errors[0], RuntimeError::Unresolved { scope, .. } if scope == "world"));
        assert!(scope.ready().is_empty());
    }

    #[test]
    fn test_attach_constructs_in_dependency_order() {
        let spawner = ServiceBuilder::singleton("Spawner", |deps| Ok(Spawner { clock: deps.get::<dyn Clock>()? }))
            .depends_on::<dyn Clock>()
            .exposes::<dyn Spawn>(|s| s)
            .build();
        let clock = ServiceBuilder::singleton("Fixed", |_| Ok(Fixed(41))).exposes::<dyn Clock>(|s| s).build();
        // Declared before its dependency on purpose.
        let scope = Scope::builder("world").instantiate(spawner).instantiate(clock).build();
        scope.attach(None);

        let spawned = Rc::new(Cell::new(0));
        let out = Rc::clone(&spawned);
        scope.resolve::<dyn Spawn>(move |s| out.set(s.spawn()));
        assert_eq!(spawned.get(), 42);
    }

    #[test]
    fn test_transient_resolves_fresh_instances() {
        let clock = ServiceBuilder::transient("Fixed", |_| Ok(Fixed(1))).build();
        let scope = Scope::builder("world").instantiate(clock).build();
        scope.attach(None);

        let seen: Rc<RefCell<Vec<Rc<Fixed>>>> = Rc::default();
        for _ in 0..2 {
            let seen = Rc::clone(&seen);
            scope.resolve::<Fixed>(move |f| seen.borrow_mut().push(f));
        }
        let seen = seen.borrow();
        assert_eq!(seen.len(), 2);
        assert!(!Rc::ptr_eq(&seen[0], &seen[1]));
    }

    struct Resource {
        name: &'static str,
        fail: bool,
        log: Rc<RefCell<Vec<&'static str>>>,
    }

    impl Dispose for Resource {
        fn dispose(&self) -> Result<(), Box<dyn std::error::Error>> {
            self.log.borrow_mut().push(self.name);
            if self.fail {
                return Err(format!("{} is stuck", self.name).into());
            }
            Ok(())
        }
    }

    #[test]
    fn test_failed_disposal_does_not_block_siblings() {
        let log: Rc<RefCell<Vec<&'static str>>> = Rc::default();
        let resource = |name: &'static str, fail: bool| {
            let log = Rc::clone(&log);
            ServiceBuilder::singleton(name, move |_| Ok(Resource { name, fail, log: Rc::clone(&log) }))
                .disposable()
                .build()
        };
        let scope = Scope::builder("world").instantiate(resource("first", false)).instantiate(resource("second", true)).build();
        scope.attach(None);

        let failures = scope.detach();
        assert_eq!(*log.borrow(), vec!["second", "first"]);
        assert_eq!(failures.len(), 1);
        assert!(matches!(&failures[0], RuntimeError::Dispose { service, reason } if service == "second" && reason.contains("stuck")));
        assert!(!scope.is_registered::<Resource>());
    }

    #[test]
    fn test_stale_construction_after_detach_is_ignored() {
        let root = clock_scope("root");
        let spawner = ServiceBuilder::singleton("Spawner", |deps| Ok(Spawner { clock: deps.get::<dyn Clock>()? }))
            .depends_on::<dyn Clock>()
            .exposes::<dyn Spawn>(|s| s)
            .build();
        let child = Scope::builder("child").instantiate(spawner).build();
        child.attach(Some(&root));
        child.detach();

        // The dependency waiter still sits in the root scope.
        root.register::<dyn Clock>(Rc::new(Fixed(1)));
        assert!(!child.is_registered::<dyn Spawn>());
    }

    #[test]
    fn test_reattaching_child_does_not_grow_ancestor_queue() {
        let root = clock_scope("root");
        let spawner = ServiceBuilder::singleton("Spawner", |deps| Ok(Spawner { clock: deps.get::<dyn Clock>()? }))
            .depends_on::<dyn Clock>()
            .exposes::<dyn Spawn>(|s| s)
            .build();
        let child = Scope::builder("child").instantiate(spawner).build();
        for _ in 0..10 {
            child.attach(Some(&root));
            child.detach();
        }
        child.attach(Some(&root));

        let queued = root.0.state.borrow().waiters.get(&ServiceKey::of::<dyn Clock>()).map_or(0, Vec::len);
        assert_eq!(queued, 1);

        root.register::<dyn Clock>(Rc::new(Fixed(5)));
        assert!(child.is_registered::<dyn Spawn>());
    }
}
