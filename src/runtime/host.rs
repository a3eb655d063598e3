//! Glue for hierarchy nodes that supply instances to their enclosing scope.
use super::key::{Instance, ServiceKey};
use super::scope::{Scope, WeakScope};
use std::cell::RefCell;
use std::rc::Rc;
use tracing::{debug, warn};

pub struct HostBinding {
    name: String,
    provisions: Vec<Instance>,
    scope: RefCell<WeakScope>,
}

impl HostBinding {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), provisions: Vec::new(), scope: RefCell::new(WeakScope::default()) }
    }

    /// Registers `instance` under `T` on every attach.
    pub fn provide<T: ?Sized + 'static>(mut self, instance: Rc<T>) -> Self {
        self.provisions.push(Instance::new(instance));
        self
    }

    pub fn name(&self) -> &str { &self.name }

    pub fn provided(&self) -> impl Iterator<Item = ServiceKey> + '_ { self.provisions.iter().map(Instance::key) }

    /// Caches `scope` and registers every provision into it.
    pub fn attach(&self, scope: Option<&Scope>) {
        let Some(scope) = scope else {
            warn!(host = %self.name, "host attached outside any scope; provisions are dropped");
            return;
        };
        *self.scope.borrow_mut() = scope.downgrade();
        debug!(host = %self.name, scope = scope.name(), provisions = self.provisions.len(), "host attached");
        for instance in &self.provisions {
            scope.register_erased(instance.clone());
        }
    }

    /// Unregisters every provision from the cached scope and forgets it.
    pub fn detach(&self) {
        let cached = std::mem::take(&mut *self.scope.borrow_mut());
        if let Some(scope) = cached.upgrade() {
            for key in self.provided() {
                scope.unregister_erased(key);
            }
        }
    }
}
