//! Glue for hierarchy nodes that consume services through deferred resolution.
use super::key::{Instance, ServiceKey};
use super::scope::Scope;
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use tracing::{debug, error, warn};

type Assign = Rc<RefCell<dyn FnMut(Instance)>>;

struct Injection {
    key: ServiceKey,
    assign: Assign,
}

#[derive(Default)]
struct UserState {
    /// Bumped on detach; resolutions from an earlier attach are dropped.
    epoch: Cell<u64>,
    remaining: Cell<usize>,
    on_ready: RefCell<Option<Box<dyn FnOnce()>>>,
}

impl UserState {
    fn fire_ready(&self) {
        let callback = self.on_ready.borrow_mut().take();
        if let Some(callback) = callback {
            callback();
        }
    }
}

pub struct UserBinding {
    name: String,
    injections: Vec<Injection>,
    state: Rc<UserState>,
}

impl UserBinding {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), injections: Vec::new(), state: Rc::default() }
    }

    /// Resolves `T` on every attach and hands it to `assign`.
    pub fn inject<T: ?Sized + 'static>(mut self, mut assign: impl FnMut(Rc<T>) + 'static) -> Self {
        let name = self.name.clone();
        let assign = move |instance: Instance| match instance.downcast::<T>() {
            Ok(value) => assign(value),
            Err(e) => error!(user = %name, error = %e, "injected instance does not match the member type"),
        };
        self.injections.push(Injection { key: ServiceKey::of::<T>(), assign: Rc::new(RefCell::new(assign)) });
        self
    }

    /// Called once, after the first attach has resolved every injected member.
    pub fn on_services_ready(self, callback: impl FnOnce() + 'static) -> Self {
        *self.state.on_ready.borrow_mut() = Some(Box::new(callback));
        self
    }

    pub fn name(&self) -> &str { &self.name }

    pub fn remaining(&self) -> usize { self.state.remaining.get() }

    pub fn attach(&self, scope: Option<&Scope>) {
        let Some(scope) = scope else {
            warn!(user = %self.name, "user attached outside any scope; injections stay unresolved");
            return;
        };
        debug!(user = %self.name, scope = scope.name(), injections = self.injections.len(), "user attached");

        let epoch = self.state.epoch.get();
        self.state.remaining.set(self.injections.len());
        if self.injections.is_empty() {
            self.state.fire_ready();
            return;
        }

        for injection in &self.injections {
            let state = Rc::clone(&self.state);
            let owner = Rc::clone(&self.state);
            let assign = Rc::clone(&injection.assign);
            scope.resolve_erased(
                injection.key,
                Box::new(move |instance: Instance| {
                    (*assign.borrow_mut())(instance);
                    let left = state.remaining.get().saturating_sub(1);
                    state.remaining.set(left);
                    if left == 0 {
                        state.fire_ready();
                    }
                }),
                Box::new(move || owner.epoch.get() == epoch),
            );
        }
    }

    pub fn detach(&self) {
        self.state.epoch.set(self.state.epoch.get() + 1);
        self.state.remaining.set(self.injections.len());
    }
}
