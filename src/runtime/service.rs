//! Service descriptors: how a scope builds one of its instantiated services.
use super::error::RuntimeError;
use super::key::{Instance, ServiceKey};
use crate::store::Lifetime;
use std::any::type_name;
use std::collections::HashMap;
use std::error::Error;
use std::rc::Rc;

/// Implemented by singletons that release resources when their scope detaches.
pub trait Dispose {
    fn dispose(&self) -> Result<(), Box<dyn Error>>;
}

/// The resolved constructor dependencies of one service.
pub struct Dependencies {
    service: &'static str,
    resolved: HashMap<ServiceKey, Instance>,
}

impl Dependencies {
    pub(crate) fn new(service: &'static str, resolved: HashMap<ServiceKey, Instance>) -> Self {
        Self { service, resolved }
    }

    pub fn get<T: ?Sized + 'static>(&self) -> Result<Rc<T>, RuntimeError> {
        let key = ServiceKey::of::<T>();
        let instance = self.resolved.get(&key).ok_or_else(|| RuntimeError::MissingDependency {
            service: self.service.to_string(),
            dependency: key.name(),
        })?;
        instance.downcast::<T>()
    }
}

/// One construction result: the instance under every exposed type, plus its
/// disposal handle if it has one.
pub(crate) struct Constructed {
    pub exposures: Vec<Instance>,
    pub disposable: Option<Rc<dyn Dispose>>,
}

type Construct = Rc<dyn Fn(&Dependencies) -> Result<Constructed, RuntimeError>>;

/// A type-erased recipe for one service, ready to hand to a `ScopeBuilder`.
#[derive(Clone)]
pub struct ServiceDescriptor {
    pub(crate) name: &'static str,
    pub(crate) lifetime: Lifetime,
    pub(crate) dependencies: Vec<ServiceKey>,
    pub(crate) exposed: Vec<ServiceKey>,
    pub(crate) construct: Construct,
}

impl ServiceDescriptor {
    pub fn name(&self) -> &'static str { self.name }

    pub fn lifetime(&self) -> Lifetime { self.lifetime }

    pub fn exposed(&self) -> &[ServiceKey] { &self.exposed }
}

type Expose<S> = Box<dyn Fn(&Rc<S>) -> Instance>;

/// Typed builder for a `ServiceDescriptor`.
///
/// ```ignore
/// let spawner = ServiceBuilder::singleton("Spawner", |deps| Ok(Spawner::new(deps.get::<dyn Clock>()?)))
///     .depends_on::<dyn Clock>()
///     .exposes::<dyn Spawn>(|s| s)
///     .build();
/// ```
pub struct ServiceBuilder<S: 'static> {
    name: &'static str,
    lifetime: Lifetime,
    dependencies: Vec<ServiceKey>,
    exposed: Vec<ServiceKey>,
    exposures: Vec<Expose<S>>,
    factory: Box<dyn Fn(&Dependencies) -> Result<S, RuntimeError>>,
    disposal: Option<fn(Rc<S>) -> Rc<dyn Dispose>>,
}

impl<S: 'static> ServiceBuilder<S> {
    pub fn singleton(name: &'static str, factory: impl Fn(&Dependencies) -> Result<S, RuntimeError> + 'static) -> Self {
        Self::with_lifetime(name, Lifetime::Singleton, factory)
    }

    pub fn transient(name: &'static str, factory: impl Fn(&Dependencies) -> Result<S, RuntimeError> + 'static) -> Self {
        Self::with_lifetime(name, Lifetime::Transient, factory)
    }

    fn with_lifetime(
        name: &'static str,
        lifetime: Lifetime,
        factory: impl Fn(&Dependencies) -> Result<S, RuntimeError> + 'static,
    ) -> Self {
        Self {
            name,
            lifetime,
            dependencies: Vec::new(),
            exposed: Vec::new(),
            exposures: Vec::new(),
            factory: Box::new(factory),
            disposal: None,
        }
    }

    /// Declares a constructor dependency, resolved from the scope before construction.
    pub fn depends_on<T: ?Sized + 'static>(mut self) -> Self {
        let key = ServiceKey::of::<T>();
        if !self.dependencies.contains(&key) {
            self.dependencies.push(key);
        }
        self
    }

    /// Registers the service under `E` as well. `cast` is usually `|s| s`.
    pub fn exposes<E: ?Sized + 'static>(mut self, cast: impl Fn(Rc<S>) -> Rc<E> + 'static) -> Self {
        let key = ServiceKey::of::<E>();
        if !self.exposed.contains(&key) {
            self.exposed.push(key);
            self.exposures.push(Box::new(move |service: &Rc<S>| Instance::new(cast(Rc::clone(service)))));
        }
        self
    }

    pub fn exposes_self(self) -> Self { self.exposes::<S>(|s| s) }

    /// Without an explicit exposure the service is registered under its own type.
    pub fn build(self) -> ServiceDescriptor {
        let this = if self.exposures.is_empty() { self.exposes_self() } else { self };
        let ServiceBuilder { name, lifetime, dependencies, exposed, exposures, factory, disposal } = this;

        let construct: Construct = Rc::new(move |deps: &Dependencies| {
            let service = Rc::new(factory(deps)?);
            Ok(Constructed {
                exposures: exposures.iter().map(|expose| expose(&service)).collect(),
                disposable: disposal.map(|to_dispose| to_dispose(Rc::clone(&service))),
            })
        });
        ServiceDescriptor { name, lifetime, dependencies, exposed, construct }
    }
}

impl<S: Dispose + 'static> ServiceBuilder<S> {
    /// Disposes the singleton when its scope detaches. Ignored for transients.
    pub fn disposable(mut self) -> Self {
        self.disposal = Some(|service: Rc<S>| -> Rc<dyn Dispose> { service });
        self
    }
}

impl<S: 'static> std::fmt::Debug for ServiceBuilder<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceBuilder")
            .field("name", &self.name)
            .field("type", &type_name::<S>())
            .field("lifetime", &self.lifetime)
            .finish()
    }
}
