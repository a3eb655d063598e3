//! Type-keyed identities and type-erased instances.
use super::error::RuntimeError;
use std::any::{type_name, Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

/// The exposed type a registry entry is stored under.
///
/// Equality and hashing use the `TypeId` only; the name is kept for logging.
#[derive(Debug, Clone, Copy)]
pub struct ServiceKey {
    id: TypeId,
    name: &'static str,
}

impl ServiceKey {
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self { id: TypeId::of::<T>(), name: type_name::<T>() }
    }

    pub fn name(&self) -> &'static str { self.name }
}

impl PartialEq for ServiceKey {
    fn eq(&self, other: &Self) -> bool { self.id == other.id }
}

impl Eq for ServiceKey {}

impl Hash for ServiceKey {
    fn hash<H: Hasher>(&self, state: &mut H) { self.id.hash(state) }
}

impl fmt::Display for ServiceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.name) }
}

/// A type-erased `Rc<T>`, tagged with the key it was registered under.
///
/// `T` may be unsized, so trait objects such as `Rc<dyn Clock>` are stored
/// as-is and handed back without re-wrapping.
#[derive(Clone)]
pub struct Instance {
    key: ServiceKey,
    value: Rc<dyn Any>,
}

impl Instance {
    pub fn new<T: ?Sized + 'static>(value: Rc<T>) -> Self {
        Self { key: ServiceKey::of::<T>(), value: Rc::new(value) }
    }

    pub fn key(&self) -> ServiceKey { self.key }

    pub fn downcast<T: ?Sized + 'static>(&self) -> Result<Rc<T>, RuntimeError> {
        self.value
            .downcast_ref::<Rc<T>>()
            .cloned()
            .ok_or(RuntimeError::TypeMismatch { expected: type_name::<T>() })
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance").field("key", &self.key.name).finish()
    }
}
