//! Capability-keyed component factory.
//!
//! # Responsibility
//! - Map a capability (usually a `dyn Trait` type) to a factory function.
//! - Resolve capabilities for plugins without exposing concrete types.
//!
//! # Invariants
//! - The registration map is built once at startup, then shared read-only.
//! - Each capability has at most one registration.
//! - Resolving an unregistered capability is an error, never a default.

use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

type Factory<C> = Box<dyn Fn() -> Arc<C> + Send + Sync>;

struct Registration {
    capability: &'static str,
    factory: Box<dyn Any + Send + Sync>,
}

/// Registration map from capability type to factory function.
#[derive(Default)]
pub struct ComponentFactory {
    registrations: HashMap<TypeId, Registration>,
}

impl ComponentFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `factory` as the provider of capability `C`.
    pub fn register<C>(
        &mut self,
        factory: impl Fn() -> Arc<C> + Send + Sync + 'static,
    ) -> Result<(), FactoryError>
    where
        C: ?Sized + Send + Sync + 'static,
    {
        let key = TypeId::of::<C>();
        if self.registrations.contains_key(&key) {
            return Err(FactoryError::DuplicateCapability(type_name::<C>()));
        }

        let factory: Factory<C> = Box::new(factory);
        self.registrations.insert(
            key,
            Registration {
                capability: type_name::<C>(),
                factory: Box::new(factory),
            },
        );
        Ok(())
    }

    /// Registers one shared instance as the provider of capability `C`.
    pub fn register_instance<C>(&mut self, instance: Arc<C>) -> Result<(), FactoryError>
    where
        C: ?Sized + Send + Sync + 'static,
    {
        self.register::<C>(move || Arc::clone(&instance))
    }

    /// Resolves capability `C`.
    pub fn resolve<C>(&self) -> Result<Arc<C>, FactoryError>
    where
        C: ?Sized + Send + Sync + 'static,
    {
        let registration = self
            .registrations
            .get(&TypeId::of::<C>())
            .ok_or(FactoryError::MissingCapability(type_name::<C>()))?;
        let factory = registration
            .factory
            .downcast_ref::<Factory<C>>()
            .ok_or(FactoryError::MissingCapability(registration.capability))?;
        Ok(factory())
    }

    pub fn contains<C>(&self) -> bool
    where
        C: ?Sized + 'static,
    {
        self.registrations.contains_key(&TypeId::of::<C>())
    }

    /// Registered capability names, sorted.
    pub fn capabilities(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self
            .registrations
            .values()
            .map(|registration| registration.capability)
            .collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FactoryError {
    MissingCapability(&'static str),
    DuplicateCapability(&'static str),
}

impl Display for FactoryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingCapability(name) => write!(f, "no component registered for {name}"),
            Self::DuplicateCapability(name) => {
                write!(f, "component already registered for {name}")
            }
        }
    }
}

impl Error for FactoryError {}

#[cfg(test)]
mod tests {
    use super::{ComponentFactory, FactoryError};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    trait Greeter: Send + Sync {
        fn greet(&self) -> String;
    }

    trait Clock: Send + Sync {}

    struct English;

    impl Greeter for English {
        fn greet(&self) -> String {
            "hello".to_string()
        }
    }

    #[test]
    fn resolves_by_capability_type() {
        let mut factory = ComponentFactory::new();
        factory
            .register::<dyn Greeter>(|| Arc::new(English))
            .unwrap();

        let greeter = factory.resolve::<dyn Greeter>().unwrap();
        assert_eq!(greeter.greet(), "hello");
        assert!(factory.contains::<dyn Greeter>());
    }

    #[test]
    fn missing_capability_is_an_error() {
        let factory = ComponentFactory::new();
        let err = factory.resolve::<dyn Clock>().err().unwrap();
        assert!(matches!(err, FactoryError::MissingCapability(name) if name.contains("Clock")));
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut factory = ComponentFactory::new();
        factory
            .register::<dyn Greeter>(|| Arc::new(English))
            .unwrap();
        let err = factory
            .register::<dyn Greeter>(|| Arc::new(English))
            .unwrap_err();
        assert!(matches!(err, FactoryError::DuplicateCapability(_)));
        assert_eq!(factory.len(), 1);
    }

    #[test]
    fn factory_runs_on_every_resolve_while_instances_are_shared() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut factory = ComponentFactory::new();
        let counter = Arc::clone(&calls);
        factory
            .register::<dyn Greeter>(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                Arc::new(English)
            })
            .unwrap();
        factory
            .register_instance::<str>(Arc::from("shared"))
            .unwrap();

        factory.resolve::<dyn Greeter>().unwrap();
        factory.resolve::<dyn Greeter>().unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        let first = factory.resolve::<str>().unwrap();
        let second = factory.resolve::<str>().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }
}
