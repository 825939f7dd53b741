//! Registry / Container
//!
//! Maps each capability to one provider with a lifetime policy. Singletons
//! are built eagerly at registration and released in reverse construction
//! order on `dispose`; transient providers are re-invoked on every
//! resolution.
//!
//! Capabilities are keyed by type, usually a trait object such as
//! `dyn OrderDao` or a concrete type such as `SharedCache`.

use crate::domain::ports::Disposable;
use crate::domain::value_objects::Lifetime;
use parking_lot::Mutex;
use std::any::{type_name, Any, TypeId};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Named arguments handed to a transient provider on every construction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConstructionArgs {
    values: BTreeMap<String, String>,
}

impl ConstructionArgs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an argument (builder style).
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// Get an argument that the provider cannot do without.
    pub fn required(&self, name: &str) -> Result<&str, CompositionError> {
        self.get(name)
            .ok_or_else(|| CompositionError::MissingArgument(name.to_string()))
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

type TransientFactory<T> =
    Arc<dyn Fn(&Container, &ConstructionArgs) -> Result<Arc<T>, CompositionError> + Send + Sync>;

enum Provider {
    /// Holds a `TransientFactory<T>`
    Transient(Box<dyn Any + Send + Sync>),
    /// Holds the shared `Arc<T>`
    Singleton(Box<dyn Any + Send + Sync>),
}

struct Registration {
    capability: &'static str,
    lifetime: Lifetime,
    args: ConstructionArgs,
    provider: Provider,
}

/// Release action for one constructed singleton.
struct Release {
    capability: &'static str,
    release: Box<dyn FnOnce() -> anyhow::Result<()> + Send>,
}

/// Object graph of the application.
///
/// Built once through `&mut` registration calls, then shared read-only
/// behind an `Arc`.
pub struct Container {
    registrations: HashMap<TypeId, Registration>,
    /// Singletons in construction order
    releases: Mutex<Vec<Release>>,
}

impl Container {
    pub fn new() -> Self {
        Self {
            registrations: HashMap::new(),
            releases: Mutex::new(Vec::new()),
        }
    }

    fn insert(&mut self, type_id: TypeId, registration: Registration) {
        tracing::debug!(
            capability = registration.capability,
            lifetime = %registration.lifetime,
            "registered"
        );
        if let Some(previous) = self.registrations.insert(type_id, registration) {
            tracing::debug!(capability = previous.capability, "replaced previous registration");
        }
    }

    /// Register a provider invoked on every resolution.
    pub fn register_transient<T, F>(&mut self, args: ConstructionArgs, factory: F)
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(&Container, &ConstructionArgs) -> Result<Arc<T>, CompositionError>
            + Send
            + Sync
            + 'static,
    {
        let factory: TransientFactory<T> = Arc::new(factory);
        self.insert(
            TypeId::of::<T>(),
            Registration {
                capability: type_name::<T>(),
                lifetime: Lifetime::Transient,
                args,
                provider: Provider::Transient(Box::new(factory)),
            },
        );
    }

    /// Build a singleton now and register it.
    ///
    /// The factory may resolve capabilities registered earlier. On success
    /// the container owns the instance and releases it on `dispose`.
    pub fn register_singleton<T, F>(&mut self, factory: F) -> Result<Arc<T>, CompositionError>
    where
        T: ?Sized + Disposable + 'static,
        F: FnOnce(&Container) -> Result<Arc<T>, CompositionError>,
    {
        let instance = factory(self)?;
        Ok(self.register_instance(instance))
    }

    /// Register an already built singleton; the container takes over its release.
    pub fn register_instance<T>(&mut self, instance: Arc<T>) -> Arc<T>
    where
        T: ?Sized + Disposable + 'static,
    {
        let held = instance.clone();
        self.releases.lock().push(Release {
            capability: type_name::<T>(),
            release: Box::new(move || held.dispose()),
        });

        self.insert(
            TypeId::of::<T>(),
            Registration {
                capability: type_name::<T>(),
                lifetime: Lifetime::Singleton,
                args: ConstructionArgs::new(),
                provider: Provider::Singleton(Box::new(instance.clone())),
            },
        );
        instance
    }

    /// Resolve a capability.
    pub fn resolve<T>(&self) -> Result<Arc<T>, CompositionError>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let registration = self
            .registrations
            .get(&TypeId::of::<T>())
            .ok_or(CompositionError::Unregistered(type_name::<T>()))?;

        match &registration.provider {
            Provider::Singleton(instance) => instance
                .downcast_ref::<Arc<T>>()
                .cloned()
                .ok_or(CompositionError::TypeMismatch(registration.capability)),
            Provider::Transient(factory) => {
                let factory = factory
                    .downcast_ref::<TransientFactory<T>>()
                    .ok_or(CompositionError::TypeMismatch(registration.capability))?;
                factory(self, &registration.args)
            }
        }
    }

    pub fn is_registered<T: ?Sized + 'static>(&self) -> bool {
        self.registrations.contains_key(&TypeId::of::<T>())
    }

    /// Lifetime policy of a capability, if registered.
    pub fn lifetime_of<T: ?Sized + 'static>(&self) -> Option<Lifetime> {
        self.registrations
            .get(&TypeId::of::<T>())
            .map(|r| r.lifetime)
    }

    /// Number of registered capabilities.
    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }

    /// Number of singletons still awaiting release.
    pub fn pending_releases(&self) -> usize {
        self.releases.lock().len()
    }

    /// Release every constructed singleton, last constructed first.
    ///
    /// All releases are attempted even if some fail; failures are returned
    /// together. Calling again releases nothing.
    pub fn dispose(&self) -> Result<(), CompositionError> {
        let releases = std::mem::take(&mut *self.releases.lock());
        let count = releases.len();
        let mut failures = Vec::new();

        for release in releases.into_iter().rev() {
            if let Err(e) = (release.release)() {
                tracing::error!(capability = release.capability, "failed to release: {}", e);
                failures.push(format!("{}: {}", release.capability, e));
            }
        }

        tracing::debug!(released = count, failed = failures.len(), "container disposed");

        if failures.is_empty() {
            Ok(())
        } else {
            Err(CompositionError::Release { failures })
        }
    }
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut capabilities: Vec<(&str, Lifetime)> = self
            .registrations
            .values()
            .map(|r| (r.capability, r.lifetime))
            .collect();
        capabilities.sort_by_key(|(name, _)| *name);
        f.debug_struct("Container")
            .field("registrations", &capabilities)
            .field("pending_releases", &self.pending_releases())
            .finish()
    }
}

/// Errors building or tearing down the object graph.
#[derive(Debug, thiserror::Error)]
pub enum CompositionError {
    #[error("no registration for {0}")]
    Unregistered(&'static str),
    #[error("registration for {0} does not provide the requested type")]
    TypeMismatch(&'static str),
    #[error("missing construction argument {0}")]
    MissingArgument(String),
    #[error("failed to construct {capability}: {reason}")]
    Construction {
        capability: &'static str,
        reason: String,
    },
    #[error("failed to release {} component(s): {}", .failures.len(), .failures.join("; "))]
    Release { failures: Vec<String> },
    #[error("{cause}; releasing constructed components also failed: {}", .release_failures.join("; "))]
    Aborted {
        cause: Box<CompositionError>,
        release_failures: Vec<String>,
    },
}

impl CompositionError {
    /// Construction failure of capability `T`.
    pub fn construction<T: ?Sized>(reason: impl std::fmt::Display) -> Self {
        Self::Construction {
            capability: type_name::<T>(),
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    trait Greeter: Disposable {
        fn greet(&self) -> String;
    }

    struct English {
        name: String,
    }

    impl Disposable for English {}

    impl Greeter for English {
        fn greet(&self) -> String {
            format!("hello {}", self.name)
        }
    }

    /// Singleton recording the order in which it is released.
    struct Tracked {
        id: usize,
        log: Arc<Mutex<Vec<usize>>>,
        fail: bool,
    }

    impl Disposable for Tracked {
        fn dispose(&self) -> anyhow::Result<()> {
            self.log.lock().push(self.id);
            if self.fail {
                anyhow::bail!("resource {} is stuck", self.id);
            }
            Ok(())
        }
    }

    #[test]
    fn test_construction_args() {
        let args = ConstructionArgs::new().with("name", "Payments");
        assert_eq!(args.get("name"), Some("Payments"));
        assert_eq!(args.required("name").unwrap(), "Payments");
        assert!(matches!(
            args.required("other"),
            Err(CompositionError::MissingArgument(_))
        ));
    }

    #[test]
    fn test_transient_is_rebuilt_per_resolution() {
        let mut container = Container::new();
        let built = Arc::new(AtomicUsize::new(0));
        let counter = built.clone();
        container.register_transient::<dyn Greeter, _>(
            ConstructionArgs::new().with("name", "world"),
            move |_, args| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(Arc::new(English {
                    name: args.required("name")?.to_string(),
                }) as Arc<dyn Greeter>)
            },
        );

        let a = container.resolve::<dyn Greeter>().unwrap();
        let b = container.resolve::<dyn Greeter>().unwrap();

        assert_eq!(a.greet(), "hello world");
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(built.load(Ordering::SeqCst), 2);
        assert_eq!(container.lifetime_of::<dyn Greeter>(), Some(Lifetime::Transient));
        assert_eq!(container.pending_releases(), 0);
    }

    #[test]
    fn test_singleton_is_shared() {
        let mut container = Container::new();
        container
            .register_singleton::<dyn Greeter, _>(|_| {
                Ok(Arc::new(English {
                    name: "once".to_string(),
                }) as Arc<dyn Greeter>)
            })
            .unwrap();

        let a = container.resolve::<dyn Greeter>().unwrap();
        let b = container.resolve::<dyn Greeter>().unwrap();

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(container.lifetime_of::<dyn Greeter>(), Some(Lifetime::Singleton));
        assert_eq!(container.pending_releases(), 1);
    }

    #[test]
    fn test_singleton_factory_resolves_dependencies() {
        let mut container = Container::new();
        container.register_transient::<English, _>(ConstructionArgs::new(), |_, _| {
            Ok(Arc::new(English {
                name: "inner".to_string(),
            }))
        });

        let greeter = container
            .register_singleton::<dyn Greeter, _>(|c| {
                let inner = c.resolve::<English>()?;
                Ok(inner as Arc<dyn Greeter>)
            })
            .unwrap();

        assert_eq!(greeter.greet(), "hello inner");
        assert_eq!(container.len(), 2);
    }

    #[test]
    fn test_register_twice_overwrites() {
        let mut container = Container::new();
        container.register_transient::<dyn Greeter, _>(ConstructionArgs::new(), |_, _| {
            Ok(Arc::new(English { name: "first".to_string() }) as Arc<dyn Greeter>)
        });
        container.register_transient::<dyn Greeter, _>(ConstructionArgs::new(), |_, _| {
            Ok(Arc::new(English { name: "second".to_string() }) as Arc<dyn Greeter>)
        });

        assert_eq!(container.len(), 1);
        assert_eq!(container.resolve::<dyn Greeter>().unwrap().greet(), "hello second");
    }

    #[test]
    fn test_resolve_unregistered() {
        let container = Container::new();
        let result = container.resolve::<dyn Greeter>();
        assert!(matches!(result, Err(CompositionError::Unregistered(_))));
        assert!(!container.is_registered::<dyn Greeter>());
    }

    #[test]
    fn test_failing_singleton_factory_registers_nothing() {
        let mut container = Container::new();
        let result = container.register_singleton::<dyn Greeter, _>(|_| {
            Err(CompositionError::construction::<dyn Greeter>("no greeting today"))
        });

        assert!(matches!(result, Err(CompositionError::Construction { .. })));
        assert!(container.is_empty());
        assert_eq!(container.pending_releases(), 0);
    }

    #[test]
    fn test_dispose_in_reverse_construction_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut container = Container::new();
        container.register_instance(Arc::new(Tracked { id: 1, log: log.clone(), fail: false }));
        container.register_instance(Arc::new(English { name: "x".to_string() }));
        container
            .register_singleton::<dyn Disposable, _>(|_| {
                Ok(Arc::new(Tracked { id: 2, log: log.clone(), fail: false }) as Arc<dyn Disposable>)
            })
            .unwrap();

        container.dispose().unwrap();

        assert_eq!(*log.lock(), vec![2, 1]);
        assert_eq!(container.pending_releases(), 0);
    }

    #[test]
    fn test_dispose_reports_every_failure() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut container = Container::new();
        container.register_instance(Arc::new(Tracked { id: 1, log: log.clone(), fail: true }));
        container.register_instance(Arc::new(English { name: "x".to_string() }));
        container
            .register_singleton::<dyn Disposable, _>(|_| {
                Ok(Arc::new(Tracked { id: 2, log: log.clone(), fail: true }) as Arc<dyn Disposable>)
            })
            .unwrap();

        let result = container.dispose();

        match result {
            Err(CompositionError::Release { failures }) => {
                assert_eq!(failures.len(), 2);
                assert!(failures[0].contains("resource 2 is stuck"));
            }
            other => panic!("expected release failure, got {:?}", other),
        }
        assert_eq!(*log.lock(), vec![2, 1]);
    }

    #[test]
    fn test_dispose_twice_releases_once() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut container = Container::new();
        container.register_instance(Arc::new(Tracked { id: 1, log: log.clone(), fail: false }));

        container.dispose().unwrap();
        container.dispose().unwrap();

        assert_eq!(log.lock().len(), 1);
    }

    #[test]
    fn test_error_display() {
        let err = CompositionError::Release {
            failures: vec!["a: x".to_string(), "b: y".to_string()],
        };
        assert_eq!(err.to_string(), "failed to release 2 component(s): a: x; b: y");

        let err = CompositionError::Aborted {
            cause: Box::new(CompositionError::Unregistered("Foo")),
            release_failures: vec!["cache: stuck".to_string()],
        };
        assert!(err.to_string().contains("no registration for Foo"));
        assert!(err.to_string().contains("cache: stuck"));
    }
}
