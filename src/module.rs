//! Modules, exports and the module resolver chain.
//!
//! A [`Module`] is the constructible behind a bundle name: an optional
//! default constructor plus named factory functions. Resolvers map bundle
//! names to [`Export`]s; the container asks them in order and keeps the
//! first hit.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use serde_json::Value;

use crate::error::DiResult;
use crate::instance::{Dependencies, Instance};
use crate::resolution::Resolution;
use crate::traits::Component;

/// Factory entry point: resolved dependencies in, maybe an instance out.
///
/// `Ok(None)` is reported as an empty factory result.
pub type FactoryFn = Arc<dyn Fn(Dependencies) -> Resolution<Option<Instance>> + Send + Sync>;

/// Builds an instance from a plain-data snapshot.
pub type RestoreFn = Arc<dyn Fn(Value) -> Resolution<Option<Instance>> + Send + Sync>;

/// A constructible bundle.
///
/// # Examples
///
/// ```
/// use rewire::{Component, Module, Dependencies};
///
/// struct Pool { size: usize }
/// impl Component for Pool {}
///
/// let module = Module::new("Pool")
///     .constructor(|_deps: &Dependencies| Ok(Pool { size: 4 }))
///     .factory("small", |_deps: &Dependencies| Ok(Pool { size: 1 }));
///
/// assert!(module.has_constructor());
/// assert!(module.factory_fn("small").is_some());
/// assert!(module.factory_fn("large").is_none());
/// ```
#[derive(Clone)]
pub struct Module {
    name: String,
    constructor: Option<FactoryFn>,
    factories: HashMap<String, FactoryFn>,
    restore: Option<RestoreFn>,
}

impl Module {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            constructor: None,
            factories: HashMap::new(),
            restore: None,
        }
    }

    /// Module name, for diagnostics.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Sets the default constructor used when no factory name is configured.
    pub fn constructor<T, F>(mut self, f: F) -> Self
    where
        T: Component,
        F: Fn(&Dependencies) -> DiResult<T> + Send + Sync + 'static,
    {
        self.constructor = Some(sync_factory(f));
        self
    }

    /// Sets an asynchronous default constructor.
    pub fn constructor_async<T, F, Fut>(mut self, f: F) -> Self
    where
        T: Component,
        F: Fn(Dependencies) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = DiResult<T>> + Send + 'static,
    {
        self.constructor = Some(async_factory(f));
        self
    }

    /// Adds a named synchronous factory.
    pub fn factory<T, F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        T: Component,
        F: Fn(&Dependencies) -> DiResult<T> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), sync_factory(f));
        self
    }

    /// Adds a named asynchronous factory.
    pub fn factory_async<T, F, Fut>(mut self, name: impl Into<String>, f: F) -> Self
    where
        T: Component,
        F: Fn(Dependencies) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = DiResult<T>> + Send + 'static,
    {
        self.factories.insert(name.into(), async_factory(f));
        self
    }

    /// Adds a named factory with full control over the result.
    ///
    /// Use this when the factory may legitimately produce nothing, or
    /// produce a value without [`Component`] capabilities.
    pub fn raw_factory<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(Dependencies) -> Resolution<Option<Instance>> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Arc::new(f));
        self
    }

    /// Sets the constructor with full control over the result.
    pub fn raw_constructor<F>(mut self, f: F) -> Self
    where
        F: Fn(Dependencies) -> Resolution<Option<Instance>> + Send + Sync + 'static,
    {
        self.constructor = Some(Arc::new(f));
        self
    }

    /// Sets the factory used by `restore` to rebuild instances from snapshots.
    pub fn restore<T, F>(mut self, f: F) -> Self
    where
        T: Component,
        F: Fn(Value) -> DiResult<T> + Send + Sync + 'static,
    {
        self.restore = Some(Arc::new(move |data: Value| {
            Resolution::Ready(f(data).map(|value| Some(Instance::new(value))))
        }));
        self
    }

    pub fn has_constructor(&self) -> bool {
        self.constructor.is_some()
    }

    pub(crate) fn constructor_ref(&self) -> Option<&FactoryFn> {
        self.constructor.as_ref()
    }

    /// Looks up a named factory.
    pub fn factory_fn(&self, name: &str) -> Option<&FactoryFn> {
        self.factories.get(name)
    }

    pub(crate) fn restore_ref(&self) -> Option<&RestoreFn> {
        self.restore.as_ref()
    }
}

fn sync_factory<T, F>(f: F) -> FactoryFn
where
    T: Component,
    F: Fn(&Dependencies) -> DiResult<T> + Send + Sync + 'static,
{
    Arc::new(move |deps: Dependencies| Resolution::Ready(f(&deps).map(|value| Some(Instance::new(value)))))
}

fn async_factory<T, F, Fut>(f: F) -> FactoryFn
where
    T: Component,
    F: Fn(Dependencies) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = DiResult<T>> + Send + 'static,
{
    Arc::new(move |deps: Dependencies| {
        let future = f(deps);
        Resolution::deferred(async move { future.await.map(|value| Some(Instance::new(value))) })
    })
}

impl fmt::Debug for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut factories: Vec<&String> = self.factories.keys().collect();
        factories.sort();
        f.debug_struct("Module")
            .field("name", &self.name)
            .field("constructor", &self.constructor.is_some())
            .field("factories", &factories)
            .field("restore", &self.restore.is_some())
            .finish()
    }
}

/// What a resolver hands back for a bundle name.
#[derive(Debug, Clone)]
pub enum Export {
    /// A constructible module
    Module(Arc<Module>),
    /// A container-style export with several named members; `default` is the
    /// primary one
    Namespace {
        default: Box<Export>,
        members: BTreeMap<String, Export>,
    },
    /// A plain value; never constructible
    Primitive(Value),
}

impl Export {
    /// Unwraps namespaces down to their primary export.
    pub fn primary(&self) -> &Export {
        match self {
            Export::Namespace { default, .. } => default.primary(),
            other => other,
        }
    }

    /// Human readable kind, used in `NotConstructible` errors.
    pub fn kind(&self) -> String {
        match self {
            Export::Module(_) => "module".to_string(),
            Export::Namespace { .. } => "namespace".to_string(),
            Export::Primitive(value) => match value {
                Value::Null => "null",
                Value::Bool(_) => "boolean",
                Value::Number(_) => "number",
                Value::String(_) => "string",
                Value::Array(_) => "array",
                Value::Object(_) => "object",
            }
            .to_string(),
        }
    }
}

impl From<Module> for Export {
    fn from(module: Module) -> Self {
        Export::Module(Arc::new(module))
    }
}

/// Maps a bundle name to an export.
///
/// Returning `None` passes the lookup to the next resolver in the chain.
/// A `Some` result may still be deferred (lazy loading) and may still fail.
pub trait ModuleResolver: Send + Sync {
    fn resolve(&self, bundle_name: &str) -> Option<Resolution<Export>>;
}

impl<F> ModuleResolver for F
where
    F: Fn(&str) -> Option<Resolution<Export>> + Send + Sync,
{
    fn resolve(&self, bundle_name: &str) -> Option<Resolution<Export>> {
        self(bundle_name)
    }
}

/// Resolver backed by a fixed map of exports.
///
/// # Examples
///
/// ```
/// use rewire::{Component, Module, ModuleResolver, StaticResolver, Dependencies};
///
/// struct Clock;
/// impl Component for Clock {}
///
/// let resolver = StaticResolver::new()
///     .with("Clock", Module::new("Clock").constructor(|_: &Dependencies| Ok(Clock)));
///
/// assert!(resolver.resolve("Clock").is_some());
/// assert!(resolver.resolve("Calendar").is_none());
/// ```
#[derive(Debug, Clone, Default)]
pub struct StaticResolver {
    exports: HashMap<String, Export>,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an export under `name`.
    pub fn with(mut self, name: impl Into<String>, export: impl Into<Export>) -> Self {
        self.insert(name, export);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, export: impl Into<Export>) {
        self.exports.insert(name.into(), export.into());
    }
}

impl ModuleResolver for StaticResolver {
    fn resolve(&self, bundle_name: &str) -> Option<Resolution<Export>> {
        self.exports
            .get(bundle_name)
            .map(|export| Resolution::ok(export.clone()))
    }
}
