//! The container: registry owner and public surface.
//!
//! This module contains the [`Container`] type and its builder. Resolution
//! itself lives in `graph`, session bookkeeping in `session`, and snapshot
//! support in `snapshot`.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::definition::{Definition, DefinitionMap, Normalizer, RawDefinition};
use crate::error::DiResult;
use crate::instance::{Instance, InstanceSlot};
use crate::module::ModuleResolver;
use crate::params::{Params, SessionId};
use crate::registry::Registry;
use crate::traits::Resolve;

mod graph;
mod session;
mod snapshot;

pub use session::Session;
pub use snapshot::Snapshot;

/// Runtime dependency injection container.
///
/// A `Container` owns a registry of [`Definition`]s and a chain of module
/// resolvers. Cloning the handle shares the registry; use
/// [`Container::clone_with`] for an independent copy.
///
/// # Threading
///
/// The container is `Send + Sync` and the registry lock is never held while
/// user code runs. Requests for the same id are coalesced only while that
/// resolution is deferred. Synchronous builds are not guarded: two threads
/// resolving the same unbuilt id at the same moment may both run its
/// factory. Each caller gets the instance it built and the last one stored
/// is cached from then on.
///
/// # Examples
///
/// ```
/// use rewire::{Container, Component, Dependencies, Module, Resolve, StaticResolver};
/// use rewire::definition::RawDefinition;
/// use std::sync::Arc;
///
/// struct Config { url: String }
/// impl Component for Config {}
///
/// struct Database { config: Arc<Config> }
/// impl Component for Database {}
///
/// let resolver = StaticResolver::new()
///     .with("Config", Module::new("Config")
///         .constructor(|_: &Dependencies| Ok(Config { url: "postgres://localhost".into() })))
///     .with("Database", Module::new("Database")
///         .constructor(|deps: &Dependencies| Ok(Database { config: deps.get("config")? })));
///
/// let container = Container::builder()
///     .resolver(resolver)
///     .definition("db", RawDefinition::with_dependencies("Database", [("config", "Config")]))
///     .build()
///     .unwrap();
///
/// let db = container.get_as::<Database>("db").into_ready("db").unwrap();
/// assert_eq!(db.config.url, "postgres://localhost");
/// ```
#[derive(Clone)]
pub struct Container {
    inner: Arc<ContainerInner>,
}

pub(crate) struct ContainerInner {
    pub(crate) registry: Mutex<Registry>,
    pub(crate) resolvers: Arc<Vec<Arc<dyn ModuleResolver>>>,
    pub(crate) root_params: Params,
}

/// Options for [`Container::clone_with`].
#[derive(Debug, Clone, Copy, Default)]
pub struct CloneOptions {
    /// Carry live instances over instead of resetting every definition
    pub clone_instances: bool,
}

impl Container {
    /// Starts a builder.
    pub fn builder() -> ContainerBuilder {
        ContainerBuilder::new()
    }

    #[inline]
    pub(crate) fn inner(&self) -> &ContainerInner {
        &self.inner
    }

    /// Adds a definition after the container was built.
    ///
    /// Existing ids are left untouched.
    pub fn define(&self, id: &str, raw: impl Into<RawDefinition>) -> DiResult<()> {
        let raw = raw.into();
        let mut registry = self.inner.registry.lock();
        Normalizer::new(&mut registry).normalize(id, &raw).map(|_| ())
    }

    /// Adds a whole configuration after the container was built.
    pub fn define_all(&self, definitions: &DefinitionMap) -> DiResult<()> {
        let mut registry = self.inner.registry.lock();
        Normalizer::with_pending(&mut registry, definitions).normalize_pending()
    }

    /// Returns the definition for `id`, creating an implicit one when the id
    /// is unknown.
    pub fn definition(&self, id: &str) -> DiResult<Definition> {
        let mut registry = self.inner.registry.lock();
        Normalizer::new(&mut registry).ensure(id)?;
        Ok(registry
            .get(id)
            .cloned()
            .unwrap_or_else(|| Definition::new(id, id)))
    }

    /// Snapshot of every registered definition.
    pub fn definitions(&self) -> BTreeMap<String, Definition> {
        self.inner.registry.lock().definitions().clone()
    }

    /// Finds the definition whose cached instance is `instance`.
    pub fn instance_definition(&self, instance: &Instance) -> Option<Definition> {
        self.inner
            .registry
            .lock()
            .iter()
            .find(|(_, definition)| {
                definition
                    .instance
                    .live()
                    .is_some_and(|live| live.ptr_eq(instance))
            })
            .map(|(_, definition)| definition.clone())
    }

    /// Reclaims every non-persistent instance right away.
    ///
    /// Returns the number of instances reclaimed.
    pub fn destroy(&self) -> usize {
        let reclaimed: Vec<Instance> = {
            let mut registry = self.inner.registry.lock();
            let mut reclaimed = Vec::new();
            for (_, definition) in registry.iter_mut() {
                reclaimed.extend(definition.retired.drain(..).map(|(_, instance)| instance));
                if definition.is_persistent {
                    continue;
                }
                if definition.instance.live().is_some() {
                    if let InstanceSlot::Live(instance) =
                        std::mem::replace(&mut definition.instance, InstanceSlot::Destroyed)
                    {
                        reclaimed.push(instance);
                    }
                }
            }
            reclaimed
        };

        debug!(count = reclaimed.len(), "destroying container instances");
        for instance in &reclaimed {
            instance.reclaim();
        }
        reclaimed.len()
    }

    /// Independent container sharing this one's resolvers.
    ///
    /// The registry is deep-copied. Live instances are carried over only
    /// when `options.clone_instances` is set.
    pub fn clone_with(&self, options: CloneOptions) -> Container {
        let registry = self.inner.registry.lock().fork(options.clone_instances);
        Container {
            inner: Arc::new(ContainerInner {
                registry: Mutex::new(registry),
                resolvers: self.inner.resolvers.clone(),
                root_params: Params::new(),
            }),
        }
    }

    /// Injects a ready-made instance under `id`, bypassing any factory.
    ///
    /// The definition becomes persistent: session closes never reclaim it
    /// and it is never updated. Only another `put` replaces it.
    pub(crate) fn put_instance(&self, id: &str, instance: Instance, session: SessionId) -> DiResult<()> {
        let mut registry = self.inner.registry.lock();
        Normalizer::new(&mut registry).ensure(id)?;
        if let Some(definition) = registry.get_mut(id) {
            definition.instance = InstanceSlot::Live(instance);
            definition.is_persistent = true;
            definition.session_id = Some(session);
            definition.applied_from = Some(id.to_string());
        }
        debug!(id, %session, "instance injected");
        Ok(())
    }
}

impl Resolve for Container {
    fn container(&self) -> &Container {
        self
    }

    fn params(&self) -> &Params {
        &self.inner.root_params
    }
}

impl std::fmt::Debug for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let registry = self.inner.registry.lock();
        f.debug_struct("Container")
            .field("definitions", &registry.definitions().len())
            .field("resolvers", &self.inner.resolvers.len())
            .finish()
    }
}

/// Collects resolvers and definitions, then builds a [`Container`].
///
/// # Examples
///
/// ```
/// use rewire::{Container, StaticResolver};
/// use rewire::definition::DefinitionMap;
///
/// let definitions: DefinitionMap = serde_json::from_str(r#"{ "app": { "log": "log" } }"#).unwrap();
/// let container = Container::builder()
///     .resolver(StaticResolver::new())
///     .definitions(definitions)
///     .build()
///     .unwrap();
///
/// assert!(container.definitions().contains_key("app"));
/// ```
#[derive(Default)]
pub struct ContainerBuilder {
    resolvers: Vec<Arc<dyn ModuleResolver>>,
    definitions: DefinitionMap,
}

impl ContainerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a resolver; resolvers are asked in insertion order.
    pub fn resolver(mut self, resolver: impl ModuleResolver + 'static) -> Self {
        self.resolvers.push(Arc::new(resolver));
        self
    }

    /// Appends an already shared resolver.
    pub fn shared_resolver(mut self, resolver: Arc<dyn ModuleResolver>) -> Self {
        self.resolvers.push(resolver);
        self
    }

    /// Adds one raw definition.
    pub fn definition(mut self, id: impl Into<String>, raw: impl Into<RawDefinition>) -> Self {
        self.definitions.insert(id.into(), raw.into());
        self
    }

    /// Adds a whole configuration; later entries win on duplicate ids.
    pub fn definitions(mut self, definitions: DefinitionMap) -> Self {
        self.definitions.extend(definitions);
        self
    }

    /// Normalizes every definition and builds the container.
    pub fn build(self) -> DiResult<Container> {
        let mut registry = Registry::new();
        Normalizer::with_pending(&mut registry, &self.definitions).normalize_pending()?;
        debug!(
            definitions = registry.definitions().len(),
            resolvers = self.resolvers.len(),
            "container built"
        );
        Ok(Container {
            inner: Arc::new(ContainerInner {
                registry: Mutex::new(registry),
                resolvers: Arc::new(self.resolvers),
                root_params: Params::new(),
            }),
        })
    }
}
