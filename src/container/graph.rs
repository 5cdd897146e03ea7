//! The resolution engine.
//!
//! Every step reads or writes the registry under its lock and releases it
//! before calling into user code (resolvers, factories, capability hooks),
//! so those are free to take as long as they like or to suspend.

use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use futures::future::FutureExt;
use tracing::{debug, trace};

use super::Container;
use crate::definition::{DefinitionObject, DependencyMap, Normalizer, RawDefinition, DEFAULT_UPDATE};
use crate::error::{DiError, DiResult};
use crate::factory;
use crate::instance::{Dependencies, Instance, InstanceSlot};
use crate::internal::ResolutionPath;
use crate::module::Export;
use crate::params::Params;
use crate::resolution::Resolution;

/// What to do with a definition once its dependencies are resolved.
enum Step {
    Cached(Instance),
    Build,
    Update { current: Instance, method: String },
}

/// Dependency set being applied, and the definition it came from.
struct Source {
    id: String,
    dependencies: BTreeMap<String, String>,
}

impl Container {
    /// Resolves `id` under `params`.
    pub(crate) fn resolve(&self, id: &str, params: &Params) -> Resolution<Instance> {
        self.resolve_id(id, params, &ResolutionPath::default())
    }

    /// Resolves an inline dependency map.
    ///
    /// The map is registered under a synthetic id derived from its content,
    /// so repeating the same inline graph hits the same definitions.
    pub(crate) fn resolve_graph(&self, graph: &DependencyMap, params: &Params) -> Resolution<Dependencies> {
        let graph_id = match graph_id(graph) {
            Ok(id) => id,
            Err(error) => return Resolution::err(error),
        };
        let dependencies = {
            let mut registry = self.inner().registry.lock();
            let raw = RawDefinition::from(DefinitionObject {
                id: Some(graph_id.clone()),
                dependencies: graph.clone(),
                ..Default::default()
            });
            if let Err(error) = Normalizer::new(&mut registry).normalize(&graph_id, &raw) {
                return Resolution::err(error);
            }
            registry
                .get(&graph_id)
                .map(|definition| definition.dependencies.clone())
                .unwrap_or_default()
        };
        trace!(id = %graph_id, keys = dependencies.len(), "resolving inline graph");
        let path = match ResolutionPath::default().enter(&graph_id) {
            Ok(path) => path,
            Err(error) => return Resolution::err(error),
        };
        self.resolve_dependencies(&dependencies, params, &path)
    }

    fn resolve_id(&self, id: &str, params: &Params, path: &ResolutionPath) -> Resolution<Instance> {
        let path = match path.enter(id) {
            Ok(path) => path,
            Err(error) => return Resolution::err(error),
        };

        let reuse = {
            let mut registry = self.inner().registry.lock();
            if let Err(error) = Normalizer::new(&mut registry).ensure(id) {
                return Resolution::err(error);
            }
            match registry.get(id) {
                Some(definition) => {
                    if definition.is_persistent {
                        if let Some(instance) = definition.instance.live() {
                            return Resolution::ok(instance.clone());
                        }
                    }
                    definition.reuse.clone()
                }
                None => return Resolution::err(DiError::MissingDependency(id.to_string())),
            }
        };

        match reuse {
            Some(_) => self.resolve_alias(id, params, path),
            None => self.resolve_target(id, None, params, path),
        }
    }

    /// Follows a reuse chain down to the definition that owns the instance.
    ///
    /// The nearest alias with its own dependencies supplies the dependency
    /// set handed to the target.
    fn resolve_alias(&self, alias: &str, params: &Params, path: ResolutionPath) -> Resolution<Instance> {
        let mut path = path;
        let mut source: Option<Source> = None;
        let mut current = alias.to_string();

        let target = loop {
            let next = {
                let mut registry = self.inner().registry.lock();
                if let Err(error) = Normalizer::new(&mut registry).ensure(&current) {
                    return Resolution::err(error);
                }
                let Some(definition) = registry.get(&current) else {
                    return Resolution::err(DiError::MissingDependency(current.clone()));
                };
                if source.is_none() && definition.reuse.is_some() && !definition.dependencies.is_empty() {
                    source = Some(Source {
                        id: current.clone(),
                        dependencies: definition.dependencies.clone(),
                    });
                }
                definition.reuse.clone()
            };
            match next {
                Some(next) => {
                    path = match path.enter(&next) {
                        Ok(path) => path,
                        Err(error) => return Resolution::err(error),
                    };
                    current = next;
                }
                None => break current,
            }
        };

        trace!(alias, target = %target, "following reuse");
        self.resolve_target(&target, source, params, path)
    }

    fn resolve_target(
        &self,
        id: &str,
        source: Option<Source>,
        params: &Params,
        path: ResolutionPath,
    ) -> Resolution<Instance> {
        let source = {
            let registry = self.inner().registry.lock();
            let Some(definition) = registry.get(id) else {
                return Resolution::err(DiError::MissingDependency(id.to_string()));
            };
            if definition.is_persistent {
                if let Some(instance) = definition.instance.live() {
                    return Resolution::ok(instance.clone());
                }
            }
            if let Some(inflight) = definition.joinable() {
                trace!(id, "joining in-flight resolution");
                return Resolution::deferred(inflight);
            }
            source.unwrap_or_else(|| Source {
                id: id.to_string(),
                dependencies: definition.dependencies.clone(),
            })
        };

        let container = self.clone();
        let target = id.to_string();
        let call_params = params.clone();
        let resolution = self
            .resolve_dependencies(&source.dependencies, params, &path)
            .and_then(move |deps| container.build_or_update(&target, &source.id, deps, &call_params));

        match resolution {
            Resolution::Deferred(future) => self.track_inflight(id, future),
            ready => ready,
        }
    }

    /// Resolves every dependency independently and assembles the map once
    /// all of them are available.
    fn resolve_dependencies(
        &self,
        dependencies: &BTreeMap<String, String>,
        params: &Params,
        path: &ResolutionPath,
    ) -> Resolution<Dependencies> {
        let resolutions = dependencies
            .iter()
            .map(|(key, dependency_id)| {
                let key = key.clone();
                self.resolve_id(dependency_id, params, path)
                    .map(move |instance| (key, instance))
            })
            .collect();
        Resolution::all(resolutions).map(|pairs| pairs.into_iter().collect())
    }

    /// Installs the in-flight marker for a deferred resolution of `id`.
    ///
    /// The registry only keeps a weak marker: once every waiter has dropped
    /// its handle the marker is dead, the unfinished work is dropped with it
    /// and the next request starts over. When a live resolution of `id` got
    /// there first, that one is shared and `future` is dropped unpolled.
    fn track_inflight(
        &self,
        id: &str,
        future: futures::future::BoxFuture<'static, DiResult<Instance>>,
    ) -> Resolution<Instance> {
        let inner = Arc::downgrade(&self.inner);
        let owner = id.to_string();
        let shared = async move {
            let result = future.await;
            if let Some(inner) = inner.upgrade() {
                if let Some(definition) = inner.registry.lock().get_mut(&owner) {
                    definition.inflight = None;
                }
            }
            result
        }
        .boxed()
        .shared();

        let mut registry = self.inner().registry.lock();
        if let Some(definition) = registry.get_mut(id) {
            if let Some(existing) = definition.joinable() {
                return Resolution::deferred(existing);
            }
            definition.inflight = shared.downgrade();
        }
        Resolution::deferred(shared)
    }

    fn build_or_update(
        &self,
        id: &str,
        source: &str,
        deps: Dependencies,
        params: &Params,
    ) -> Resolution<Instance> {
        let (cached, last_session, applied_from, update) = {
            let registry = self.inner().registry.lock();
            let Some(definition) = registry.get(id) else {
                return Resolution::err(DiError::MissingDependency(id.to_string()));
            };
            if definition.is_persistent {
                if let Some(instance) = definition.instance.live() {
                    return Resolution::ok(instance.clone());
                }
            }
            (
                definition.instance.live().cloned(),
                definition.session_id,
                definition.applied_from.clone(),
                definition.update.clone(),
            )
        };

        let step = match cached {
            None => Step::Build,
            Some(current) if !current.is_valid(params) => {
                debug!(id, "cached instance is no longer valid, rebuilding");
                Step::Build
            }
            Some(current)
                if last_session != Some(params.session_id())
                    || applied_from.as_deref() != Some(source) =>
            {
                Step::Update {
                    current,
                    method: update,
                }
            }
            Some(current) => Step::Cached(current),
        };

        match step {
            Step::Cached(current) => {
                self.touch(id, source, params);
                Resolution::ok(current)
            }
            Step::Build => self.build(id, source, deps, params),
            Step::Update { current, method } => self.update(id, source, current, &method, deps, params),
        }
    }

    fn update(
        &self,
        id: &str,
        source: &str,
        current: Instance,
        method: &str,
        deps: Dependencies,
        params: &Params,
    ) -> Resolution<Instance> {
        let outcome = current
            .component()
            .and_then(|component| component.update(method, &deps));

        let Some(outcome) = outcome else {
            if method != DEFAULT_UPDATE {
                return Resolution::err(DiError::UpdateMethodNotFound {
                    id: id.to_string(),
                    method: method.to_string(),
                });
            }
            self.touch(id, source, params);
            return Resolution::ok(current);
        };

        debug!(id, method, session = %params.session_id(), "updating instance");
        let container = self.clone();
        let id = id.to_string();
        let source = source.to_string();
        let params = params.clone();
        outcome.map(move |returned| match returned {
            Some(replacement) if !replacement.same_type(&current) => {
                container.replace(&id, &source, &current, replacement, &params)
            }
            _ => {
                container.touch(&id, &source, &params);
                current
            }
        })
    }

    fn build(&self, id: &str, source: &str, deps: Dependencies, params: &Params) -> Resolution<Instance> {
        let (module, bundle, factory_name) = {
            let registry = self.inner().registry.lock();
            let Some(definition) = registry.get(id) else {
                return Resolution::err(DiError::MissingDependency(id.to_string()));
            };
            (
                definition.module.clone(),
                definition.bundle_name.clone(),
                definition.factory.clone(),
            )
        };

        let module = match (module, bundle) {
            (Some(export), _) => Resolution::ok(export),
            (None, Some(bundle)) => self.load_module(id, &bundle),
            (None, None) => return Resolution::err(DiError::BundleNotFound(id.to_string())),
        };

        let container = self.clone();
        let id = id.to_string();
        let source = source.to_string();
        let params = params.clone();
        module.and_then(move |export| {
            factory::build(&id, &export, factory_name.as_deref(), deps)
                .map(move |instance| container.store(&id, &source, instance, &params))
        })
    }

    /// Asks each resolver in turn; the first answer wins and is cached on the
    /// definition.
    pub(crate) fn load_module(&self, id: &str, bundle: &str) -> Resolution<Export> {
        let found = self
            .inner()
            .resolvers
            .iter()
            .find_map(|resolver| resolver.resolve(bundle));

        match found {
            Some(resolution) => {
                debug!(id, bundle, deferred = resolution.is_deferred(), "module resolved");
                let container = self.clone();
                let id = id.to_string();
                resolution.map(move |export| {
                    container.cache_module(&id, export.clone());
                    export
                })
            }
            None => Resolution::err(DiError::BundleNotFound(bundle.to_string())),
        }
    }

    fn cache_module(&self, id: &str, export: Export) {
        if let Some(definition) = self.inner().registry.lock().get_mut(id) {
            definition.module.get_or_insert(export);
        }
    }

    /// Records that the current session saw the instance.
    fn touch(&self, id: &str, source: &str, params: &Params) {
        if let Some(definition) = self.inner().registry.lock().get_mut(id) {
            definition.session_id = Some(params.session_id());
            definition.applied_from = Some(source.to_string());
        }
    }

    /// Caches a freshly built instance. A persistent instance injected in the
    /// meantime wins over the built one.
    pub(crate) fn store(&self, id: &str, source: &str, instance: Instance, params: &Params) -> Instance {
        let mut registry = self.inner().registry.lock();
        let Some(definition) = registry.get_mut(id) else {
            return instance;
        };
        if definition.is_persistent {
            if let Some(persistent) = definition.instance.live() {
                return persistent.clone();
            }
        }
        definition.instance = InstanceSlot::Live(instance.clone());
        definition.session_id = Some(params.session_id());
        definition.applied_from = Some(source.to_string());
        instance
    }

    /// Supersedes `previous` with `replacement`; `previous` is destroyed when
    /// the replacing session closes.
    fn replace(
        &self,
        id: &str,
        source: &str,
        previous: &Instance,
        replacement: Instance,
        params: &Params,
    ) -> Instance {
        let mut registry = self.inner().registry.lock();
        let Some(definition) = registry.get_mut(id) else {
            return replacement;
        };
        if definition.is_persistent {
            if let Some(persistent) = definition.instance.live() {
                return persistent.clone();
            }
        }
        if definition.instance.live().is_some_and(|live| live.ptr_eq(previous)) {
            definition.retired.push((params.session_id(), previous.clone()));
        }
        debug!(
            id,
            from = previous.type_name(),
            to = replacement.type_name(),
            "instance superseded by update"
        );
        definition.instance = InstanceSlot::Live(replacement.clone());
        definition.session_id = Some(params.session_id());
        definition.applied_from = Some(source.to_string());
        replacement
    }
}

/// Stable synthetic id for an inline graph.
fn graph_id(graph: &DependencyMap) -> DiResult<String> {
    let canonical = serde_json::to_string(graph)?;
    let mut hasher = DefaultHasher::new();
    canonical.hash(&mut hasher);
    Ok(format!("graph#{:016x}", hasher.finish()))
}
