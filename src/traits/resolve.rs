//! Resolution surface shared by containers and sessions.

use std::any::Any;
use std::sync::Arc;

use tracing::error;

use crate::container::{Container, Session, Snapshot};
use crate::definition::DependencyMap;
use crate::error::{DiError, DiResult};
use crate::instance::{Dependencies, Instance};
use crate::params::Params;
use crate::resolution::Resolution;

/// High-level resolution interface.
///
/// Both [`Container`] and [`Session`] implement this trait, making them
/// interchangeable wherever something needs to be resolved. Only the two
/// required methods differ between them: which container backs the
/// resolution and which parameters it runs under.
///
/// Failed resolutions are logged at `error` level and still returned to the
/// caller.
///
/// # Examples
///
/// ```
/// use rewire::{Container, Component, Dependencies, Instance, Module, Resolve, StaticResolver};
///
/// struct Settings { debug: bool }
/// impl Component for Settings {}
///
/// fn debug_enabled(scope: &impl Resolve) -> bool {
///     scope.get_as::<Settings>("settings").into_ready("settings").map_or(false, |s| s.debug)
/// }
///
/// let container = Container::builder().build().unwrap();
/// container.put("settings", Instance::new(Settings { debug: true })).unwrap();
///
/// assert!(debug_enabled(&container));
/// let session = container.session();
/// assert!(debug_enabled(&session));
/// session.close();
/// ```
pub trait Resolve {
    /// Container backing the resolution.
    fn container(&self) -> &Container;

    /// Parameters merged under every call-site parameter set.
    fn params(&self) -> &Params;

    /// Resolves a definition by id.
    fn get(&self, id: &str) -> Resolution<Instance> {
        self.get_with(id, &Params::new())
    }

    /// Resolves a definition by id with extra parameters.
    fn get_with(&self, id: &str, params: &Params) -> Resolution<Instance> {
        let params = self.params().merged_with(params);
        let failed = id.to_string();
        self.container()
            .resolve(id, &params)
            .inspect_err(move |e| error!(id = %failed, error = %e, "resolution failed"))
    }

    /// Resolves a definition and downcasts the instance.
    fn get_as<T>(&self, id: &str) -> Resolution<Arc<T>>
    where
        T: Any + Send + Sync,
        Self: Sized,
    {
        let key = id.to_string();
        self.get(id).and_then(move |instance| match instance.downcast::<T>() {
            Some(value) => Resolution::ok(value),
            None => Resolution::err(DiError::TypeMismatch {
                key,
                expected: std::any::type_name::<T>(),
            }),
        })
    }

    /// Resolves an inline graph and returns the instances by local key.
    fn get_graph(&self, graph: &DependencyMap) -> Resolution<Dependencies> {
        self.get_graph_with(graph, &Params::new())
    }

    /// Resolves an inline graph with extra parameters.
    fn get_graph_with(&self, graph: &DependencyMap, params: &Params) -> Resolution<Dependencies> {
        let params = self.params().merged_with(params);
        self.container()
            .resolve_graph(graph, &params)
            .inspect_err(|e| error!(error = %e, "inline graph resolution failed"))
    }

    /// Injects a ready-made, persistent instance under `id`.
    fn put(&self, id: &str, instance: Instance) -> DiResult<()> {
        self.container()
            .put_instance(id, instance, self.params().session_id())
    }

    /// Opens a nested session inheriting these parameters.
    fn session(&self) -> Session {
        self.session_with(&Params::new())
    }

    /// Opens a nested session; `defaults` are merged over this scope's own.
    fn session_with(&self, defaults: &Params) -> Session {
        Session::open(self.container().clone(), self.params().merged_with(defaults))
    }

    /// Serialized state of every live instance that supports it.
    fn serialize(&self) -> Snapshot {
        self.container().snapshot()
    }
}
