//! Instance snapshots.

use std::collections::BTreeMap;

use serde_json::Value;
use tracing::debug;

use super::Container;
use crate::definition::Normalizer;
use crate::error::DiError;
use crate::factory;
use crate::instance::Instance;
use crate::params::Params;
use crate::resolution::Resolution;

/// Definition id -> plain data produced by [`Component::serialize`].
///
/// [`Component::serialize`]: crate::Component::serialize
pub type Snapshot = BTreeMap<String, Value>;

impl Container {
    /// Collects the serialized state of every live instance that supports it.
    pub(crate) fn snapshot(&self) -> Snapshot {
        let live: Vec<(String, Instance)> = self
            .inner()
            .registry
            .lock()
            .iter()
            .filter_map(|(id, definition)| {
                definition
                    .instance
                    .live()
                    .filter(|instance| instance.component().is_some())
                    .map(|instance| (id.clone(), instance.clone()))
            })
            .collect();

        live.into_iter()
            .filter_map(|(id, instance)| {
                let data = instance.component()?.serialize()?;
                Some((id, data))
            })
            .collect()
    }

    /// Rebuilds instances from a snapshot through each module's restore
    /// factory, without resolving dependencies.
    ///
    /// # Examples
    ///
    /// ```
    /// use rewire::{Container, Component, Module, Resolve, StaticResolver};
    /// use serde_json::{json, Value};
    ///
    /// struct Counter(u64);
    /// impl Component for Counter {
    ///     fn serialize(&self) -> Option<Value> {
    ///         Some(json!(self.0))
    ///     }
    /// }
    ///
    /// let container = Container::builder()
    ///     .resolver(StaticResolver::new().with("Counter", Module::new("Counter")
    ///         .restore(|data: Value| Ok(Counter(data.as_u64().unwrap_or_default())))))
    ///     .build()
    ///     .unwrap();
    ///
    /// let snapshot = [("Counter".to_string(), json!(7))].into_iter().collect();
    /// container.restore(snapshot).into_ready("restore").unwrap();
    /// assert_eq!(container.serialize()["Counter"], json!(7));
    /// ```
    pub fn restore(&self, snapshot: Snapshot) -> Resolution<()> {
        let params = Params::new();
        let mut restored = Vec::with_capacity(snapshot.len());
        for (id, data) in snapshot {
            restored.push(self.restore_one(id, data, &params));
        }
        Resolution::all(restored).map(|instances| {
            debug!(count = instances.len(), "snapshot restored");
        })
    }

    fn restore_one(&self, id: String, data: Value, params: &Params) -> Resolution<()> {
        let (module, bundle) = {
            let mut registry = self.inner().registry.lock();
            if let Err(error) = Normalizer::new(&mut registry).ensure(&id) {
                return Resolution::err(error);
            }
            match registry.get(&id) {
                Some(definition) => (definition.module.clone(), definition.bundle_name.clone()),
                None => (None, None),
            }
        };

        let module = match (module, bundle) {
            (Some(export), _) => Resolution::ok(export),
            (None, Some(bundle)) => self.load_module(&id, &bundle),
            (None, None) => return Resolution::err(DiError::BundleNotFound(id)),
        };

        let container = self.clone();
        let params = params.clone();
        module.and_then(move |export| {
            factory::restore(&id, &export, data).map(move |instance| {
                container.store(&id, &id, instance, &params);
            })
        })
    }
}
