//! Instance handles and injected dependency maps.

use std::any::{Any, TypeId};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{DiError, DiResult};
use crate::traits::Component;

// Type-erased Arc for storage
pub(crate) type AnyArc = Arc<dyn Any + Send + Sync>;

/// A built instance, shared between the container and its consumers.
///
/// Cloning an `Instance` clones the handle, not the value. Two handles are
/// the same instance when [`Instance::ptr_eq`] holds.
///
/// # Examples
///
/// ```
/// use rewire::{Component, Instance};
///
/// struct Database { url: String }
/// impl Component for Database {}
///
/// let db = Instance::new(Database { url: "postgres://localhost".into() });
/// let same = db.clone();
/// assert!(db.ptr_eq(&same));
/// assert_eq!(db.downcast::<Database>().unwrap().url, "postgres://localhost");
///
/// // Plain values carry no capabilities
/// let port = Instance::value(8080u16);
/// assert!(port.component().is_none());
/// assert_eq!(*port.downcast::<u16>().unwrap(), 8080);
/// ```
#[derive(Clone)]
pub struct Instance {
    value: AnyArc,
    component: Option<Arc<dyn Component>>,
    type_name: &'static str,
}

impl Instance {
    /// Wraps a value exposing [`Component`] capabilities.
    pub fn new<T: Component>(value: T) -> Self {
        Self::from_arc(Arc::new(value))
    }

    /// Wraps an already shared component.
    pub fn from_arc<T: Component>(value: Arc<T>) -> Self {
        Self {
            value: value.clone(),
            component: Some(value),
            type_name: std::any::type_name::<T>(),
        }
    }

    /// Wraps a plain value without any capabilities.
    pub fn value<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            value: Arc::new(value),
            component: None,
            type_name: std::any::type_name::<T>(),
        }
    }

    /// Typed access to the value.
    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.value.clone().downcast::<T>().ok()
    }

    /// Capability view of the value, if it was built from a [`Component`].
    pub fn component(&self) -> Option<&Arc<dyn Component>> {
        self.component.as_ref()
    }

    /// `true` when both handles point at the same allocation.
    pub fn ptr_eq(&self, other: &Instance) -> bool {
        Arc::ptr_eq(&self.value, &other.value)
    }

    /// Concrete type of the wrapped value.
    pub fn value_type_id(&self) -> TypeId {
        (*self.value).type_id()
    }

    /// Name of the concrete type, for diagnostics.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub(crate) fn same_type(&self, other: &Instance) -> bool {
        self.value_type_id() == other.value_type_id()
    }

    pub(crate) fn is_valid(&self, params: &crate::Params) -> bool {
        self.component.as_ref().map_or(true, |c| c.is_valid(params))
    }

    /// Sends the destroy notifications, in order.
    pub(crate) fn reclaim(&self) {
        if let Some(component) = &self.component {
            component.will_destroy();
            component.destroy();
        }
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("type", &self.type_name)
            .field("ptr", &Arc::as_ptr(&self.value))
            .finish()
    }
}

/// State of a definition's cached instance.
#[derive(Debug, Clone, Default)]
pub enum InstanceSlot {
    /// Never built
    #[default]
    Unbuilt,
    /// Built and cached
    Live(Instance),
    /// Reclaimed by a session close or a container teardown
    Destroyed,
}

impl InstanceSlot {
    /// The live instance, if any.
    pub fn live(&self) -> Option<&Instance> {
        match self {
            InstanceSlot::Live(instance) => Some(instance),
            _ => None,
        }
    }

    /// `true` for [`InstanceSlot::Destroyed`].
    pub fn is_destroyed(&self) -> bool {
        matches!(self, InstanceSlot::Destroyed)
    }
}

/// Resolved dependency values, keyed by local dependency name.
///
/// This is what factories and update methods receive.
///
/// # Examples
///
/// ```
/// use rewire::{Dependencies, Instance};
///
/// let mut deps = Dependencies::new();
/// deps.insert("port", Instance::value(8080u16));
///
/// assert_eq!(*deps.get::<u16>("port").unwrap(), 8080);
/// assert!(deps.get::<String>("port").is_err());
/// assert!(deps.get::<u16>("host").is_err());
/// ```
#[derive(Debug, Clone, Default)]
pub struct Dependencies {
    values: BTreeMap<String, Instance>,
}

impl Dependencies {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a dependency value.
    pub fn insert(&mut self, key: impl Into<String>, instance: Instance) {
        self.values.insert(key.into(), instance);
    }

    /// Typed access to a required dependency.
    pub fn get<T: Any + Send + Sync>(&self, key: &str) -> DiResult<Arc<T>> {
        let instance = self
            .values
            .get(key)
            .ok_or_else(|| DiError::MissingDependency(key.to_string()))?;
        instance.downcast::<T>().ok_or_else(|| DiError::TypeMismatch {
            key: key.to_string(),
            expected: std::any::type_name::<T>(),
        })
    }

    /// Typed access to an optional dependency.
    pub fn try_get<T: Any + Send + Sync>(&self, key: &str) -> Option<Arc<T>> {
        self.values.get(key).and_then(|instance| instance.downcast::<T>())
    }

    /// Untyped access.
    pub fn instance(&self, key: &str) -> Option<&Instance> {
        self.values.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterates over `(local key, instance)` pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Instance)> {
        self.values.iter().map(|(key, instance)| (key.as_str(), instance))
    }
}

impl FromIterator<(String, Instance)> for Dependencies {
    fn from_iter<I: IntoIterator<Item = (String, Instance)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}
