//! Definitions: raw configuration forms and their canonical record.
//!
//! Raw definitions come in four shapes, all expressible as plain serde data:
//!
//! | Raw form                       | Meaning                                           |
//! |--------------------------------|---------------------------------------------------|
//! | `"name.factory#update"`        | build `name` (factory/update optional)            |
//! | `"!name"`                      | reuse the live instance of definition `name`      |
//! | `["spec", { deps }]`           | string spec plus a dependency map                 |
//! | `[{ ...object }]`              | fully custom [`DefinitionObject`]                 |
//! | `{ deps }`                     | dependency map; spec parsed from the id itself    |
//!
//! Dependency values are either definition ids (strings), `null` (drop an
//! inherited dependency) or nested raw definitions, which become synthetic
//! definitions with ids of the form `owner/key`.

mod normalize;
mod spec;

use std::collections::BTreeMap;

use futures::future::{BoxFuture, Shared, WeakShared};
use serde::{Deserialize, Serialize};

use crate::error::DiResult;
use crate::instance::{Instance, InstanceSlot};
use crate::module::Export;
use crate::params::SessionId;

pub(crate) use normalize::Normalizer;
pub use spec::Spec;

/// Update method invoked when no `#update` part is given.
pub const DEFAULT_UPDATE: &str = "update";

/// Name reported for the default constructor in factory errors.
pub const DEFAULT_FACTORY: &str = "constructor";

/// Name reported for the restore path in factory errors.
pub const RESTORE_FACTORY: &str = "restore";

/// Local dependency key -> raw definition; `None` removes an inherited key.
pub type DependencyMap = BTreeMap<String, Option<RawDefinition>>;

/// Definition id -> raw definition, the shape of a whole configuration.
pub type DefinitionMap = BTreeMap<String, RawDefinition>;

pub(crate) type InflightFuture = Shared<BoxFuture<'static, DiResult<Instance>>>;

/// Registry-side handle on an in-flight resolution; dies with its last waiter.
pub(crate) type InflightMarker = WeakShared<BoxFuture<'static, DiResult<Instance>>>;

/// A definition as written in configuration.
///
/// # Examples
///
/// ```
/// use rewire::definition::{DefinitionMap, RawDefinition};
///
/// let map: DefinitionMap = serde_json::from_str(r#"{
///     "app": { "logger": "logger", "db": ["Database.connect", { "config": "config" }] },
///     "logger": "ConsoleLogger#reconfigure",
///     "shared": "!logger"
/// }"#).unwrap();
///
/// assert!(matches!(map["app"], RawDefinition::Dependencies(_)));
/// assert!(matches!(map["logger"], RawDefinition::Spec(_)));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawDefinition {
    /// `"name[.factory][#update]"` or `"!name"`
    Spec(String),
    /// `["spec", { deps }]`
    WithDependencies(String, DependencyMap),
    /// `[{ ...object }]`
    Custom([DefinitionObject; 1]),
    /// `{ deps }`
    Dependencies(DependencyMap),
}

impl RawDefinition {
    /// Shorthand for the `[spec, deps]` form.
    pub fn with_dependencies<I, K, V>(spec: impl Into<String>, deps: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<RawDefinition>,
    {
        RawDefinition::WithDependencies(
            spec.into(),
            deps.into_iter()
                .map(|(key, value)| (key.into(), Some(value.into())))
                .collect(),
        )
    }

    /// Shorthand for the plain dependency-map form.
    pub fn dependencies<I, K, V>(deps: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<RawDefinition>,
    {
        RawDefinition::Dependencies(
            deps.into_iter()
                .map(|(key, value)| (key.into(), Some(value.into())))
                .collect(),
        )
    }
}

impl From<&str> for RawDefinition {
    fn from(spec: &str) -> Self {
        RawDefinition::Spec(spec.to_string())
    }
}

impl From<String> for RawDefinition {
    fn from(spec: String) -> Self {
        RawDefinition::Spec(spec)
    }
}

impl From<DefinitionObject> for RawDefinition {
    fn from(object: DefinitionObject) -> Self {
        RawDefinition::Custom([object])
    }
}

/// Fully custom definition, the escape hatch of the `[{ ... }]` form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DefinitionObject {
    pub id: Option<String>,
    pub bundle_name: Option<String>,
    pub factory: Option<String>,
    pub update: Option<String>,
    pub reuse: Option<String>,
    pub dependencies: DependencyMap,
}

/// Canonical description of one named dependency.
#[derive(Clone)]
pub struct Definition {
    /// Unique key of the definition
    pub id: String,
    /// Definition this one derives from or aliases; itself for roots
    pub parent_id: String,
    /// Name looked up through the resolver chain; `None` for pure aliases
    pub bundle_name: Option<String>,
    /// Factory method; `None` constructs directly
    pub factory: Option<String>,
    /// Update method name
    pub update: String,
    /// Definition whose live instance is returned instead of building one
    pub reuse: Option<String>,
    /// Local key -> definition id
    pub dependencies: BTreeMap<String, String>,
    /// Export resolved through the resolver chain, cached after the first hit
    pub module: Option<Export>,
    /// Cached instance
    pub instance: InstanceSlot,
    /// Injected through `put`; never updated nor reclaimed by sessions
    pub is_persistent: bool,
    /// Last session that built or confirmed the instance
    pub session_id: Option<SessionId>,
    /// Definition whose dependency set was last applied to the instance
    pub applied_from: Option<String>,
    pub(crate) inflight: Option<InflightMarker>,
    /// Instances superseded by an update, destroyed when their session closes
    pub(crate) retired: Vec<(SessionId, Instance)>,
}

impl Definition {
    /// A root definition building `bundle_name` with default factory and update.
    pub fn new(id: impl Into<String>, bundle_name: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            parent_id: id.clone(),
            id,
            bundle_name: Some(bundle_name.into()),
            factory: None,
            update: DEFAULT_UPDATE.to_string(),
            reuse: None,
            dependencies: BTreeMap::new(),
            module: None,
            instance: InstanceSlot::Unbuilt,
            is_persistent: false,
            session_id: None,
            applied_from: None,
            inflight: None,
            retired: Vec::new(),
        }
    }

    /// A pure alias forwarding to `target`.
    pub fn alias(id: impl Into<String>, target: impl Into<String>) -> Self {
        let target = target.into();
        let mut definition = Self::new(id, String::new());
        definition.bundle_name = None;
        definition.parent_id = target.clone();
        definition.reuse = Some(target);
        definition
    }

    /// `true` when a build or update for this id is currently running.
    pub fn is_resolving(&self) -> bool {
        self.joinable().is_some()
    }

    /// The in-flight resolution, if somebody is still waiting on it.
    pub(crate) fn joinable(&self) -> Option<InflightFuture> {
        self.inflight.as_ref().and_then(WeakShared::upgrade)
    }

    /// Factory name used in error messages.
    pub fn factory_label(&self) -> &str {
        self.factory.as_deref().unwrap_or(DEFAULT_FACTORY)
    }

    /// Copy with every piece of runtime state cleared.
    pub(crate) fn reset(&self) -> Self {
        let mut copy = self.clone();
        copy.instance = InstanceSlot::Unbuilt;
        copy.is_persistent = false;
        copy.session_id = None;
        copy.applied_from = None;
        copy.inflight = None;
        copy.retired = Vec::new();
        copy
    }
}

impl std::fmt::Debug for Definition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Definition")
            .field("id", &self.id)
            .field("parent_id", &self.parent_id)
            .field("bundle_name", &self.bundle_name)
            .field("factory", &self.factory)
            .field("update", &self.update)
            .field("reuse", &self.reuse)
            .field("dependencies", &self.dependencies)
            .field("instance", &self.instance)
            .field("is_persistent", &self.is_persistent)
            .field("session_id", &self.session_id)
            .field("resolving", &self.is_resolving())
            .finish()
    }
}
