//! Session identifiers and per-resolution parameters.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Identifier of a resolution session.
///
/// The root container resolves under [`SessionId::ROOT`]; every session
/// created from it gets a fresh, monotonically increasing id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SessionId(pub u64);

impl SessionId {
    /// Session id used by the root container
    pub const ROOT: SessionId = SessionId(0);

    /// Returns `true` for the root container's session.
    pub fn is_root(self) -> bool {
        self == Self::ROOT
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// Parameters attached to a resolution.
///
/// Carries the id of the session performing the resolution plus free-form
/// values that instances can inspect in [`Component::is_valid`].
///
/// [`Component::is_valid`]: crate::Component::is_valid
///
/// # Examples
///
/// ```
/// use rewire::Params;
///
/// let defaults = Params::new().with("locale", "en").with("tenant", "acme");
/// let call = Params::new().with("locale", "fr");
///
/// let merged = defaults.merged_with(&call);
/// assert_eq!(merged.get("locale").unwrap(), "fr");
/// assert_eq!(merged.get("tenant").unwrap(), "acme");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Params {
    #[serde(default = "root_session")]
    session_id: SessionId,
    #[serde(flatten)]
    values: Map<String, Value>,
}

fn root_session() -> SessionId {
    SessionId::ROOT
}

impl Default for SessionId {
    fn default() -> Self {
        SessionId::ROOT
    }
}

impl Params {
    /// Creates empty parameters for the root session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a value, builder style.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Sets a value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(key.into(), value.into());
    }

    /// Reads a value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// All caller-provided values.
    pub fn values(&self) -> &Map<String, Value> {
        &self.values
    }

    /// The session this resolution runs under.
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    pub(crate) fn with_session(mut self, session_id: SessionId) -> Self {
        self.session_id = session_id;
        self
    }

    /// Returns `self` overlaid with the values of `overrides`.
    ///
    /// The session id of `self` is kept: call sites cannot move a resolution
    /// into another session.
    pub fn merged_with(&self, overrides: &Params) -> Params {
        let mut merged = self.clone();
        for (key, value) in &overrides.values {
            merged.values.insert(key.clone(), value.clone());
        }
        merged
    }
}
