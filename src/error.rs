//! Error types for the dependency injection container.

use std::error::Error as StdError;
use std::sync::Arc;

use thiserror::Error;

/// Dependency injection errors
///
/// Represents every failure that can surface while normalizing definitions,
/// looking up modules, building instances or refreshing them. Errors are
/// `Clone` because a single in-flight resolution may be awaited by several
/// callers at once and each of them receives the same failure.
///
/// # Examples
///
/// ```rust
/// use rewire::DiError;
///
/// let not_found = DiError::BundleNotFound("Database".to_string());
/// assert_eq!(not_found.to_string(), "Bundle not found: Database");
///
/// let circular = DiError::Circular(vec!["a".into(), "b".into(), "a".into()]);
/// assert_eq!(circular.to_string(), "Circular dependency: a -> b -> a");
/// ```
#[derive(Debug, Clone, Error)]
pub enum DiError {
    /// A string spec did not match `name[.factory][#update]` or `!name`
    #[error("Invalid definition format: {0:?}")]
    InvalidDefinitionFormat(String),
    /// No resolver in the chain knows the bundle
    #[error("Bundle not found: {0}")]
    BundleNotFound(String),
    /// A named factory was requested but the module does not expose it
    #[error("Factory `{factory}` not found for definition `{id}`")]
    FactoryNotFound { id: String, factory: String },
    /// A non-default update method was configured but the instance lacks it
    #[error("Update method `{method}` not found on instance of `{id}`")]
    UpdateMethodNotFound { id: String, method: String },
    /// A factory completed without producing an instance
    #[error("Factory `{factory}` of definition `{id}` returned no instance")]
    EmptyFactoryResult { id: String, factory: String },
    /// The module backing a definition cannot be constructed
    #[error("Module of definition `{id}` is not constructible (found {actual})")]
    NotConstructible { id: String, actual: String },
    /// A factory asked for a dependency key that was not injected
    #[error("Missing dependency `{0}`")]
    MissingDependency(String),
    /// Downcasting an instance to the requested type failed
    #[error("Type mismatch for `{key}`: expected {expected}")]
    TypeMismatch { key: String, expected: &'static str },
    /// Circular dependency detected (includes path)
    #[error("Circular dependency: {}", .0.join(" -> "))]
    Circular(Vec<String>),
    /// Maximum resolution depth exceeded
    #[error("Max depth {0} exceeded")]
    DepthExceeded(usize),
    /// A deferred resolution was forced synchronously
    #[error("Resolution of `{0}` is still pending")]
    Pending(String),
    /// Definition configuration could not be parsed
    #[error("Config error: {0}")]
    Config(String),
    /// Error raised by user code (factory, update, restore), propagated verbatim
    #[error(transparent)]
    Factory(Arc<dyn StdError + Send + Sync>),
}

impl DiError {
    /// Wraps an arbitrary error raised by a factory or update method.
    ///
    /// ```rust
    /// use rewire::DiError;
    ///
    /// let err = DiError::factory("connection refused");
    /// assert_eq!(err.to_string(), "connection refused");
    /// ```
    pub fn factory<E>(error: E) -> Self
    where
        E: Into<Box<dyn StdError + Send + Sync>>,
    {
        DiError::Factory(Arc::from(error.into()))
    }
}

impl From<serde_json::Error> for DiError {
    fn from(error: serde_json::Error) -> Self {
        DiError::Config(error.to_string())
    }
}

#[cfg(feature = "yaml")]
impl From<serde_yaml::Error> for DiError {
    fn from(error: serde_yaml::Error) -> Self {
        DiError::Config(error.to_string())
    }
}

/// Result type for DI operations
///
/// A convenience alias for `Result<T, DiError>` used throughout the crate.
pub type DiResult<T> = Result<T, DiError>;
