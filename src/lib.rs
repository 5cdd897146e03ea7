//! # rewire
//!
//! Runtime dependency injection over a declarative, name-keyed definition graph.
//!
//! ## Features
//!
//! - **Declarative definitions**: plain serde data (`"Name.factory#update"`,
//!   `"!alias"`, `[spec, deps]`, nested dependency maps)
//! - **Pluggable module resolvers**: bundle names are turned into modules by a
//!   first-match resolver chain
//! - **Sync when possible**: a graph built from synchronous pieces resolves
//!   without an executor; anything async makes the result a future
//! - **Coalescing**: one build per definition at a time, shared by every waiter
//! - **Sessions**: scoped resolution that reclaims stale instances on close
//! - **Snapshots**: serialize live instances and restore them elsewhere
//!
//! ## Quick Start
//!
//! ```rust
//! use rewire::{Component, Container, Dependencies, Module, Resolve, StaticResolver};
//! use rewire::definition::RawDefinition;
//! use std::sync::Arc;
//!
//! struct Database {
//!     connection_string: String,
//! }
//! impl Component for Database {}
//!
//! struct UserService {
//!     db: Arc<Database>,
//! }
//! impl Component for UserService {}
//!
//! let modules = StaticResolver::new()
//!     .with("Database", Module::new("Database").factory("connect", |_: &Dependencies| {
//!         Ok(Database { connection_string: "postgres://localhost".to_string() })
//!     }))
//!     .with("UserService", Module::new("UserService").constructor(|deps: &Dependencies| {
//!         Ok(UserService { db: deps.get("db")? })
//!     }));
//!
//! let container = Container::builder()
//!     .resolver(modules)
//!     .definition("users", RawDefinition::with_dependencies("UserService", [("db", "Database.connect")]))
//!     .build()
//!     .unwrap();
//!
//! let users = container.get_as::<UserService>("users").into_ready("users").unwrap();
//! assert_eq!(users.db.connection_string, "postgres://localhost");
//! ```
//!
//! ## Async Modules
//!
//! ```rust
//! use rewire::{Component, Container, Dependencies, Export, Module, Resolve, Resolution};
//! use std::future::IntoFuture;
//!
//! struct Remote;
//! impl Component for Remote {}
//!
//! let container = Container::builder()
//!     .resolver(|name: &str| {
//!         (name == "Remote").then(|| {
//!             Resolution::deferred(async {
//!                 Ok(Export::from(Module::new("Remote").constructor(|_: &Dependencies| Ok(Remote))))
//!             })
//!         })
//!     })
//!     .build()
//!     .unwrap();
//!
//! let pending = container.get("Remote");
//! assert!(pending.is_deferred());
//! let remote = futures::executor::block_on(pending.into_future()).unwrap();
//! assert!(remote.downcast::<Remote>().is_some());
//! ```

// Module declarations
pub mod config;
pub mod container;
pub mod definition;
pub mod error;
pub mod graph_export;
pub mod instance;
pub mod module;
pub mod params;
pub mod resolution;
pub mod traits;

// Internal modules
mod factory;
mod internal;
mod registry;

pub use container::{CloneOptions, Container, ContainerBuilder, Session, Snapshot};
pub use definition::{Definition, DefinitionMap, DefinitionObject, DependencyMap, RawDefinition, Spec};
pub use error::{DiError, DiResult};
pub use instance::{Dependencies, Instance, InstanceSlot};
pub use module::{Export, FactoryFn, Module, ModuleResolver, RestoreFn, StaticResolver};
pub use params::{Params, SessionId};
pub use resolution::Resolution;
pub use traits::{Component, Resolve, UpdateOutcome};
