//! Instance factory: turns an export plus resolved dependencies into an instance.

use tracing::debug;

use crate::definition::{DEFAULT_FACTORY, RESTORE_FACTORY};
use crate::error::DiError;
use crate::instance::{Dependencies, Instance};
use crate::module::Export;
use crate::resolution::Resolution;

/// Builds an instance for definition `id`.
///
/// Namespaces are unwrapped to their primary export first. A named factory
/// must exist on the module; without a factory name the module's
/// constructor is used.
pub(crate) fn build(
    id: &str,
    export: &Export,
    factory: Option<&str>,
    deps: Dependencies,
) -> Resolution<Instance> {
    let module = match export.primary() {
        Export::Module(module) => module,
        other => {
            return Resolution::err(DiError::NotConstructible {
                id: id.to_string(),
                actual: other.kind(),
            })
        }
    };

    let (label, entry) = match factory {
        Some(name) => match module.factory_fn(name) {
            Some(entry) => (name, entry),
            None => {
                return Resolution::err(DiError::FactoryNotFound {
                    id: id.to_string(),
                    factory: name.to_string(),
                })
            }
        },
        None => match module.constructor_ref() {
            Some(entry) => (DEFAULT_FACTORY, entry),
            None => {
                return Resolution::err(DiError::NotConstructible {
                    id: id.to_string(),
                    actual: format!("module `{}` without constructor", module.name()),
                })
            }
        },
    };

    debug!(id, module = module.name(), factory = label, "building instance");
    non_empty(id, label, entry(deps))
}

/// Rebuilds an instance from a plain-data snapshot.
pub(crate) fn restore(id: &str, export: &Export, data: serde_json::Value) -> Resolution<Instance> {
    let module = match export.primary() {
        Export::Module(module) => module,
        other => {
            return Resolution::err(DiError::NotConstructible {
                id: id.to_string(),
                actual: other.kind(),
            })
        }
    };
    match module.restore_ref() {
        Some(entry) => {
            debug!(id, module = module.name(), "restoring instance");
            non_empty(id, RESTORE_FACTORY, entry(data))
        }
        None => Resolution::err(DiError::FactoryNotFound {
            id: id.to_string(),
            factory: RESTORE_FACTORY.to_string(),
        }),
    }
}

fn non_empty(id: &str, factory: &str, produced: Resolution<Option<Instance>>) -> Resolution<Instance> {
    let id = id.to_string();
    let factory = factory.to_string();
    produced.and_then(move |instance| match instance {
        Some(instance) => Resolution::ok(instance),
        None => Resolution::err(DiError::EmptyFactoryResult { id, factory }),
    })
}
