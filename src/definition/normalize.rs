//! Turns raw definitions into canonical [`Definition`] records.

use std::collections::BTreeMap;

use tracing::trace;

use super::{Definition, DefinitionMap, DefinitionObject, DependencyMap, RawDefinition, Spec};
use crate::error::DiResult;
use crate::registry::Registry;

/// Writes normalized definitions into a registry.
///
/// Every synthetic definition discovered while walking nested dependency
/// maps is inserted as well, so normalizing a root configuration registers
/// the whole transitive graph. String references are left as ids and only
/// turned into implicit definitions when first resolved.
pub(crate) struct Normalizer<'a> {
    registry: &'a mut Registry,
    pending: Option<&'a DefinitionMap>,
    visiting: Vec<String>,
}

impl<'a> Normalizer<'a> {
    pub(crate) fn new(registry: &'a mut Registry) -> Self {
        Self {
            registry,
            pending: None,
            visiting: Vec::new(),
        }
    }

    /// A normalizer that can derive definitions from not yet normalized
    /// siblings of the same configuration.
    pub(crate) fn with_pending(registry: &'a mut Registry, pending: &'a DefinitionMap) -> Self {
        Self {
            registry,
            pending: Some(pending),
            visiting: Vec::new(),
        }
    }

    /// Normalizes every entry of the pending configuration.
    pub(crate) fn normalize_pending(&mut self) -> DiResult<()> {
        let Some(pending) = self.pending else {
            return Ok(());
        };
        for (id, raw) in pending {
            self.normalize(id, raw)?;
        }
        Ok(())
    }

    /// Makes sure a definition exists for `id`, parsing the id itself as a
    /// string spec when it is unknown.
    pub(crate) fn ensure(&mut self, id: &str) -> DiResult<()> {
        if self.registry.contains(id) {
            return Ok(());
        }
        self.normalize(id, &RawDefinition::Spec(id.to_string()))
            .map(|_| ())
    }

    /// Normalizes one definition; existing ids are returned untouched.
    pub(crate) fn normalize(&mut self, id: &str, raw: &RawDefinition) -> DiResult<String> {
        if self.registry.contains(id) {
            return Ok(id.to_string());
        }

        self.visiting.push(id.to_string());
        let result = match raw {
            RawDefinition::Spec(spec) => self.from_spec(id, spec, None),
            RawDefinition::WithDependencies(spec, deps) => self.from_spec(id, spec, Some(deps)),
            RawDefinition::Dependencies(deps) => self.from_spec(id, id, Some(deps)),
            RawDefinition::Custom([object]) => self.from_object(id, object),
        };
        self.visiting.pop();

        let definition = result?;
        trace!(id = %definition.id, parent = %definition.parent_id, "definition registered");
        self.registry.insert(definition);
        Ok(id.to_string())
    }

    fn from_spec(
        &mut self,
        id: &str,
        spec: &str,
        deps: Option<&DependencyMap>,
    ) -> DiResult<Definition> {
        let mut definition = match Spec::parse(spec)? {
            Spec::Reuse(target) => Definition::alias(id, target),
            Spec::Build {
                bundle,
                factory,
                update,
            } => match self.parent_of(id, &bundle)? {
                Some(parent) => {
                    let mut derived = parent;
                    derived.id = id.to_string();
                    if let Some(factory) = factory {
                        derived.factory = Some(factory);
                    }
                    if let Some(update) = update {
                        derived.update = update;
                    }
                    derived.reset()
                }
                None => {
                    let mut root = Definition::new(id, bundle);
                    root.factory = factory;
                    if let Some(update) = update {
                        root.update = update;
                    }
                    root
                }
            },
        };

        if let Some(deps) = deps {
            self.merge_dependencies(id, &mut definition.dependencies, deps)?;
        }
        Ok(definition)
    }

    fn from_object(&mut self, id: &str, object: &DefinitionObject) -> DiResult<Definition> {
        let mut definition = match &object.reuse {
            Some(target) => Definition::alias(id, target.clone()),
            None => {
                let bundle = object.bundle_name.clone().unwrap_or_else(|| id.to_string());
                let mut root = Definition::new(id, bundle);
                root.factory = object.factory.clone();
                if let Some(update) = &object.update {
                    root.update = update.clone();
                }
                root
            }
        };
        self.merge_dependencies(id, &mut definition.dependencies, &object.dependencies)?;
        Ok(definition)
    }

    /// Returns the definition `id` derives from when its bundle names
    /// another known definition.
    fn parent_of(&mut self, id: &str, bundle: &str) -> DiResult<Option<Definition>> {
        if bundle == id || self.visiting.iter().any(|visiting| visiting == bundle) {
            return Ok(None);
        }
        if !self.registry.contains(bundle) {
            let raw = match self.pending.and_then(|pending| pending.get(bundle)) {
                Some(raw) => raw,
                None => return Ok(None),
            };
            self.normalize(bundle, raw)?;
        }
        Ok(self.registry.get(bundle).map(|parent| {
            let mut parent = parent.clone();
            parent.parent_id = parent.id.clone();
            parent
        }))
    }

    fn merge_dependencies(
        &mut self,
        owner: &str,
        target: &mut BTreeMap<String, String>,
        deps: &DependencyMap,
    ) -> DiResult<()> {
        for (key, value) in deps {
            match value {
                None => {
                    target.remove(key);
                }
                Some(RawDefinition::Spec(reference)) => {
                    target.insert(key.clone(), reference.clone());
                }
                Some(nested) => {
                    let nested_id = self.nested(owner, key, nested)?;
                    target.insert(key.clone(), nested_id);
                }
            }
        }
        Ok(())
    }

    /// Registers an inline dependency as its own synthetic definition.
    fn nested(&mut self, owner: &str, key: &str, raw: &RawDefinition) -> DiResult<String> {
        let nested_id = format!("{owner}/{key}");
        match raw {
            RawDefinition::Spec(reference) => Ok(reference.clone()),
            RawDefinition::WithDependencies(_, _) => self.normalize(&nested_id, raw),
            RawDefinition::Dependencies(deps) => {
                // Inline maps are built from the local key, not the synthetic id
                self.normalize(
                    &nested_id,
                    &RawDefinition::WithDependencies(key.to_string(), deps.clone()),
                )
            }
            RawDefinition::Custom([object]) => {
                let id = match &object.id {
                    Some(id) => id.clone(),
                    None => self.registry.next_anonymous_id(),
                };
                self.normalize(&id, raw)
            }
        }
    }
}
