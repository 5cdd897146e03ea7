//! The definition registry owned by each container.

use std::collections::{BTreeMap, BTreeSet};

use crate::definition::Definition;
use crate::instance::{Instance, InstanceSlot};
use crate::params::SessionId;

/// Definitions plus the bookkeeping that goes with them.
///
/// One registry per container (and per clone); there is no global state.
#[derive(Debug, Clone, Default)]
pub(crate) struct Registry {
    definitions: BTreeMap<String, Definition>,
    next_anonymous: u64,
    next_session: u64,
    open_sessions: BTreeSet<SessionId>,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn contains(&self, id: &str) -> bool {
        self.definitions.contains_key(id)
    }

    pub(crate) fn get(&self, id: &str) -> Option<&Definition> {
        self.definitions.get(id)
    }

    pub(crate) fn get_mut(&mut self, id: &str) -> Option<&mut Definition> {
        self.definitions.get_mut(id)
    }

    pub(crate) fn insert(&mut self, definition: Definition) {
        self.definitions.insert(definition.id.clone(), definition);
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (&String, &Definition)> {
        self.definitions.iter()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = (&String, &mut Definition)> {
        self.definitions.iter_mut()
    }

    pub(crate) fn definitions(&self) -> &BTreeMap<String, Definition> {
        &self.definitions
    }

    /// Id for an inline definition that has no stable path.
    pub(crate) fn next_anonymous_id(&mut self) -> String {
        self.next_anonymous += 1;
        format!("anonymous#{}", self.next_anonymous)
    }

    /// Allocates and opens a new session.
    pub(crate) fn open_session(&mut self) -> SessionId {
        self.next_session += 1;
        let id = SessionId(self.next_session);
        self.open_sessions.insert(id);
        id
    }

    /// Closes a session; returns `false` if it was not open.
    pub(crate) fn close_session(&mut self, id: SessionId) -> bool {
        self.open_sessions.remove(&id)
    }

    /// Closes `closing` and takes every instance it leaves behind.
    ///
    /// An instance is swept when it was last touched by a session that is
    /// neither `closing` nor still open. Persistent and in-flight definitions
    /// are skipped. Superseded instances go when their session is gone.
    pub(crate) fn sweep(&mut self, closing: SessionId) -> Vec<Instance> {
        self.open_sessions.remove(&closing);
        let open = &self.open_sessions;
        let gone = |session: SessionId| !session.is_root() && !open.contains(&session);

        let mut reclaimed = Vec::new();
        for definition in self.definitions.values_mut() {
            let (stale, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut definition.retired)
                .into_iter()
                .partition(|(session, _)| *session == closing || gone(*session));
            definition.retired = kept;
            reclaimed.extend(stale.into_iter().map(|(_, instance)| instance));

            if definition.is_persistent || definition.is_resolving() {
                continue;
            }
            let Some(session) = definition.session_id else {
                continue;
            };
            if session == closing || !gone(session) {
                continue;
            }
            if matches!(definition.instance, InstanceSlot::Live(_)) {
                if let InstanceSlot::Live(instance) =
                    std::mem::replace(&mut definition.instance, InstanceSlot::Destroyed)
                {
                    reclaimed.push(instance);
                }
            }
        }
        reclaimed
    }

    /// Deep copy for an independent container.
    pub(crate) fn fork(&self, keep_instances: bool) -> Registry {
        let definitions = self
            .definitions
            .iter()
            .map(|(id, definition)| {
                let copy = if keep_instances {
                    let mut copy = definition.clone();
                    copy.inflight = None;
                    if copy.session_id.is_some() {
                        // Sessions of the source container mean nothing here
                        copy.session_id = Some(SessionId::ROOT);
                    }
                    copy
                } else {
                    definition.reset()
                };
                (id.clone(), copy)
            })
            .collect();
        Registry {
            definitions,
            next_anonymous: self.next_anonymous,
            next_session: self.next_session,
            open_sessions: BTreeSet::new(),
        }
    }
}
