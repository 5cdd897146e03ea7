//! Scoped resolution sessions.

use tracing::{debug, warn};

use super::Container;
use crate::params::{Params, SessionId};
use crate::traits::Resolve;

/// A resolution scope with its own session id and default parameters.
///
/// A session resolves exactly like the container it came from. Closing it
/// reclaims every instance left behind by sessions that are already gone,
/// keeping whatever this session touched.
///
/// # Examples
///
/// ```
/// use rewire::{Container, Component, Dependencies, Module, Params, Resolve, StaticResolver};
///
/// struct Request;
/// impl Component for Request {}
///
/// let container = Container::builder()
///     .resolver(StaticResolver::new()
///         .with("Request", Module::new("Request").constructor(|_: &Dependencies| Ok(Request))))
///     .build()
///     .unwrap();
///
/// let session = container.session_with(&Params::new().with("user", "alice"));
/// assert_eq!(session.params().get("user").unwrap(), "alice");
/// let request = session.get("Request").into_ready("Request").unwrap();
/// assert!(request.downcast::<Request>().is_some());
/// session.close();
/// ```
pub struct Session {
    container: Container,
    params: Params,
    closed: bool,
}

impl Session {
    /// Opens a fresh session on `container` with `defaults` merged into
    /// every resolution.
    pub(crate) fn open(container: Container, defaults: Params) -> Session {
        let id = container.inner().registry.lock().open_session();
        debug!(session = %id, "session opened");
        Session {
            container,
            params: defaults.with_session(id),
            closed: false,
        }
    }

    /// This session's id.
    pub fn id(&self) -> SessionId {
        self.params.session_id()
    }

    /// Closes the session and reclaims what it left behind.
    ///
    /// Returns the number of instances destroyed.
    pub fn close(mut self) -> usize {
        self.closed = true;
        let id = self.id();
        let reclaimed = self.container.inner().registry.lock().sweep(id);
        for instance in &reclaimed {
            debug!(session = %id, instance = instance.type_name(), "reclaiming instance");
            instance.reclaim();
        }
        debug!(session = %id, reclaimed = reclaimed.len(), "session closed");
        reclaimed.len()
    }
}

impl Resolve for Session {
    fn container(&self) -> &Container {
        &self.container
    }

    fn params(&self) -> &Params {
        &self.params
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        let id = self.id();
        self.container.inner().registry.lock().close_session(id);
        warn!(session = %id, "session dropped without close(), nothing was reclaimed");
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id())
            .field("params", &self.params)
            .finish()
    }
}
