//! Circular dependency detection infrastructure.

use crate::error::{DiError, DiResult};

const MAX_DEPTH: usize = 1024;

/// Definition ids currently being resolved, outermost first.
///
/// Carried explicitly through the resolution instead of living in
/// thread-local state, since deferred resolutions hop between polls.
#[derive(Debug, Clone, Default)]
pub(crate) struct ResolutionPath {
    stack: Vec<String>,
}

impl ResolutionPath {
    /// Returns the path extended with `id`.
    ///
    /// Fails with the complete cycle when `id` is already on the path,
    /// e.g. `["a", "b", "a"]`.
    pub(crate) fn enter(&self, id: &str) -> DiResult<ResolutionPath> {
        if self.stack.iter().any(|entered| entered == id) {
            let mut path = self.stack.clone();
            path.push(id.to_string());
            return Err(DiError::Circular(path));
        }
        if self.stack.len() >= MAX_DEPTH {
            return Err(DiError::DepthExceeded(self.stack.len()));
        }
        let mut next = self.clone();
        next.stack.push(id.to_string());
        Ok(next)
    }
}
