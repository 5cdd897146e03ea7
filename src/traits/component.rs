//! Optional instance capabilities.

use crate::instance::{Dependencies, Instance};
use crate::params::Params;
use crate::resolution::Resolution;

/// Result of invoking an update method.
///
/// `None` means the update was a no-op. `Some` carries the returned value:
/// when it has the same concrete type as the current instance the update is
/// treated as an in-place mutation and the current instance is kept; a value
/// of a different type supersedes the current instance.
pub type UpdateOutcome = Resolution<Option<Instance>>;

/// Capabilities an instance may expose to the container.
///
/// Every method has a default that stands for "capability absent". Absence
/// never fails a resolution, it only selects a different branch: no update
/// method means the cached instance is returned as-is, no validity check
/// means the instance is always valid, no destroy hook means reclaiming only
/// drops the container's reference.
///
/// # Examples
///
/// ```
/// use rewire::{Component, Dependencies, Params, UpdateOutcome, Resolution};
/// use parking_lot::Mutex;
///
/// struct Counter {
///     refreshed: Mutex<u32>,
/// }
///
/// impl Component for Counter {
///     fn update(&self, method: &str, _deps: &Dependencies) -> Option<UpdateOutcome> {
///         match method {
///             "update" => {
///                 *self.refreshed.lock() += 1;
///                 Some(Resolution::ok(None))
///             }
///             _ => None,
///         }
///     }
///
///     fn is_valid(&self, params: &Params) -> bool {
///         params.get("locale").map_or(true, |locale| locale == "en")
///     }
/// }
/// ```
pub trait Component: Send + Sync + 'static {
    /// Refreshes the instance with a freshly resolved dependency map.
    ///
    /// Returns `None` when the instance has no method called `method`.
    fn update(&self, _method: &str, _deps: &Dependencies) -> Option<UpdateOutcome> {
        None
    }

    /// Tells whether the cached instance may be reused under `params`.
    fn is_valid(&self, _params: &Params) -> bool {
        true
    }

    /// Notification sent right before the container reclaims the instance.
    fn will_destroy(&self) {}

    /// Releases resources held by the instance.
    fn destroy(&self) {}

    /// Plain-data snapshot of the instance state.
    fn serialize(&self) -> Option<serde_json::Value> {
        None
    }
}
