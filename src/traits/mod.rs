//! Core traits for the dependency injection container.

mod component;
mod resolve;

pub use component::{Component, UpdateOutcome};
pub use resolve::Resolve;
