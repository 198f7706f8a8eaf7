//! Sub-reconcilers and top-level controller for the `Room` resource
//! (C4–C7, §4.4–§4.7).

pub mod actor;
pub mod director;
pub mod gimulator;
pub mod pods;
pub mod reconcile;

pub use reconcile::run;
