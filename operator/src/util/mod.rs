use std::time::Duration;

pub mod metrics;
pub mod patch;

pub(crate) mod colors;
pub(crate) mod messages;

mod error;

pub use error::*;

/// The default interval for requeuing a managed resource once it has
/// converged (§4.12 notwithstanding — this is the steady-state poll, not
/// the per-tick deadline).
pub(crate) const PROBE_INTERVAL: Duration = Duration::from_secs(30);

/// Name of the kubernetes resource manager.
pub(crate) const MANAGER_NAME: &str = "hub-operator";

/// Fixed TCP port the gimulator Service/Pod listen on, per §4.1/§6.
pub const GIMULATOR_PORT: u16 = 23579;
