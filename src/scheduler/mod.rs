//! Scheduler Driver contract: one plug-in per cluster orchestrator backend.
use std::collections::HashMap;

use crate::models::InstanceSnapshot;
use crate::Result;

pub mod factory;
pub mod file;

/// A single parameter in a driver's configuration parameter bag.
pub type Parameters = HashMap<String, serde_yaml::Value>;

/// Lists the instances of a single cluster.
///
/// Implementations must be safe to call concurrently with a prior call that
/// has already returned. A driver error on one poll is non-fatal to the
/// Updater: the owning cluster is simply skipped for that tick.
pub trait SchedulerDriver: Send + Sync {
    /// Stable identifier of the driver type (e.g. `"file"`, `"swarm"`).
    fn kind(&self) -> &str;

    /// Returns the current instance inventory of the cluster this driver serves.
    fn instances(&self) -> Result<Vec<InstanceSnapshot>>;
}

pub use self::factory::create;
pub use self::factory::register;
