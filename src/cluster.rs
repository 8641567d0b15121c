//! Pairs a cluster id with the Scheduler Driver that serves it.
use serde_derive::Deserialize;
use serde_derive::Serialize;

use crate::errors::ErrorKind;
use crate::scheduler;
use crate::scheduler::Parameters;
use crate::scheduler::SchedulerDriver;
use crate::Result;
use crate::ResultExt;

/// Driver selection + parameter bag for one cluster.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DriverConfig {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub params: Parameters,
}

/// Configuration of one cluster entry.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClusterConfig {
    #[serde(default)]
    pub disabled: bool,
    pub driver: DriverConfig,
}

/// One container-orchestrator endpoint plus its id.
///
/// A disabled cluster is never instantiated: `new_cluster` returns
/// `ErrorKind::ClusterDisabled` instead, which callers are expected to
/// downgrade to a warning and skip.
pub struct Cluster {
    id: String,
    scheduler: Box<dyn SchedulerDriver>,
}

impl Cluster {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn scheduler(&self) -> &dyn SchedulerDriver {
        self.scheduler.as_ref()
    }

    /// Builds a `Cluster` directly from a driver, bypassing the factory.
    /// Used by other modules' tests to wire in scripted drivers.
    #[cfg(test)]
    pub fn for_tests(id: &str, scheduler: Box<dyn SchedulerDriver>) -> Cluster {
        Cluster {
            id: id.to_string(),
            scheduler,
        }
    }
}

/// Builds a `Cluster` from its id and configuration.
pub fn new_cluster(id: &str, config: ClusterConfig) -> Result<Cluster> {
    if config.disabled {
        return Err(ErrorKind::ClusterDisabled(id.to_string()).into());
    }
    let driver = scheduler::create(&config.driver.kind, config.driver.params)
        .chain_err(|| ErrorKind::ClusterConfig(id.to_string(), "driver construction failed".into()))?;
    Ok(Cluster {
        id: id.to_string(),
        scheduler: driver,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use std::collections::HashMap;

    #[test]
    fn disabled_cluster_is_rejected() {
        let config = ClusterConfig {
            disabled: true,
            driver: DriverConfig {
                kind: "file".into(),
                params: HashMap::new(),
            },
        };
        match new_cluster("wdc", config) {
            Err(Error(ErrorKind::ClusterDisabled(id), _)) => assert_eq!(id, "wdc"),
            other => panic!("expected ClusterDisabled, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn unknown_driver_type_is_a_config_error() {
        let config = ClusterConfig {
            disabled: false,
            driver: DriverConfig {
                kind: "does-not-exist".into(),
                params: HashMap::new(),
            },
        };
        assert!(new_cluster("wdc", config).is_err());
    }
}
