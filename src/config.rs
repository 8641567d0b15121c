//! Top-level configuration: logging, clusters, notifiers, the broadcaster's
//! retry policy, and the updater's poll interval.
//!
//! Grounded on the teacher's `src/config.rs` (`from_file`/`from_reader`
//! over `serde_yaml`, the `from_reader_error`/`from_reader_ok` test shape),
//! generalized from an empty placeholder struct to the full document this
//! crate actually needs.
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Duration;

use serde_derive::Deserialize;
use serde_derive::Serialize;

use crate::broadcaster::RetryPolicy;
use crate::cluster::ClusterConfig;
use crate::logging;
use crate::scheduler::Parameters;
use crate::Result;

fn default_discovery_interval_secs() -> u64 {
    30
}

/// Driver selection + parameter bag for one configured notifier.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NotifierConfig {
    #[serde(default)]
    pub disabled: bool,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub params: Parameters,
}

/// Retry policy as read from configuration; `0` fields fall back to
/// `RetryPolicy`'s defaults (see `RetryPolicy::new`).
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BroadcasterConfig {
    #[serde(default)]
    pub attempts_on_error: u32,
    #[serde(default)]
    pub wait_on_error_secs: u64,
    #[serde(default)]
    pub wait_after_attempts_secs: u64,
}

impl Default for BroadcasterConfig {
    fn default() -> BroadcasterConfig {
        BroadcasterConfig {
            attempts_on_error: 0,
            wait_on_error_secs: 0,
            wait_after_attempts_secs: 0,
        }
    }
}

impl BroadcasterConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.attempts_on_error,
            Duration::from_secs(self.wait_on_error_secs),
            Duration::from_secs(self.wait_after_attempts_secs),
        )
    }
}

/// The Updater's polling cadence.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DiscoveryConfig {
    #[serde(default = "default_discovery_interval_secs")]
    pub interval_secs: u64,
}

impl Default for DiscoveryConfig {
    fn default() -> DiscoveryConfig {
        DiscoveryConfig {
            interval_secs: default_discovery_interval_secs(),
        }
    }
}

impl DiscoveryConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

/// The full on-disk configuration document.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub logging: logging::Config,

    #[serde(default)]
    pub clusters: HashMap<String, ClusterConfig>,

    #[serde(default)]
    pub notifiers: HashMap<String, NotifierConfig>,

    #[serde(default)]
    pub broadcaster: BroadcasterConfig,

    #[serde(default)]
    pub discovery: DiscoveryConfig,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            logging: logging::Config::default(),
            clusters: HashMap::new(),
            notifiers: HashMap::new(),
            broadcaster: BroadcasterConfig::default(),
            discovery: DiscoveryConfig::default(),
        }
    }
}

impl Config {
    /// Loads the configuration from the given `std::fs::File` path.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Config> {
        let file = File::open(path)?;
        Config::from_reader(file)
    }

    /// Loads the configuration from any `std::io::Read`.
    pub fn from_reader<R: Read>(reader: R) -> Result<Config> {
        let config = serde_yaml::from_reader(reader)?;
        Ok(config)
    }
}
