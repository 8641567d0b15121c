//! Reference Scheduler Driver: reads a static instance list from a YAML file.
//!
//! Exists for tests and demos, and as the template a real Swarm/Kubernetes
//! driver would follow (see `original_source/agent/discovery/backends/file.rs`
//! for the shape this was grounded on: a small, self-contained backend that
//! re-reads its source on every call).
use std::fs::File;
use std::path::PathBuf;

use crate::errors::ErrorKind;
use crate::models::InstanceSnapshot;
use crate::scheduler::factory;
use crate::scheduler::Parameters;
use crate::scheduler::SchedulerDriver;
use crate::Result;
use crate::ResultExt;

const DRIVER_KIND: &str = "file";

/// Registers the `file` driver type with the global factory.
pub fn register() {
    factory::register(DRIVER_KIND, |params| {
        Ok(Box::new(FileDriver::from_parameters(params)?) as Box<dyn SchedulerDriver>)
    });
}

/// Reads `[InstanceSnapshot]` from a YAML document on disk.
///
/// The file is re-read on every `instances()` call, so editing it between
/// polls is a simple way to drive a cluster's inventory in tests or demos.
pub struct FileDriver {
    path: PathBuf,
}

impl FileDriver {
    pub fn new<P: Into<PathBuf>>(path: P) -> FileDriver {
        FileDriver { path: path.into() }
    }

    fn from_parameters(mut params: Parameters) -> Result<FileDriver> {
        let path = params
            .remove("path")
            .ok_or_else(|| ErrorKind::InvalidDriverParameters("missing required key 'path'".into()))?;
        let path: String = serde_yaml::from_value(path)
            .chain_err(|| ErrorKind::InvalidDriverParameters("'path' must be a string".into()))?;
        if !params.is_empty() {
            let unknown: Vec<String> = params.keys().cloned().collect();
            return Err(ErrorKind::InvalidDriverParameters(format!(
                "unknown keys: {}",
                unknown.join(", ")
            ))
            .into());
        }
        Ok(FileDriver::new(path))
    }
}

impl SchedulerDriver for FileDriver {
    fn kind(&self) -> &str {
        DRIVER_KIND
    }

    fn instances(&self) -> Result<Vec<InstanceSnapshot>> {
        let file = File::open(&self.path).chain_err(|| {
            format!("failed to open instance file {}", self.path.display())
        })?;
        let instances: Vec<InstanceSnapshot> = serde_yaml::from_reader(file).chain_err(|| {
            format!("failed to parse instance file {}", self.path.display())
        })?;
        Ok(instances)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::models::InstanceStatus;

    fn write_fixture(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().expect("create fixture file");
        file.write_all(contents.as_bytes()).expect("write fixture");
        file
    }

    #[test]
    fn reads_instances_from_yaml() {
        let file = write_fixture(
            "- id: a\n  image_name: svc\n  image_tag: v1\n  host: h1\n  container_name: svc_1\n  status: up\n",
        );
        let driver = FileDriver::new(file.path());
        let instances = driver.instances().expect("instances");
        assert_eq!(instances.len(), 1);
        assert_eq!(instances[0].id, "a");
        assert_eq!(instances[0].status, InstanceStatus::Up);
    }

    #[test]
    fn missing_file_is_an_error() {
        let driver = FileDriver::new("/no/such/file.yaml");
        assert!(driver.instances().is_err());
    }
}
