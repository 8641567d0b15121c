//! Name -> constructor registry for Scheduler Drivers.
//!
//! Mirrors the original `notification/factory` pattern: a driver
//! implementation registers itself under a name (usually from a module
//! `init`-style call at startup) and `create` resolves that name plus a
//! parameter bag into a boxed driver.
use std::collections::HashMap;
use std::sync::Mutex;

use crate::errors::ErrorKind;
use crate::scheduler::Parameters;
use crate::scheduler::SchedulerDriver;
use crate::Result;

type Constructor = dyn Fn(Parameters) -> Result<Box<dyn SchedulerDriver>> + Send + Sync;

lazy_static! {
    static ref FACTORIES: Mutex<HashMap<String, Box<Constructor>>> = Mutex::new(HashMap::new());
}

/// Registers a driver type under `name`.
///
/// Registering the same name twice is a configuration-time programming
/// error and panics, exactly as the original `factory.Register` calls
/// `util.Log.Fatalf` on a duplicate.
pub fn register<F>(name: &str, constructor: F)
where
    F: Fn(Parameters) -> Result<Box<dyn SchedulerDriver>> + Send + Sync + 'static,
{
    let mut factories = FACTORIES.lock().expect("scheduler factory lock poisoned");
    if factories.contains_key(name) {
        panic!("driver type already registered: {}", name);
    }
    factories.insert(name.to_string(), Box::new(constructor));
}

/// Builds a driver of type `name` from a parameter bag.
///
/// Returns `ErrorKind::InvalidDriver` if no driver was registered under
/// `name`.
pub fn create(name: &str, parameters: Parameters) -> Result<Box<dyn SchedulerDriver>> {
    let factories = FACTORIES.lock().expect("scheduler factory lock poisoned");
    let constructor = factories
        .get(name)
        .ok_or_else(|| ErrorKind::InvalidDriver(name.to_string()))?;
    constructor(parameters)
}

/// Registers the drivers shipped with this crate.
///
/// Idempotent within a process: calling it more than once would panic (see
/// `register`), so callers should invoke it exactly once, typically from
/// `main` before loading configuration.
pub fn register_builtins() {
    super::file::register();
}
