//! The Notifier plug-in contract and its name-keyed factory.
//!
//! Grounded on `original_source/notification/notification.go` (the
//! `Notification` interface) and `original_source/notification/factory/
//! factory.go` (name -> constructor registry, fatal on duplicate
//! registration), mirrored on `scheduler::factory`'s registry shape.
use std::collections::HashMap;
use std::sync::Mutex;

use crate::errors::ErrorKind;
use crate::scheduler::Parameters;
use crate::Result;

/// An external sink for breach notifications.
pub trait Notifier: Send + Sync {
    fn id(&self) -> &str;
    fn notify(&self, payload: &[u8]) -> Result<()>;
}

type Constructor = dyn Fn(String, Parameters) -> Result<Box<dyn Notifier>> + Send + Sync;

lazy_static! {
    static ref FACTORIES: Mutex<HashMap<String, Box<Constructor>>> = Mutex::new(HashMap::new());
}

/// Registers a constructor under `kind`. Panics if `kind` is already
/// registered: this only happens at boot, wiring together built-in
/// notifier kinds, and a collision there is a programming error.
pub fn register<F>(kind: &str, constructor: F)
where
    F: Fn(String, Parameters) -> Result<Box<dyn Notifier>> + Send + Sync + 'static,
{
    let mut factories = FACTORIES.lock().expect("notifier factory lock poisoned");
    if factories.contains_key(kind) {
        panic!("notifier kind '{}' registered twice", kind);
    }
    factories.insert(kind.to_string(), Box::new(constructor));
}

/// Builds a Notifier by kind, id, and its parameter bag.
pub fn create(kind: &str, id: String, parameters: Parameters) -> Result<Box<dyn Notifier>> {
    let factories = FACTORIES.lock().expect("notifier factory lock poisoned");
    match factories.get(kind) {
        Some(constructor) => constructor(id, parameters),
        None => Err(ErrorKind::InvalidNotification(kind.to_string()).into()),
    }
}

/// Registers every notifier kind shipped with this crate.
pub fn register_builtins() {
    super::http_notifier::register();
    super::email_notifier::register();
}
