#[macro_use]
extern crate error_chain;
#[macro_use]
extern crate slog;
#[macro_use]
extern crate serde_derive;
#[macro_use]
extern crate lazy_static;

pub mod broadcaster;
pub mod cluster;
pub mod config;
pub mod criteria;
pub mod errors;
pub mod logging;
pub mod manager;
pub mod models;
pub mod registry;
pub mod scheduler;
pub mod updater;

pub use self::errors::Error;
pub use self::errors::ErrorKind;
pub use self::errors::Result;
pub use self::errors::ResultExt;
pub use self::registry::AppContext;
