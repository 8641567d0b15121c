//! Structured logging configuration.
//!
//! Mirrors the teacher's own `logging.rs`: a small config struct picks a
//! drain and a level, both are layered on top of an `slog::Drain` chain,
//! and the resulting `Logger` is tagged with the build's git commit.
use std::io::stdout;
use std::sync::Mutex;

use slog::Drain;
use slog::IgnoreResult;
use slog::Logger;
use slog::Never;
use slog::SendSyncRefUnwindSafeDrain;
use slog::SendSyncUnwindSafeDrain;

use slog_async::Async;
#[cfg(feature = "journald")]
use slog_journald::JournaldDrain;
use slog_json::Json;

/// List of supported logging drains.
#[derive(Clone, Eq, PartialEq, Debug, Serialize, Deserialize)]
pub enum LoggingDrain {
    /// Log objects to systemd journal (journald).
    #[cfg(feature = "journald")]
    #[serde(rename = "journald")]
    Journald,

    /// Log JSON objects to standard output.
    #[serde(rename = "json")]
    Json,
}

impl Default for LoggingDrain {
    fn default() -> LoggingDrain {
        LoggingDrain::Json
    }
}

/// Possible logging levels.
#[derive(Clone, Eq, PartialEq, Debug, Serialize, Deserialize)]
pub enum LoggingLevel {
    #[serde(rename = "critical")]
    Critical,
    #[serde(rename = "error")]
    Error,
    #[serde(rename = "warning")]
    Warning,
    #[serde(rename = "info")]
    Info,
    #[serde(rename = "debug")]
    Debug,
}

impl Default for LoggingLevel {
    fn default() -> LoggingLevel {
        LoggingLevel::Info
    }
}

impl From<LoggingLevel> for ::slog::Level {
    fn from(level: LoggingLevel) -> Self {
        match level {
            LoggingLevel::Critical => ::slog::Level::Critical,
            LoggingLevel::Error => ::slog::Level::Error,
            LoggingLevel::Warning => ::slog::Level::Warning,
            LoggingLevel::Info => ::slog::Level::Info,
            LoggingLevel::Debug => ::slog::Level::Debug,
        }
    }
}

/// Logging configuration options.
#[derive(Clone, Eq, PartialEq, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Flush logs asynchronously.
    #[serde(default = "Config::default_async")]
    pub async_drain: bool,

    /// The drain to send logs to.
    #[serde(default)]
    pub drain: LoggingDrain,

    /// The minimum logging level.
    #[serde(default)]
    pub level: LoggingLevel,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            async_drain: Config::default_async(),
            drain: LoggingDrain::default(),
            level: LoggingLevel::default(),
        }
    }
}

impl Config {
    fn default_async() -> bool {
        true
    }
}

/// Alternative implementation of slog's `LevelFilter` with `Ok == ()`.
///
/// The default `LevelFilter` wraps `D::Ok` into an `Option`, which makes it
/// impossible to wrap a filtering drain into a `Logger`.
#[derive(Debug, Clone)]
pub struct LevelFilter<D: Drain>(pub D, pub ::slog::Level);

impl<D: Drain> Drain for LevelFilter<D> {
    type Ok = ();
    type Err = D::Err;
    fn log(
        &self,
        record: &::slog::Record,
        logger_values: &::slog::OwnedKVList,
    ) -> Result<Self::Ok, Self::Err> {
        if record.level().is_at_least(self.1) {
            self.0.log(record, logger_values)?;
        }
        Ok(())
    }
}

/// Converts a `Drain` into a `Logger`, tagging it with the build's version.
fn into_logger<D>(drain: D) -> Logger
where
    D: SendSyncUnwindSafeDrain<Ok = (), Err = Never>,
    D: 'static + SendSyncRefUnwindSafeDrain<Ok = (), Err = Never>,
{
    Logger::root(drain, o!("version" => env!("GIT_BUILD_HASH")))
}

/// Optionally wraps the drain into an `Async` drain.
fn config_async<D>(config: &Config, drain: D) -> Logger
where
    D: SendSyncUnwindSafeDrain<Ok = (), Err = Never>,
    D: 'static + SendSyncRefUnwindSafeDrain<Ok = (), Err = Never>,
{
    if config.async_drain {
        into_logger(Async::new(drain).build().ignore_res())
    } else {
        into_logger(drain)
    }
}

/// Configures the desired logging level.
fn config_level<D>(config: &Config, drain: D) -> Logger
where
    D: SendSyncUnwindSafeDrain<Ok = (), Err = Never>,
    D: 'static + SendSyncRefUnwindSafeDrain<Ok = (), Err = Never>,
{
    let drain = LevelFilter(drain, config.level.clone().into());
    config_async(config, drain)
}

/// Creates a `Logger` based on the given configuration.
pub fn configure(config: Config) -> Logger {
    match config.drain {
        #[cfg(feature = "journald")]
        LoggingDrain::Journald => config_level(&config, JournaldDrain.ignore_res()),
        LoggingDrain::Json => {
            let drain = Mutex::new(Json::default(stdout())).map(IgnoreResult::new);
            config_level(&config, drain)
        }
    }
}

/// Creates a fixed `Logger` to be used until configuration is loaded.
pub fn starter() -> Logger {
    let drain = Mutex::new(Json::default(stdout())).map(IgnoreResult::new);
    into_logger(drain)
}
