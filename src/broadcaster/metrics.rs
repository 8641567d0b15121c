use prometheus::CounterVec;
use prometheus::Opts;
use prometheus::Registry;

use slog::Logger;

lazy_static! {
    /// Counter of notify attempts per notifier, labeled by outcome
    /// (success, error, exhausted).
    pub static ref NOTIFY_OUTCOMES: CounterVec = CounterVec::new(
        Opts::new(
            "fleetwatch_broadcaster_notify_outcomes",
            "Number of notify attempts per notifier, by outcome"
        ),
        &["notifier_id", "outcome"],
    ).expect("failed to create NOTIFY_OUTCOMES counter");
}

/// Attempts to register the broadcaster's metrics with the registry.
///
/// Metrics that fail to register are logged and ignored.
pub fn register_metrics(logger: &Logger, registry: &Registry) {
    if let Err(err) = registry.register(Box::new(NOTIFY_OUTCOMES.clone())) {
        debug!(logger, "Failed to register NOTIFY_OUTCOMES"; "error" => format!("{:?}", err));
    }
}
