use prometheus::Counter;
use prometheus::CounterVec;
use prometheus::Opts;
use prometheus::Registry;

use slog::Logger;

lazy_static! {
    /// Counter for check-chain evaluations across all managers.
    pub static ref CHECK_COUNT: Counter = Counter::with_opts(
        Opts::new("fleetwatch_manager_checks", "Number of check-chain evaluations run")
    ).expect("failed to create CHECK_COUNT counter");

    /// Counter for threshold-crossing breaches, labeled by manager id.
    pub static ref BREACH_COUNT: CounterVec = CounterVec::new(
        Opts::new(
            "fleetwatch_manager_breaches",
            "Number of times a manager's consecutive-failure threshold was crossed"
        ),
        &["manager_id"],
    ).expect("failed to create BREACH_COUNT counter");
}

/// Attempts to register the manager's metrics with the registry.
///
/// Metrics that fail to register are logged and ignored.
pub fn register_metrics(logger: &Logger, registry: &Registry) {
    if let Err(err) = registry.register(Box::new(CHECK_COUNT.clone())) {
        debug!(logger, "Failed to register CHECK_COUNT"; "error" => format!("{:?}", err));
    }
    if let Err(err) = registry.register(Box::new(BREACH_COUNT.clone())) {
        debug!(logger, "Failed to register BREACH_COUNT"; "error" => format!("{:?}", err));
    }
}
