use prometheus::Counter;
use prometheus::Histogram;
use prometheus::HistogramOpts;
use prometheus::Opts;
use prometheus::Registry;

use slog::Logger;

lazy_static! {
    /// Counter for updater poll cycles started.
    pub static ref POLL_COUNT: Counter = Counter::with_opts(
        Opts::new("fleetwatch_updater_polls", "Number of poll cycles started")
    ).expect("failed to create POLL_COUNT counter");

    /// Counter for clusters whose driver returned an error during a poll.
    pub static ref POLL_CLUSTER_ERRORS: Counter = Counter::with_opts(
        Opts::new(
            "fleetwatch_updater_cluster_errors",
            "Number of per-cluster driver errors observed during polling"
        )
    ).expect("failed to create POLL_CLUSTER_ERRORS counter");

    /// Observes the duration of one poll cycle across all clusters.
    pub static ref POLL_DURATION: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "fleetwatch_updater_poll_duration",
            "Duration (in seconds) of one updater poll cycle"
        ).buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0])
    ).expect("failed to create POLL_DURATION histogram");
}

/// Attempts to register the updater's metrics with the registry.
///
/// Metrics that fail to register are logged and ignored.
pub fn register_metrics(logger: &Logger, registry: &Registry) {
    if let Err(err) = registry.register(Box::new(POLL_COUNT.clone())) {
        debug!(logger, "Failed to register POLL_COUNT"; "error" => format!("{:?}", err));
    }
    if let Err(err) = registry.register(Box::new(POLL_CLUSTER_ERRORS.clone())) {
        debug!(logger, "Failed to register POLL_CLUSTER_ERRORS"; "error" => format!("{:?}", err));
    }
    if let Err(err) = registry.register(Box::new(POLL_DURATION.clone())) {
        debug!(logger, "Failed to register POLL_DURATION"; "error" => format!("{:?}", err));
    }
}
