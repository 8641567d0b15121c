//! Service Updater: polls clusters, reconciles a unified instance view, and
//! fans filtered change sets out to subscribers.
//!
//! Grounded on `original_source/monitor/service_updater.go`
//! (`checkClusterServices`'s tentative-removal-then-reconcile shape,
//! `Register`'s immediate synchronous delivery to late joiners) combined
//! with the Rust threading idiom of the teacher's own
//! `src/components/discovery.rs` (`ThreadBuilder` + `sleep(interval)` loop).
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::Mutex;
use std::thread::Builder as ThreadBuilder;
use std::time::Duration;

use chrono::DateTime;
use chrono::Utc;
use slog::Logger;

use crate::cluster::Cluster;
use crate::criteria::ChangeSet;
use crate::criteria::Criterion;
use crate::errors::ErrorKind;
use crate::models::InstanceSnapshot;
use crate::Result;

pub mod metrics;

/// Classification of an Observed Instance as of the last poll tick.
///
/// `Updating` is an intermediate bookkeeping state set at the start of a
/// tick and resolved by its end; it must never be visible to a subscriber.
#[derive(Clone, Copy, Eq, PartialEq, Debug)]
pub enum LastAction {
    Added,
    Updated,
    Unchanged,
    Removed,
    Updating,
}

/// Updater-owned record wrapping one Instance Snapshot with its classification.
#[derive(Clone, Debug)]
pub struct ObservedInstance {
    pub registered_at: DateTime<Utc>,
    pub last_update: DateTime<Utc>,
    pub last_action: LastAction,
    pub cluster_id: String,
    pub snapshot: InstanceSnapshot,
}

/// A registered consumer of filtered change sets.
///
/// Implementations must tolerate being called from the Updater's poll
/// thread; a panicking `update` is caught and logged, not propagated.
pub trait Subscriber: Send + Sync {
    fn id(&self) -> &str;
    fn update(&self, change_set: ChangeSet);
}

struct SubscriberRecord {
    criterion: Criterion,
    subscriber: Arc<dyn Subscriber>,
}

/// Polls every configured Cluster on a fixed interval and reconciles a
/// single unified view of observed instances, delivered to subscribers
/// under their registered Criterion.
pub struct ServiceUpdater {
    logger: Logger,
    interval: Duration,
    clusters: Vec<Arc<Cluster>>,
    observed: Mutex<HashMap<String, ObservedInstance>>,
    subscribers: Mutex<HashMap<String, SubscriberRecord>>,
}

impl ServiceUpdater {
    /// Builds an updater over the given clusters.
    ///
    /// Fails with `ErrorKind::NoClusters` if `clusters` is empty: at least
    /// one cluster must survive configuration for the updater to have
    /// anything to poll.
    pub fn new(
        logger: Logger,
        clusters: Vec<Arc<Cluster>>,
        interval: Duration,
    ) -> Result<Arc<ServiceUpdater>> {
        if clusters.is_empty() {
            return Err(ErrorKind::NoClusters.into());
        }
        Ok(Arc::new(ServiceUpdater {
            logger,
            interval,
            clusters,
            observed: Mutex::new(HashMap::new()),
            subscribers: Mutex::new(HashMap::new()),
        }))
    }

    /// Registers a subscriber under a Criterion.
    ///
    /// Idempotent on `subscriber.id()`. On first registration the current
    /// observed-instance map is evaluated against `criterion` and, if
    /// non-empty, delivered synchronously so a late-joining subscriber
    /// recovers state without waiting a tick.
    pub fn register(&self, subscriber: Arc<dyn Subscriber>, criterion: Criterion) {
        let id = subscriber.id().to_string();
        {
            let mut subscribers = self.subscribers.lock().expect("subscribers lock poisoned");
            if subscribers.contains_key(&id) {
                return;
            }
            subscribers.insert(
                id.clone(),
                SubscriberRecord {
                    criterion,
                    subscriber,
                },
            );
            info!(self.logger, "subscriber registered"; "subscriber" => &id);
        }

        let current = {
            let observed = self.observed.lock().expect("observed lock poisoned");
            observed.clone()
        };
        let subscribers = self.subscribers.lock().expect("subscribers lock poisoned");
        if let Some(record) = subscribers.get(&id) {
            let filtered = record.criterion.matches(&current);
            if !filtered.is_empty() {
                record.subscriber.update(filtered);
            }
        }
    }

    /// Removes a subscriber by id; a no-op if it was not registered.
    pub fn remove(&self, subscriber_id: &str) {
        let mut subscribers = self.subscribers.lock().expect("subscribers lock poisoned");
        if subscribers.remove(subscriber_id).is_some() {
            info!(self.logger, "subscriber removed"; "subscriber" => subscriber_id);
        }
    }

    /// Spawns the background polling task. Non-blocking.
    pub fn monitor(self: &Arc<Self>) {
        let updater = Arc::clone(self);
        let logger = self.logger.clone();
        let interval = self.interval;
        let spawned = ThreadBuilder::new()
            .name("service-updater".into())
            .spawn(move || loop {
                updater.tick();
                std::thread::sleep(interval);
            });
        if let Err(err) = spawned {
            error!(logger, "failed to spawn service updater thread"; "error" => err.to_string());
        }
    }

    /// Runs one poll-diff-deliver cycle. Exposed for tests; `monitor` is the
    /// production entry point.
    pub fn tick(&self) {
        metrics::POLL_COUNT.inc();
        let timer = metrics::POLL_DURATION.start_timer();
        let change_set = self.reconcile();
        timer.observe_duration();
        if !change_set.is_empty() {
            self.notify_subscribers(&change_set);
        }
    }

    /// Polls every cluster once and returns the resulting change set.
    ///
    /// Holds the observed-state lock for the whole pass, matching the
    /// original's single `updateServicesMux` critical section spanning all
    /// clusters of one tick.
    fn reconcile(&self) -> ChangeSet {
        let mut change_set: ChangeSet = HashMap::new();
        let mut observed = self.observed.lock().expect("observed lock poisoned");

        for cluster in &self.clusters {
            let cluster_id = cluster.id();

            // Removed entries have already been delivered once; prune them
            // now so a reappearance later is treated as a fresh Added.
            let stale: Vec<String> = observed
                .iter()
                .filter(|(_, o)| o.cluster_id == cluster_id && o.last_action == LastAction::Removed)
                .map(|(id, _)| id.clone())
                .collect();
            for id in stale {
                observed.remove(&id);
            }

            // Step 1: tentatively mark this cluster's live entries.
            for instance in observed.values_mut() {
                if instance.cluster_id == cluster_id && instance.last_action != LastAction::Removed {
                    instance.last_action = LastAction::Updating;
                    instance.last_update = Utc::now();
                }
            }

            // Step 2: poll the driver. A failure leaves the tentative marks
            // in place; they are re-examined next tick, not downgraded to
            // Removed, to avoid flapping during transient outages.
            let snapshots = match cluster.scheduler().instances() {
                Ok(snapshots) => snapshots,
                Err(err) => {
                    metrics::POLL_CLUSTER_ERRORS.inc();
                    warn!(
                        self.logger, "cluster poll failed";
                        "cluster" => cluster_id, "error" => err.to_string(),
                    );
                    continue;
                }
            };

            // Step 3: reconcile this cluster's snapshots against stored state.
            for snapshot in snapshots {
                match observed.get_mut(&snapshot.id) {
                    None => {
                        let instance = ObservedInstance {
                            registered_at: Utc::now(),
                            last_update: Utc::now(),
                            last_action: LastAction::Added,
                            cluster_id: cluster_id.to_string(),
                            snapshot: snapshot.clone(),
                        };
                        change_set.insert(snapshot.id.clone(), instance.clone());
                        observed.insert(snapshot.id.clone(), instance);
                    }
                    Some(existing) => {
                        existing.last_update = Utc::now();
                        if existing.snapshot == snapshot {
                            existing.last_action = LastAction::Unchanged;
                            change_set.remove(&snapshot.id);
                        } else {
                            existing.snapshot = snapshot;
                            existing.last_action = LastAction::Updated;
                            change_set.insert(existing.snapshot.id.clone(), existing.clone());
                        }
                    }
                }
            }

            // Step 4: anything still Updating for this cluster is now absent.
            for (id, instance) in observed.iter_mut() {
                if instance.cluster_id == cluster_id && instance.last_action == LastAction::Updating {
                    instance.last_action = LastAction::Removed;
                    instance.last_update = Utc::now();
                    change_set.insert(id.clone(), instance.clone());
                }
            }
        }

        change_set
    }

    /// Delivers `change_set`, filtered per subscriber, sequentially.
    ///
    /// A panicking subscriber is caught and logged; it does not take down
    /// the poll loop or block delivery to the remaining subscribers.
    fn notify_subscribers(&self, change_set: &ChangeSet) {
        let subscribers = self.subscribers.lock().expect("subscribers lock poisoned");
        for record in subscribers.values() {
            let filtered = record.criterion.matches(change_set);
            if filtered.is_empty() {
                continue;
            }
            let subscriber = Arc::clone(&record.subscriber);
            let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| {
                subscriber.update(filtered);
            }));
            if outcome.is_err() {
                error!(
                    self.logger, "subscriber panicked while handling update";
                    "subscriber" => record.subscriber.id(),
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::InstanceStatus;
    use crate::scheduler::SchedulerDriver;
    use std::sync::Mutex as StdMutex;

    struct ScriptedDriver {
        ticks: StdMutex<std::vec::IntoIter<Result<Vec<InstanceSnapshot>>>>,
    }

    impl ScriptedDriver {
        fn new(ticks: Vec<Result<Vec<InstanceSnapshot>>>) -> ScriptedDriver {
            ScriptedDriver {
                ticks: StdMutex::new(ticks.into_iter()),
            }
        }
    }

    impl SchedulerDriver for ScriptedDriver {
        fn kind(&self) -> &str {
            "scripted"
        }

        fn instances(&self) -> Result<Vec<InstanceSnapshot>> {
            let mut ticks = self.ticks.lock().unwrap();
            ticks.next().unwrap_or(Ok(Vec::new()))
        }
    }

    fn snapshot(id: &str, status: InstanceStatus) -> InstanceSnapshot {
        InstanceSnapshot {
            id: id.into(),
            image_name: "svc".into(),
            image_tag: "v1".into(),
            host: "h1".into(),
            container_name: format!("{}_1", id),
            status,
        }
    }

    fn updater_with_driver(ticks: Vec<Result<Vec<InstanceSnapshot>>>) -> Arc<ServiceUpdater> {
        let driver = Box::new(ScriptedDriver::new(ticks));
        let cluster = Arc::new(unsafe_cluster_for_tests("wdc", driver));
        ServiceUpdater::new(crate::logging::starter(), vec![cluster], Duration::from_secs(3600))
            .expect("updater")
    }

    // `Cluster` has no public constructor outside `new_cluster` (which goes
    // through the driver factory); tests build one directly via this crate-
    // visible helper instead of registering a scripted driver with the
    // global factory.
    fn unsafe_cluster_for_tests(id: &str, driver: Box<dyn SchedulerDriver>) -> Cluster {
        Cluster::for_tests(id, driver)
    }

    struct RecordingSubscriber {
        id: String,
        received: StdMutex<Vec<ChangeSet>>,
    }

    impl Subscriber for RecordingSubscriber {
        fn id(&self) -> &str {
            &self.id
        }

        fn update(&self, change_set: ChangeSet) {
            self.received.lock().unwrap().push(change_set);
        }
    }

    #[test]
    fn s1_single_cluster_add_is_delivered() {
        let updater = updater_with_driver(vec![Ok(vec![snapshot("a", InstanceStatus::Up)])]);
        let subscriber = Arc::new(RecordingSubscriber {
            id: "sub".into(),
            received: StdMutex::new(Vec::new()),
        });
        updater.register(subscriber.clone(), Criterion::InStatus(LastAction::Added));
        updater.tick();
        let received = subscriber.received.lock().unwrap();
        assert_eq!(received.len(), 1);
        assert!(received[0].contains_key("a"));
    }

    #[test]
    fn s2_removed_instance_is_delivered_then_pruned() {
        let updater = updater_with_driver(vec![
            Ok(vec![snapshot("a", InstanceStatus::Up)]),
            Ok(vec![]),
            Ok(vec![]),
        ]);
        let subscriber = Arc::new(RecordingSubscriber {
            id: "sub".into(),
            received: StdMutex::new(Vec::new()),
        });
        updater.register(
            subscriber.clone(),
            Criterion::Or(
                Box::new(Criterion::InStatus(LastAction::Added)),
                Box::new(Criterion::InStatus(LastAction::Removed)),
            ),
        );
        updater.tick(); // added
        updater.tick(); // removed
        updater.tick(); // nothing left to report
        let received = subscriber.received.lock().unwrap();
        assert_eq!(received.len(), 2);
        assert_eq!(
            received[1]["a"].last_action,
            LastAction::Removed
        );
    }

    #[test]
    fn transient_driver_error_does_not_remove_instances() {
        let updater = updater_with_driver(vec![
            Ok(vec![snapshot("a", InstanceStatus::Up)]),
            Err(crate::ErrorKind::NoClusters.into()),
            Ok(vec![snapshot("a", InstanceStatus::Up)]),
        ]);
        updater.tick();
        updater.tick(); // driver errors; instance must not flip to Removed
        {
            let observed = updater.observed.lock().unwrap();
            assert_eq!(observed["a"].last_action, LastAction::Updating);
        }
        let change_set = {
            let _ = updater.reconcile();
            updater.observed.lock().unwrap().clone()
        };
        assert_eq!(change_set["a"].last_action, LastAction::Unchanged);
    }

    #[test]
    fn unchanged_instance_is_absent_from_change_set() {
        let snap = snapshot("a", InstanceStatus::Up);
        let updater = updater_with_driver(vec![Ok(vec![snap.clone()]), Ok(vec![snap])]);
        let _ = updater.reconcile();
        let change_set = updater.reconcile();
        assert!(!change_set.contains_key("a"));
    }
}
