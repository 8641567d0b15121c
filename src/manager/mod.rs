//! Application Manager: owns one app-version, absorbs Updater change
//! sets, runs the check chain on a timer, and raises a breach to the
//! Broadcaster on a threshold crossing.
//!
//! Grounded on `original_source/manager/service/manager.go` (id shape,
//! `FullImageNameRegexp`) and `original_source/manager/service/check.go`
//! (check-tick bookkeeping), with the timer-plus-quit-channel loop
//! following the same `std::thread` idiom as `updater::ServiceUpdater`
//! and the teacher's `src/components/discovery.rs`.
use std::collections::HashMap;
use std::sync::mpsc;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::thread;
use std::time::Duration;

use chrono::DateTime;
use chrono::Utc;
use regex::Regex;
use serde_derive::Serialize;
use slog::Logger;

use crate::broadcaster::Broadcaster;
use crate::criteria::ChangeSet;
use crate::criteria::Criterion;
use crate::errors::ErrorKind;
use crate::updater::LastAction;
use crate::updater::Subscriber;
use crate::Result;

pub mod check_chain;
pub mod metrics;

use check_chain::Checker;

/// A single instance as tracked by its owning Manager.
#[derive(Clone, Debug)]
pub struct ManagedInstance {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub host: String,
    pub healthy: bool,
    pub cluster_id: String,
    pub image_name: String,
    pub image_tag: String,
}

/// Running tallies of check outcomes.
#[derive(Clone, Copy, Debug, Default)]
pub struct ManagerStatus {
    pub success: u64,
    pub failed: u64,
    pub consecutive_fails: u32,
}

/// Parameters accepted by `register_application`.
pub struct ManagerParams {
    pub app_id: String,
    pub major_version: String,
    pub image_name: Option<String>,
    pub min_instances_per_cluster: HashMap<String, usize>,
    pub interval: Duration,
    pub threshold: u32,
}

#[derive(Serialize)]
struct BreachPayload<'a> {
    manager_id: &'a str,
    app_id: &'a str,
    version: &'a str,
    consecutive_fails: u32,
    failed: u64,
    success: u64,
}

/// A read-only projection of a Manager, returned by `list_applications`.
pub struct AppView {
    pub app_id: String,
    pub version: String,
    pub created_at: DateTime<Utc>,
    pub instances: Vec<ManagedInstance>,
}

struct RunningCheck {
    quit: mpsc::Sender<()>,
    ack: mpsc::Receiver<()>,
}

/// Builds the Criterion a Manager subscribes to the Updater under, from
/// its optional image-name prefix constraint.
///
/// The anchored prefix regex is compiled from the raw constraint string
/// without escaping, matching the original's `"^" + image_name` contract:
/// operators may pass regex syntax deliberately.
fn build_image_criterion(image_name: &str) -> Result<Criterion> {
    let pattern = format!("^{}", image_name);
    let regex = Regex::new(&pattern)
        .map_err(|err| ErrorKind::ImageNameRegexpError(pattern, err.to_string()))?;
    Ok(Criterion::ImageAndTagMatches(regex))
}

pub struct ApplicationManager {
    id: String,
    app_id: String,
    major_version: String,
    created_at: DateTime<Utc>,
    interval: Duration,
    threshold: u32,
    check_chain: Checker,
    instances: Mutex<HashMap<String, ManagedInstance>>,
    status: Mutex<ManagerStatus>,
    broadcaster: Arc<Broadcaster>,
    logger: Logger,
    running: Mutex<Option<RunningCheck>>,
    stopped: AtomicBool,
}

impl ApplicationManager {
    /// Builds a Manager and the Criterion it should be subscribed under.
    ///
    /// Does not start the check loop; the registry does that explicitly
    /// via `start_check` once the Manager has been recorded.
    pub fn new(
        params: ManagerParams,
        broadcaster: Arc<Broadcaster>,
        logger: Logger,
    ) -> Result<(Arc<ApplicationManager>, Criterion)> {
        let criterion = match &params.image_name {
            Some(name) => build_image_criterion(name)?,
            None => Criterion::Or(
                Box::new(Criterion::IsHealthy(true)),
                Box::new(Criterion::IsHealthy(false)),
            ),
        };
        let check_chain = check_chain::default_chain(params.min_instances_per_cluster);
        let id = format!("{}#{}", params.app_id, params.major_version);
        let manager = ApplicationManager {
            id,
            app_id: params.app_id,
            major_version: params.major_version,
            created_at: Utc::now(),
            interval: params.interval,
            threshold: params.threshold,
            check_chain,
            instances: Mutex::new(HashMap::new()),
            status: Mutex::new(ManagerStatus::default()),
            broadcaster,
            logger,
            running: Mutex::new(None),
            stopped: AtomicBool::new(false),
        };
        Ok((Arc::new(manager), criterion))
    }

    /// `app_id + "#" + major_version`. Uniqueness is enforced by the registry.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn status(&self) -> ManagerStatus {
        *self.status.lock().expect("manager status lock poisoned")
    }

    pub fn view(&self) -> AppView {
        let instances = self.instances.lock().expect("manager instances lock poisoned");
        AppView {
            app_id: self.app_id.clone(),
            version: self.major_version.clone(),
            created_at: self.created_at,
            instances: instances.values().cloned().collect(),
        }
    }

    /// Launches the check-tick task if it is not already running.
    /// A no-op once the Manager has been stopped: `Stopped` is terminal.
    pub fn start_check(self: &Arc<Self>) {
        let mut running = self.running.lock().expect("manager running lock poisoned");
        if running.is_some() || self.stopped.load(Ordering::SeqCst) {
            return;
        }
        let (quit_tx, quit_rx) = mpsc::channel();
        let (ack_tx, ack_rx) = mpsc::channel();
        let manager = Arc::clone(self);
        let interval = self.interval;
        let id = self.id().to_string();
        let spawned = thread::Builder::new()
            .name(format!("manager-{}", id))
            .spawn(move || loop {
                match quit_rx.recv_timeout(interval) {
                    Ok(()) => {
                        let _ = ack_tx.send(());
                        break;
                    }
                    Err(mpsc::RecvTimeoutError::Timeout) => manager.check_tick(),
                    Err(mpsc::RecvTimeoutError::Disconnected) => break,
                }
            });
        match spawned {
            Ok(_) => *running = Some(RunningCheck { quit: quit_tx, ack: ack_rx }),
            Err(err) => error!(self.logger, "failed to spawn manager check loop"; "manager" => id, "error" => err.to_string()),
        }
    }

    /// Signals the check task and blocks until it acknowledges having
    /// stopped. Idempotent; marks the Manager terminally `Stopped`.
    pub fn stop_check(&self) {
        let running = self.running.lock().expect("manager running lock poisoned").take();
        if let Some(running) = running {
            let _ = running.quit.send(());
            let _ = running.ack.recv();
        }
        self.stopped.store(true, Ordering::SeqCst);
    }

    fn check_tick(&self) {
        metrics::CHECK_COUNT.inc();
        let ok = {
            let instances = self.instances.lock().expect("manager instances lock poisoned");
            self.check_chain.ok(&instances)
        };
        let id = self.id().to_string();
        let mut status = self.status.lock().expect("manager status lock poisoned");
        if ok {
            status.consecutive_fails = 0;
            status.success += 1;
            return;
        }
        status.failed += 1;
        status.consecutive_fails += 1;
        if status.consecutive_fails != self.threshold {
            return;
        }
        metrics::BREACH_COUNT.with_label_values(&[&id]).inc();
        let payload = BreachPayload {
            manager_id: &id,
            app_id: &self.app_id,
            version: &self.major_version,
            consecutive_fails: status.consecutive_fails,
            failed: status.failed,
            success: status.success,
        };
        let bytes = match serde_json::to_vec(&payload) {
            Ok(bytes) => bytes,
            Err(err) => {
                error!(self.logger, "failed to encode breach payload"; "manager" => id, "error" => err.to_string());
                return;
            }
        };
        drop(status);
        warn!(self.logger, "check-chain threshold crossed"; "manager" => id);
        self.broadcaster.broadcast(bytes);
    }
}

impl Subscriber for ApplicationManager {
    fn id(&self) -> &str {
        &self.id
    }

    fn update(&self, change_set: ChangeSet) {
        let mut instances = self.instances.lock().expect("manager instances lock poisoned");
        for (id, observed) in change_set {
            if observed.last_action == LastAction::Removed {
                instances.remove(&id);
                continue;
            }
            instances
                .entry(id.clone())
                .and_modify(|existing| {
                    existing.healthy = observed.snapshot.healthy();
                    existing.host = observed.snapshot.host.clone();
                })
                .or_insert_with(|| ManagedInstance {
                    id: id.clone(),
                    created_at: Utc::now(),
                    host: observed.snapshot.host.clone(),
                    healthy: observed.snapshot.healthy(),
                    cluster_id: observed.cluster_id.clone(),
                    image_name: observed.snapshot.image_name.clone(),
                    image_tag: observed.snapshot.image_tag.clone(),
                });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcaster::Broadcaster;
    use crate::models::InstanceSnapshot;
    use crate::models::InstanceStatus;
    use crate::updater::ObservedInstance;

    fn broadcaster() -> Arc<Broadcaster> {
        Arc::new(Broadcaster::new(crate::logging::starter(), Default::default()))
    }

    fn params(threshold: u32) -> ManagerParams {
        let mut min = HashMap::new();
        min.insert("wdc".to_string(), 1);
        ManagerParams {
            app_id: "svc".into(),
            major_version: "1".into(),
            image_name: None,
            min_instances_per_cluster: min,
            interval: Duration::from_secs(3600),
            threshold,
        }
    }

    fn observed(id: &str, cluster: &str, status: InstanceStatus, action: LastAction) -> ObservedInstance {
        ObservedInstance {
            registered_at: Utc::now(),
            last_update: Utc::now(),
            last_action: action,
            cluster_id: cluster.into(),
            snapshot: InstanceSnapshot {
                id: id.into(),
                image_name: "svc".into(),
                image_tag: "v1".into(),
                host: "h1".into(),
                container_name: format!("{}_1", id),
                status,
            },
        }
    }

    #[test]
    fn update_upserts_then_removes() {
        let (manager, _criterion) = ApplicationManager::new(params(1), broadcaster(), crate::logging::starter()).unwrap();
        let mut set = ChangeSet::new();
        set.insert("a".into(), observed("a", "wdc", InstanceStatus::Up, LastAction::Added));
        manager.update(set);
        assert_eq!(manager.instances.lock().unwrap().len(), 1);

        let mut removal = ChangeSet::new();
        removal.insert("a".into(), observed("a", "wdc", InstanceStatus::Up, LastAction::Removed));
        manager.update(removal);
        assert!(manager.instances.lock().unwrap().is_empty());
    }

    /// Counts `notify` calls it receives; never fails a delivery, so the
    /// Broadcaster's retry loop never multiplies one breach into several.
    struct SpyNotifier {
        id: String,
    }

    impl crate::broadcaster::Notifier for SpyNotifier {
        fn id(&self) -> &str {
            &self.id
        }

        fn notify(&self, _payload: &[u8]) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn check_tick_fires_breach_exactly_once_per_crossing() {
        let broadcaster = broadcaster();
        broadcaster
            .register(Box::new(SpyNotifier { id: "spy".into() }))
            .unwrap();
        let (manager, _criterion) = ApplicationManager::new(params(2), Arc::clone(&broadcaster), crate::logging::starter()).unwrap();

        manager.check_tick();
        assert_eq!(manager.status().consecutive_fails, 1);
        assert_eq!(broadcaster.worker_counts("spy").unwrap().total, 0);

        manager.check_tick();
        assert_eq!(manager.status().consecutive_fails, 2);
        assert_eq!(broadcaster.worker_counts("spy").unwrap().total, 1);

        // A third failing tick keeps incrementing the counter but must not
        // re-fire: the spy's total stays at 1.
        manager.check_tick();
        assert_eq!(manager.status().consecutive_fails, 3);
        assert_eq!(broadcaster.worker_counts("spy").unwrap().total, 1);

        // Two distinct hosts are required to satisfy the default chain's
        // AtLeastXHosts node, not just the MinInstancesPerCluster one.
        let mut healthy = ChangeSet::new();
        healthy.insert("a".into(), observed("a", "wdc", InstanceStatus::Up, LastAction::Added));
        let mut b = observed("b", "wdc", InstanceStatus::Up, LastAction::Added);
        b.snapshot.host = "h2".into();
        healthy.insert("b".into(), b);
        manager.update(healthy);
        manager.check_tick();
        assert_eq!(manager.status().consecutive_fails, 0);
        assert_eq!(manager.status().success, 1);
        assert_eq!(broadcaster.worker_counts("spy").unwrap().total, 1);

        // Crossing the threshold a second time fires exactly one more.
        let mut removal = ChangeSet::new();
        removal.insert("a".into(), observed("a", "wdc", InstanceStatus::Up, LastAction::Removed));
        removal.insert("b".into(), observed("b", "wdc", InstanceStatus::Up, LastAction::Removed));
        manager.update(removal);
        manager.check_tick();
        manager.check_tick();
        assert_eq!(broadcaster.worker_counts("spy").unwrap().total, 2);
    }

    #[test]
    fn invalid_image_name_regex_is_rejected() {
        let mut p = params(1);
        p.image_name = Some("(unclosed".into());
        let result = ApplicationManager::new(p, broadcaster(), crate::logging::starter());
        assert!(result.is_err());
    }

    #[test]
    fn id_is_app_id_hash_version() {
        let (manager, _criterion) = ApplicationManager::new(params(1), broadcaster(), crate::logging::starter()).unwrap();
        assert_eq!(manager.id(), "svc#1");
    }
}
