//! App Context: the external surface's anchor. Owns the Broadcaster, the
//! Clusters, the Updater, and every registered Application Manager.
//!
//! Grounded on `original_source/api/context.go` (`newContext`'s three-step
//! setup, `RegisterServiceManager`'s serialized register-then-start
//! sequence) and the teacher's `Interfaces`/`Components` container shape
//! in `src/interfaces/mod.rs`.
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;

use prometheus::Registry;
use slog::Logger;

use crate::broadcaster::notifier;
use crate::broadcaster::Broadcaster;
use crate::cluster;
use crate::cluster::Cluster;
use crate::config::Config;
use crate::errors::ErrorKind;
use crate::manager::AppView;
use crate::manager::ApplicationManager;
use crate::manager::ManagerParams;
use crate::updater::ServiceUpdater;
use crate::updater::Subscriber;
use crate::Result;
use crate::ResultExt;

/// Owns every long-lived component and serializes application registration.
pub struct AppContext {
    logger: Logger,
    metrics: Registry,
    broadcaster: Arc<Broadcaster>,
    updater: Arc<ServiceUpdater>,
    applications: Mutex<HashMap<String, Arc<ApplicationManager>>>,
}

impl AppContext {
    /// Builds every long-lived component from `config` and starts the
    /// Updater's polling task.
    ///
    /// Scheduler and Notifier kinds must already be registered with their
    /// factories (`scheduler::factory::register_builtins`,
    /// `broadcaster::notifier::register_builtins`) before this is called;
    /// that registration happens once at process boot, not per context.
    pub fn new(config: Config, logger: Logger) -> Result<Arc<AppContext>> {
        let metrics = Registry::new();
        crate::updater::metrics::register_metrics(&logger, &metrics);
        crate::manager::metrics::register_metrics(&logger, &metrics);
        crate::broadcaster::metrics::register_metrics(&logger, &metrics);

        let broadcaster = Arc::new(Broadcaster::new(logger.clone(), config.broadcaster.retry_policy()));
        Self::setup_notifiers(&broadcaster, config.notifiers, &logger)?;

        let clusters = Self::setup_clusters(config.clusters, &logger)?;
        let updater = ServiceUpdater::new(logger.clone(), clusters, config.discovery.interval())?;
        updater.monitor();

        Ok(Arc::new(AppContext {
            logger,
            metrics,
            broadcaster,
            updater,
            applications: Mutex::new(HashMap::new()),
        }))
    }

    /// The registry every component's counters and histograms are
    /// registered into at construction time.
    pub fn metrics(&self) -> &Registry {
        &self.metrics
    }

    fn setup_notifiers(
        broadcaster: &Broadcaster,
        notifiers: HashMap<String, crate::config::NotifierConfig>,
        logger: &Logger,
    ) -> Result<()> {
        let mut configured = 0;
        for (id, config) in notifiers {
            if config.disabled {
                warn!(logger, "notifier is disabled, skipping"; "notifier" => &id);
                continue;
            }
            let notifier = notifier::create(&config.kind, id.clone(), config.params)
                .chain_err(|| format!("failed to construct notifier '{}'", id))?;
            info!(logger, "notifier constructed"; "notifier" => &id, "type" => &config.kind);
            broadcaster
                .register(notifier)
                .chain_err(|| format!("failed to register notifier '{}' with the broadcaster", id))?;
            configured += 1;
        }
        if configured == 0 {
            warn!(logger, "no notifiers configured");
        }
        Ok(())
    }

    fn setup_clusters(
        clusters: HashMap<String, crate::cluster::ClusterConfig>,
        logger: &Logger,
    ) -> Result<Vec<Arc<Cluster>>> {
        let mut built = Vec::new();
        for (id, config) in clusters {
            match cluster::new_cluster(&id, config) {
                Ok(cluster) => {
                    info!(logger, "cluster configured"; "cluster" => &id);
                    built.push(Arc::new(cluster));
                }
                Err(crate::Error(ErrorKind::ClusterDisabled(_), _)) => {
                    warn!(logger, "cluster is disabled, skipping"; "cluster" => &id);
                }
                Err(err) => return Err(err),
            }
        }
        if built.is_empty() {
            return Err(ErrorKind::NoClusters.into());
        }
        Ok(built)
    }

    /// Builds a criterion from `params`, constructs a Manager, subscribes
    /// it to the Updater, starts its check loop, and records it.
    ///
    /// Serialized by the registry's application-map mutex: concurrent
    /// callers never race on the duplicate-id check.
    pub fn register_application(&self, params: ManagerParams) -> Result<Arc<ApplicationManager>> {
        let mut applications = self.applications.lock().expect("applications lock poisoned");
        let (manager, criterion) =
            ApplicationManager::new(params, Arc::clone(&self.broadcaster), self.logger.clone())?;
        let id = manager.id().to_string();
        if applications.contains_key(&id) {
            return Err(ErrorKind::ManagerAlreadyExists(id).into());
        }
        let subscriber: Arc<dyn Subscriber> = Arc::clone(&manager) as Arc<dyn Subscriber>;
        self.updater.register(subscriber, criterion);
        manager.start_check();
        applications.insert(id, Arc::clone(&manager));
        Ok(manager)
    }

    /// A read-only snapshot of every registered application, keyed by
    /// manager id.
    pub fn list_applications(&self) -> HashMap<String, AppView> {
        let applications = self.applications.lock().expect("applications lock poisoned");
        applications
            .iter()
            .map(|(id, manager)| (id.clone(), manager.view()))
            .collect()
    }
}
