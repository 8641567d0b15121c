//! Broadcaster: a registry of notifier-bound Workers that fan a payload
//! out to every registered notifier with persistent retry.
//!
//! Grounded on `original_source/manager/report/broadcast.go` (the
//! `Broadcaster`/`BroadcastWorker` split, the goroutine-per-`Notify`-call
//! semantics, and the attempt-then-backoff-then-reenter retry loop).
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use slog::Logger;

use crate::errors::ErrorKind;
use crate::Result;

pub mod email_notifier;
pub mod http_notifier;
pub mod metrics;
pub mod notifier;

pub use notifier::Notifier;

const DEFAULT_ATTEMPTS_ON_ERROR: u32 = 5;
const DEFAULT_WAIT_ON_ERROR: Duration = Duration::from_secs(30);
const DEFAULT_WAIT_AFTER_ATTEMPTS: Duration = Duration::from_secs(60);

/// Retry policy applied by every Worker. A zero field is replaced with
/// its default at construction, matching the original's "0 means use the
/// default" convention.
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    pub attempts_on_error: u32,
    pub wait_on_error: Duration,
    pub wait_after_attempts: Duration,
}

impl Default for RetryPolicy {
    fn default() -> RetryPolicy {
        RetryPolicy {
            attempts_on_error: DEFAULT_ATTEMPTS_ON_ERROR,
            wait_on_error: DEFAULT_WAIT_ON_ERROR,
            wait_after_attempts: DEFAULT_WAIT_AFTER_ATTEMPTS,
        }
    }
}

impl RetryPolicy {
    /// Builds a policy from caller-supplied values, substituting the
    /// default for any field left at zero.
    pub fn new(attempts_on_error: u32, wait_on_error: Duration, wait_after_attempts: Duration) -> RetryPolicy {
        let default = RetryPolicy::default();
        RetryPolicy {
            attempts_on_error: if attempts_on_error == 0 {
                default.attempts_on_error
            } else {
                attempts_on_error
            },
            wait_on_error: if wait_on_error.is_zero() {
                default.wait_on_error
            } else {
                wait_on_error
            },
            wait_after_attempts: if wait_after_attempts.is_zero() {
                default.wait_after_attempts
            } else {
                wait_after_attempts
            },
        }
    }
}

#[derive(Default)]
struct WorkerCounters {
    total: AtomicU64,
    success: AtomicU64,
    errors: AtomicU64,
    fail: AtomicU64,
}

/// Delivery counters for one notifier, as of the moment they are read.
#[derive(Clone, Copy, Debug, Default)]
pub struct WorkerCounts {
    pub total: u64,
    pub success: u64,
    pub errors: u64,
    pub fail: u64,
}

/// Binds one Notifier to the Broadcaster's retry policy.
pub struct Worker {
    notifier: Box<dyn Notifier>,
    policy: RetryPolicy,
    counters: WorkerCounters,
    quit: AtomicBool,
    logger: Logger,
}

impl Worker {
    fn new(notifier: Box<dyn Notifier>, policy: RetryPolicy, logger: Logger) -> Worker {
        Worker {
            notifier,
            policy,
            counters: WorkerCounters::default(),
            quit: AtomicBool::new(false),
            logger,
        }
    }

    pub fn id(&self) -> &str {
        self.notifier.id()
    }

    pub fn counts(&self) -> WorkerCounts {
        WorkerCounts {
            total: self.counters.total.load(Ordering::SeqCst),
            success: self.counters.success.load(Ordering::SeqCst),
            errors: self.counters.errors.load(Ordering::SeqCst),
            fail: self.counters.fail.load(Ordering::SeqCst),
        }
    }

    /// Spawns one delivery task for this call. Returns immediately.
    fn notify(self: &Arc<Self>, payload: Arc<Vec<u8>>) {
        self.counters.total.fetch_add(1, Ordering::SeqCst);
        let worker = Arc::clone(self);
        thread::spawn(move || worker.deliver(&payload));
    }

    fn deliver(&self, payload: &[u8]) {
        loop {
            if self.quit.load(Ordering::SeqCst) {
                return;
            }
            if self.attempt_round(payload) {
                return;
            }
            if self.quit.load(Ordering::SeqCst) {
                return;
            }
            thread::sleep(self.policy.wait_after_attempts);
        }
    }

    /// Runs up to `attempts_on_error` delivery attempts. Returns `true` on
    /// success, `false` once the attempt budget is exhausted.
    fn attempt_round(&self, payload: &[u8]) -> bool {
        for attempt in 1..=self.policy.attempts_on_error {
            match self.notifier.notify(payload) {
                Ok(()) => {
                    self.counters.success.fetch_add(1, Ordering::SeqCst);
                    metrics::NOTIFY_OUTCOMES
                        .with_label_values(&[self.id(), "success"])
                        .inc();
                    return true;
                }
                Err(err) => {
                    self.counters.errors.fetch_add(1, Ordering::SeqCst);
                    metrics::NOTIFY_OUTCOMES
                        .with_label_values(&[self.id(), "error"])
                        .inc();
                    warn!(
                        self.logger, "notify attempt failed";
                        "notifier" => self.id(), "attempt" => attempt, "error" => err.to_string(),
                    );
                    if attempt < self.policy.attempts_on_error && !self.quit.load(Ordering::SeqCst) {
                        thread::sleep(self.policy.wait_on_error);
                    }
                }
            }
        }
        self.counters.fail.fetch_add(1, Ordering::SeqCst);
        metrics::NOTIFY_OUTCOMES.with_label_values(&[self.id(), "exhausted"]).inc();
        error!(self.logger, "notify attempts exhausted, backing off"; "notifier" => self.id());
        false
    }

    fn stop(&self) {
        self.quit.store(true, Ordering::SeqCst);
    }
}

/// Registry of notifier-bound Workers; fans payloads out without blocking.
pub struct Broadcaster {
    logger: Logger,
    policy: RetryPolicy,
    workers: Mutex<HashMap<String, Arc<Worker>>>,
}

impl Broadcaster {
    pub fn new(logger: Logger, policy: RetryPolicy) -> Broadcaster {
        Broadcaster {
            logger,
            policy,
            workers: Mutex::new(HashMap::new()),
        }
    }

    /// Registers a Notifier, building a Worker bound to it under the
    /// Broadcaster's current retry policy.
    pub fn register(&self, notifier: Box<dyn Notifier>) -> Result<()> {
        let mut workers = self.workers.lock().expect("broadcaster workers lock poisoned");
        let id = notifier.id().to_string();
        if workers.contains_key(&id) {
            return Err(ErrorKind::BroadcasterAlreadyExists(id).into());
        }
        let worker = Worker::new(notifier, self.policy, self.logger.clone());
        workers.insert(id, Arc::new(worker));
        Ok(())
    }

    /// Hands `payload` to every registered Worker. Does not block on
    /// completion: each Worker delivers on its own background task.
    pub fn broadcast(&self, payload: Vec<u8>) {
        let payload = Arc::new(payload);
        let workers = self.workers.lock().expect("broadcaster workers lock poisoned");
        for worker in workers.values() {
            worker.notify(Arc::clone(&payload));
        }
    }

    /// Signals every Worker to stop retrying once its current attempt
    /// round completes. Used by tests and graceful shutdown.
    pub fn stop_all(&self) {
        let workers = self.workers.lock().expect("broadcaster workers lock poisoned");
        for worker in workers.values() {
            worker.stop();
        }
    }

    pub fn worker_counts(&self, notifier_id: &str) -> Option<WorkerCounts> {
        let workers = self.workers.lock().expect("broadcaster workers lock poisoned");
        workers.get(notifier_id).map(|worker| worker.counts())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;
    use std::time::Instant;

    struct FlakyNotifier {
        id: String,
        fail_times: AtomicU32,
    }

    impl Notifier for FlakyNotifier {
        fn id(&self) -> &str {
            &self.id
        }

        fn notify(&self, _payload: &[u8]) -> Result<()> {
            if self.fail_times.load(Ordering::SeqCst) > 0 {
                self.fail_times.fetch_sub(1, Ordering::SeqCst);
                Err("simulated failure".into())
            } else {
                Ok(())
            }
        }
    }

    fn broadcaster_with_policy(policy: RetryPolicy) -> Broadcaster {
        Broadcaster::new(crate::logging::starter(), policy)
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let broadcaster = broadcaster_with_policy(RetryPolicy::default());
        let make = || {
            Box::new(FlakyNotifier {
                id: "ops".into(),
                fail_times: AtomicU32::new(0),
            }) as Box<dyn Notifier>
        };
        broadcaster.register(make()).unwrap();
        assert!(broadcaster.register(make()).is_err());
    }

    #[test]
    fn broadcast_retries_until_success_within_the_attempt_budget() {
        let policy = RetryPolicy::new(3, Duration::from_millis(1), Duration::from_millis(1));
        let broadcaster = broadcaster_with_policy(policy);
        broadcaster
            .register(Box::new(FlakyNotifier {
                id: "ops".into(),
                fail_times: AtomicU32::new(2),
            }))
            .unwrap();
        broadcaster.broadcast(b"payload".to_vec());

        let deadline = Instant::now() + Duration::from_secs(2);
        loop {
            let counts = broadcaster.worker_counts("ops").unwrap();
            if counts.success == 1 {
                assert_eq!(counts.errors, 2);
                break;
            }
            if Instant::now() > deadline {
                panic!("worker did not succeed within the deadline");
            }
            thread::sleep(Duration::from_millis(10));
        }
    }

    #[test]
    fn zero_policy_fields_fall_back_to_defaults() {
        let policy = RetryPolicy::new(0, Duration::from_secs(0), Duration::from_secs(0));
        assert_eq!(policy.attempts_on_error, DEFAULT_ATTEMPTS_ON_ERROR);
        assert_eq!(policy.wait_on_error, DEFAULT_WAIT_ON_ERROR);
        assert_eq!(policy.wait_after_attempts, DEFAULT_WAIT_AFTER_ATTEMPTS);
    }

    struct AlwaysFailNotifier {
        id: String,
    }

    impl Notifier for AlwaysFailNotifier {
        fn id(&self) -> &str {
            &self.id
        }

        fn notify(&self, _payload: &[u8]) -> Result<()> {
            Err("simulated failure".into())
        }
    }

    #[test]
    fn stop_all_halts_the_retry_loop() {
        let policy = RetryPolicy::new(1, Duration::from_millis(1), Duration::from_millis(5));
        let broadcaster = broadcaster_with_policy(policy);
        broadcaster
            .register(Box::new(AlwaysFailNotifier { id: "ops".into() }))
            .unwrap();
        broadcaster.broadcast(b"payload".to_vec());

        // Let a few attempt-then-backoff rounds run before stopping.
        thread::sleep(Duration::from_millis(50));
        broadcaster.stop_all();
        let at_stop = broadcaster.worker_counts("ops").unwrap();

        // If the quit flag were ignored the loop would keep incrementing
        // `fail` forever; give it ample time to prove it did not.
        thread::sleep(Duration::from_millis(50));
        let after_stop = broadcaster.worker_counts("ops").unwrap();
        assert_eq!(after_stop.fail, at_stop.fail);
    }
}
