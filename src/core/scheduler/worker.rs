//! Worker pool consuming the task queue
//!
//! Each worker claims one due task at a time, takes the (kind, parameters)
//! lease, runs the orchestrator and applies the retry policy. Batches are
//! never interrupted: on shutdown a worker finishes the batch in flight and
//! then stops claiming.

use super::alert::{Alert, AlertSink};
use super::lease::LeaseGuard;
use super::retry::{RetryPolicy, Verdict};
use super::runner::OperationRunner;
use super::task::SyncTask;
use crate::adapters::database::{EndpointStorage, SyncStorage, TaskStorage};
use crate::config::CatalogSyncConfig;
use crate::core::oplog::OperationLog;
use crate::domain::Result;
use crate::log_retry_attempt;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::Instant;

#[derive(Debug, Clone)]
pub struct WorkerSettings {
    pub workers: usize,
    pub poll_interval: std::time::Duration,
    pub lease_ttl: std::time::Duration,
    /// Deferral when the lease is held elsewhere
    pub lease_retry: Duration,
    /// A running task claimed longer ago than this belongs to a dead worker
    pub stale_after: Duration,
    /// Endpoint whose last-sync mark is advanced on success
    pub system: String,
}

impl WorkerSettings {
    pub fn from_config(config: &CatalogSyncConfig) -> Self {
        let scheduler = &config.scheduler;
        Self {
            workers: scheduler.workers.max(1),
            poll_interval: std::time::Duration::from_secs(scheduler.poll_interval_seconds.max(1)),
            lease_ttl: std::time::Duration::from_secs(scheduler.lease_ttl_seconds),
            lease_retry: seconds(scheduler.lease_retry_seconds),
            stale_after: seconds(scheduler.stale_task_seconds),
            system: config.sync.system.clone(),
        }
    }
}

fn seconds(value: u64) -> Duration {
    Duration::seconds(i64::try_from(value).unwrap_or(i64::MAX / 1000))
}

pub struct WorkerPool {
    storage: Arc<dyn SyncStorage>,
    runner: Arc<dyn OperationRunner>,
    alerts: Arc<dyn AlertSink>,
    oplog: OperationLog,
    retry: RetryPolicy,
    settings: WorkerSettings,
}

impl WorkerPool {
    pub fn new(
        storage: Arc<dyn SyncStorage>,
        runner: Arc<dyn OperationRunner>,
        alerts: Arc<dyn AlertSink>,
        retry: RetryPolicy,
        settings: WorkerSettings,
    ) -> Self {
        Self {
            oplog: OperationLog::new(storage.clone()),
            storage,
            runner,
            alerts,
            retry,
            settings,
        }
    }

    /// Returns tasks orphaned by a dead process to the queue
    ///
    /// An attempt that had started stays spent; a task whose last attempt was
    /// interrupted fails and raises an alert instead of running again. An
    /// operation record the dead worker left `running` is closed as `failed`.
    pub async fn recover_stale(&self, now: DateTime<Utc>) -> Result<usize> {
        let requeued = self
            .storage
            .requeue_stale_tasks(now - self.settings.stale_after, now)
            .await?;

        for task in &requeued {
            if let Some(operation_id) = task.latest_operation() {
                self.oplog.close_interrupted(&operation_id).await?;
            }
            if task.has_attempts_left() {
                tracing::warn!(
                    task_id = %task.id,
                    kind = %task.kind,
                    attempts = task.attempts,
                    "Requeued stale task"
                );
                continue;
            }

            let mut task = task.clone();
            let error = format!(
                "worker interrupted on attempt {} of {}",
                task.attempts, task.max_attempts
            );
            self.give_up(&mut task, error, now).await;
            self.storage.update_task(&task).await?;
        }
        Ok(requeued.len())
    }

    /// Claims and processes at most one due task
    ///
    /// # Returns
    ///
    /// The task as persisted after processing, or `None` if nothing was due.
    pub async fn run_once(&self, worker: &str, now: DateTime<Utc>) -> Result<Option<SyncTask>> {
        let Some(task) = self.storage.claim_due_task(now, worker).await? else {
            return Ok(None);
        };
        self.process(worker, task, now).await.map(Some)
    }

    async fn process(&self, worker: &str, mut task: SyncTask, now: DateTime<Utc>) -> Result<SyncTask> {
        let holder = format!("{worker}/{}", task.id);
        let lease = match LeaseGuard::acquire(
            self.storage.clone(),
            task.kind,
            &task.parameters,
            &holder,
            self.settings.lease_ttl,
        )
        .await
        {
            Ok(Some(lease)) => lease,
            Ok(None) => {
                tracing::info!(task_id = %task.id, kind = %task.kind, "Lease held elsewhere; deferring task");
                task.defer(now + self.settings.lease_retry, "lease held by another invocation", now);
                self.storage.update_task(&task).await?;
                return Ok(task);
            }
            Err(e) => {
                tracing::warn!(task_id = %task.id, error = %e, "Lease acquisition failed; deferring task");
                task.defer(now + self.settings.lease_retry, e.to_string(), now);
                self.storage.update_task(&task).await?;
                return Ok(task);
            }
        };

        let started = Instant::now();
        task.begin_attempt(now);
        self.storage.update_task(&task).await?;
        tracing::info!(
            task_id = %task.id,
            kind = %task.kind,
            attempt = task.attempts,
            worker,
            "Running sync task"
        );

        let outcome = lease
            .hold_while(self.runner.run(task.kind, &task.parameters))
            .await;
        if let Ok(record) = &outcome {
            task.record_operation(record.id);
        }
        if let Err(e) = lease.release().await {
            tracing::warn!(task_id = %task.id, error = %e, "Failed to release lease; it will expire");
        }

        // The caller's clock, advanced by the time the batch took
        let finished = now
            + Duration::from_std(started.elapsed()).unwrap_or_else(|_| Duration::zero());
        match RetryPolicy::classify(&outcome) {
            Verdict::Done(status) => {
                task.succeed(finished);
                if let Err(e) = self
                    .storage
                    .record_endpoint_sync(&self.settings.system, finished)
                    .await
                {
                    tracing::warn!(system = %self.settings.system, error = %e, "Failed to record endpoint sync");
                }
                tracing::info!(task_id = %task.id, kind = %task.kind, status = %status, "Sync task finished");
            }
            Verdict::Retry(error) => match self.retry.next_attempt_at(&task, finished) {
                Some(at) => {
                    log_retry_attempt!(task.attempts, task.max_attempts, error.as_str());
                    task.schedule_retry(at, error, finished);
                }
                None => self.give_up(&mut task, error, finished).await,
            },
            Verdict::Terminal(error) => self.give_up(&mut task, error, finished).await,
        }

        self.storage.update_task(&task).await?;
        Ok(task)
    }

    async fn give_up(&self, task: &mut SyncTask, error: String, now: DateTime<Utc>) {
        task.fail(error.clone(), now);
        self.alerts
            .raise(&Alert {
                task_id: task.id,
                kind: task.kind,
                attempts: task.attempts,
                error,
                operation_id: task.latest_operation(),
                raised_at: now,
            })
            .await;
    }

    /// Runs the workers until `shutdown_rx` flips to `true`
    pub async fn run(self: Arc<Self>, shutdown_rx: watch::Receiver<bool>) -> Result<()> {
        match self.recover_stale(Utc::now()).await {
            Ok(0) => {}
            Ok(n) => tracing::info!(requeued = n, "Recovered stale tasks"),
            Err(e) => tracing::error!(error = %e, "Stale task recovery failed"),
        }

        let mut handles = Vec::with_capacity(self.settings.workers);
        for index in 0..self.settings.workers {
            let pool = self.clone();
            let shutdown_rx = shutdown_rx.clone();
            handles.push(tokio::spawn(async move {
                pool.worker_loop(format!("worker-{index}"), shutdown_rx).await;
            }));
        }

        for result in futures::future::join_all(handles).await {
            if let Err(e) = result {
                tracing::error!(error = %e, "Worker task panicked");
            }
        }
        tracing::info!("Worker pool stopped");
        Ok(())
    }

    async fn worker_loop(&self, name: String, mut shutdown_rx: watch::Receiver<bool>) {
        tracing::debug!(worker = %name, "Worker started");
        loop {
            if *shutdown_rx.borrow() {
                break;
            }

            let idle = match self.run_once(&name, Utc::now()).await {
                Ok(Some(_)) => false,
                Ok(None) => true,
                Err(e) => {
                    tracing::error!(worker = %name, error = %e, "Worker iteration failed");
                    true
                }
            };

            if idle {
                tokio::select! {
                    _ = tokio::time::sleep(self.settings.poll_interval) => {}
                    _ = shutdown_rx.changed() => {}
                }
            }
        }
        tracing::debug!(worker = %name, "Worker stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::MemoryStorage;
    use crate::core::scheduler::alert::TracingAlertSink;
    use crate::core::scheduler::task::TaskStatus;
    use crate::domain::{
        OperationKind, OperationParams, OperationRecord, OperationStatus, SyncError,
    };
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Runner returning a fixed verdict and counting calls
    struct ScriptedRunner {
        calls: AtomicUsize,
        fail_with: Option<fn() -> SyncError>,
    }

    #[async_trait]
    impl OperationRunner for ScriptedRunner {
        async fn run(&self, kind: OperationKind, parameters: &OperationParams) -> Result<OperationRecord> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(make) = self.fail_with {
                return Err(make());
            }
            let mut record = OperationRecord::new(kind, parameters.clone());
            record.mark_running();
            record.finish(1, 1, 0, vec![]);
            Ok(record)
        }
    }

    fn missing_endpoint() -> SyncError {
        SyncError::Configuration("no active endpoint".into())
    }

    fn connection_reset() -> SyncError {
        SyncError::Database("connection reset".into())
    }

    #[derive(Default)]
    struct CollectingSink(Mutex<Vec<Alert>>);

    #[async_trait]
    impl AlertSink for CollectingSink {
        async fn raise(&self, alert: &Alert) {
            self.0.lock().unwrap().push(alert.clone());
        }
    }

    fn settings() -> WorkerSettings {
        WorkerSettings {
            workers: 1,
            poll_interval: std::time::Duration::from_millis(10),
            lease_ttl: std::time::Duration::from_secs(60),
            lease_retry: Duration::seconds(30),
            stale_after: Duration::hours(2),
            system: "gestionale".to_string(),
        }
    }

    fn pool(
        storage: Arc<MemoryStorage>,
        runner: Arc<ScriptedRunner>,
        alerts: Arc<dyn AlertSink>,
    ) -> WorkerPool {
        WorkerPool::new(storage, runner, alerts, RetryPolicy::default(), settings())
    }

    #[tokio::test]
    async fn test_success_records_endpoint_sync() {
        let storage = Arc::new(MemoryStorage::new());
        let runner = Arc::new(ScriptedRunner { calls: AtomicUsize::new(0), fail_with: None });
        let pool = pool(storage.clone(), runner.clone(), Arc::new(TracingAlertSink));

        let task = SyncTask::new(OperationKind::ProductSync, OperationParams::new(), 3, Utc::now());
        storage.enqueue_task(&task).await.unwrap();

        let done = pool.run_once("w", Utc::now()).await.unwrap().unwrap();
        assert_eq!(done.status, TaskStatus::Succeeded);
        assert_eq!(done.attempts, 1);
        assert_eq!(done.operation_ids.len(), 1);
        assert!(storage.endpoint_last_sync("gestionale").await.unwrap().is_some());
        assert!(pool.run_once("w", Utc::now()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_configuration_error_alerts_immediately() {
        let storage = Arc::new(MemoryStorage::new());
        let runner = Arc::new(ScriptedRunner {
            calls: AtomicUsize::new(0),
            fail_with: Some(missing_endpoint),
        });
        let sink = Arc::new(CollectingSink::default());
        let pool = pool(storage.clone(), runner.clone(), sink.clone());

        let task = SyncTask::new(OperationKind::OrderExport, OperationParams::new(), 3, Utc::now());
        storage.enqueue_task(&task).await.unwrap();

        let done = pool.run_once("w", Utc::now()).await.unwrap().unwrap();
        assert_eq!(done.status, TaskStatus::Failed);
        assert_eq!(runner.calls.load(Ordering::SeqCst), 1);
        let alerts = sink.0.lock().unwrap();
        assert_eq!(alerts.len(), 1);
        assert!(alerts[0].error.contains("no active endpoint"));
    }

    #[tokio::test]
    async fn test_held_lease_defers_without_attempt() {
        let storage = Arc::new(MemoryStorage::new());
        let runner = Arc::new(ScriptedRunner { calls: AtomicUsize::new(0), fail_with: None });
        let pool = pool(storage.clone(), runner.clone(), Arc::new(TracingAlertSink));

        let params = OperationParams::new();
        let _held = LeaseGuard::acquire(
            storage.clone(),
            OperationKind::ProductSync,
            &params,
            "elsewhere",
            std::time::Duration::from_secs(60),
        )
        .await
        .unwrap()
        .unwrap();

        let now = Utc::now();
        let task = SyncTask::new(OperationKind::ProductSync, params, 3, now);
        storage.enqueue_task(&task).await.unwrap();

        let deferred = pool.run_once("w", now).await.unwrap().unwrap();
        assert_eq!(deferred.status, TaskStatus::Queued);
        assert_eq!(deferred.attempts, 0);
        assert_eq!(deferred.next_eligible_at, now + Duration::seconds(30));
        assert_eq!(runner.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_recover_stale_closes_interrupted_record() {
        let storage = Arc::new(MemoryStorage::new());
        let runner = Arc::new(ScriptedRunner { calls: AtomicUsize::new(0), fail_with: None });
        let pool = pool(storage.clone(), runner, Arc::new(TracingAlertSink));

        let started = Utc::now() - Duration::hours(3);
        let record = OperationLog::new(storage.clone())
            .open(OperationKind::InventorySync, OperationParams::new())
            .await
            .unwrap();
        let mut task = SyncTask::new(OperationKind::InventorySync, OperationParams::new(), 3, started);
        storage.enqueue_task(&task).await.unwrap();
        task.claim("dead-worker", started);
        task.begin_attempt(started);
        task.record_operation(record.id);
        storage.update_task(&task).await.unwrap();

        assert_eq!(pool.recover_stale(Utc::now()).await.unwrap(), 1);

        let requeued = storage.get_task(&task.id).await.unwrap().unwrap();
        assert_eq!(requeued.status, TaskStatus::Queued);
        assert_eq!(requeued.attempts, 1);
        let closed = pool.oplog.get(&record.id).await.unwrap().unwrap();
        assert_eq!(closed.status, OperationStatus::Failed);
    }

    #[tokio::test]
    async fn test_repeated_crashes_exhaust_attempts() {
        let storage = Arc::new(MemoryStorage::new());
        let runner = Arc::new(ScriptedRunner { calls: AtomicUsize::new(0), fail_with: None });
        let sink = Arc::new(CollectingSink::default());
        let pool = pool(storage.clone(), runner.clone(), sink.clone());

        let mut clock = Utc::now();
        let task = SyncTask::new(OperationKind::OrderExport, OperationParams::new(), 3, clock);
        storage.enqueue_task(&task).await.unwrap();

        // Each attempt kills the worker after it has started
        for crash in 1..=3 {
            let mut claimed = storage.claim_due_task(clock, "doomed").await.unwrap().unwrap();
            claimed.begin_attempt(clock);
            storage.update_task(&claimed).await.unwrap();

            clock = clock + Duration::hours(3);
            assert_eq!(pool.recover_stale(clock).await.unwrap(), 1);
            let after = storage.get_task(&task.id).await.unwrap().unwrap();
            assert_eq!(after.attempts, crash);
        }

        let failed = storage.get_task(&task.id).await.unwrap().unwrap();
        assert_eq!(failed.status, TaskStatus::Failed);
        assert!(failed.last_error.unwrap().contains("attempt 3 of 3"));
        assert_eq!(sink.0.lock().unwrap().len(), 1);
        assert!(pool.run_once("w", clock + Duration::days(1)).await.unwrap().is_none());
        assert_eq!(runner.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_task_times_follow_the_given_clock() {
        let storage = Arc::new(MemoryStorage::new());
        let runner = Arc::new(ScriptedRunner {
            calls: AtomicUsize::new(0),
            fail_with: Some(connection_reset),
        });
        let pool = pool(storage.clone(), runner, Arc::new(TracingAlertSink));

        let clock = Utc::now() - Duration::days(30);
        let task = SyncTask::new(OperationKind::ProductSync, OperationParams::new(), 3, clock);
        storage.enqueue_task(&task).await.unwrap();

        let retried = pool.run_once("w", clock).await.unwrap().unwrap();
        assert_eq!(retried.status, TaskStatus::Queued);
        assert!(retried.updated_at >= clock);
        assert!(retried.updated_at < clock + Duration::minutes(1));
        assert!(retried.next_eligible_at < clock + Duration::days(1));
        assert!(retried.next_eligible_at > retried.updated_at);
    }

    /// Runner whose batch outlives the lease TTL
    struct SlowRunner(std::time::Duration);

    #[async_trait]
    impl OperationRunner for SlowRunner {
        async fn run(&self, kind: OperationKind, parameters: &OperationParams) -> Result<OperationRecord> {
            tokio::time::sleep(self.0).await;
            let mut record = OperationRecord::new(kind, parameters.clone());
            record.mark_running();
            record.finish(0, 0, 0, vec![]);
            Ok(record)
        }
    }

    #[tokio::test]
    async fn test_lease_outlives_ttl_during_long_batch() {
        let storage = Arc::new(MemoryStorage::new());
        let pool = WorkerPool::new(
            storage.clone(),
            Arc::new(SlowRunner(std::time::Duration::from_millis(600))),
            Arc::new(TracingAlertSink),
            RetryPolicy::default(),
            WorkerSettings {
                lease_ttl: std::time::Duration::from_millis(150),
                ..settings()
            },
        );
        let task = SyncTask::new(OperationKind::OrderExport, OperationParams::new(), 3, Utc::now());
        storage.enqueue_task(&task).await.unwrap();

        let contender = async {
            tokio::time::sleep(std::time::Duration::from_millis(400)).await;
            LeaseGuard::acquire(
                storage.clone(),
                OperationKind::OrderExport,
                &OperationParams::new(),
                "second-worker",
                std::time::Duration::from_millis(150),
            )
            .await
            .unwrap()
        };
        let (done, second) = tokio::join!(pool.run_once("w", Utc::now()), contender);

        assert_eq!(done.unwrap().unwrap().status, TaskStatus::Succeeded);
        assert!(second.is_none());
    }
}
