//! Integration tests for graceful shutdown
//!
//! Every long-running loop of `serve` watches the same channel and must stop
//! promptly once it flips to `true`.

use async_trait::async_trait;
use catalog_sync::adapters::database::SyncStorage;
use catalog_sync::adapters::memory::MemoryStorage;
use catalog_sync::api::{self, AppState};
use catalog_sync::config::{secret_string, AdminConfig, SchedulerConfig};
use catalog_sync::core::oplog::OperationLog;
use catalog_sync::core::scheduler::{
    OperationRunner, RetryPolicy, TaskDispatcher, TracingAlertSink, TriggerCalendar, TriggerLoop,
    WorkerPool, WorkerSettings,
};
use catalog_sync::domain::{
    OperationKind, OperationParams, OperationRecord, Result, SyncError,
};
use chrono::{Duration, Utc};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::timeout;

const STOP_WITHIN: std::time::Duration = std::time::Duration::from_secs(5);

struct IdleRunner;

#[async_trait]
impl OperationRunner for IdleRunner {
    async fn run(&self, kind: OperationKind, _parameters: &OperationParams) -> Result<OperationRecord> {
        Err(SyncError::Other(format!("{kind} should not run")))
    }
}

fn storage() -> Arc<dyn SyncStorage> {
    Arc::new(MemoryStorage::new())
}

#[tokio::test]
async fn test_shutdown_signal_propagation() {
    let (shutdown_tx, shutdown_rx1) = watch::channel(false);
    let shutdown_rx2 = shutdown_rx1.clone();

    assert!(!*shutdown_rx1.borrow());
    assert!(!*shutdown_rx2.borrow());

    shutdown_tx.send(true).unwrap();

    assert!(*shutdown_rx1.borrow());
    assert!(*shutdown_rx2.borrow());
}

#[tokio::test]
async fn test_worker_pool_stops_on_signal() {
    let storage = storage();
    let pool = Arc::new(WorkerPool::new(
        storage,
        Arc::new(IdleRunner),
        Arc::new(TracingAlertSink),
        RetryPolicy::default(),
        WorkerSettings {
            workers: 3,
            // Far longer than the test; only the signal can wake the workers
            poll_interval: std::time::Duration::from_secs(3600),
            lease_ttl: std::time::Duration::from_secs(600),
            lease_retry: Duration::seconds(60),
            stale_after: Duration::seconds(1800),
            system: "gestionale".to_string(),
        },
    ));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let handle = tokio::spawn(pool.run(shutdown_rx));
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    shutdown_tx.send(true).unwrap();

    let result = timeout(STOP_WITHIN, handle)
        .await
        .expect("worker pool did not stop")
        .unwrap();
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_trigger_loop_stops_on_signal() {
    let storage = storage();
    let calendar = TriggerCalendar::from_config(&SchedulerConfig::default(), Utc::now()).unwrap();
    let triggers = TriggerLoop::new(
        calendar,
        TaskDispatcher::new(storage.clone(), 3),
        OperationLog::new(storage),
        90,
        std::time::Duration::from_secs(3600),
    );
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let handle = tokio::spawn(triggers.run(shutdown_rx));
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    shutdown_tx.send(true).unwrap();

    timeout(STOP_WITHIN, handle)
        .await
        .expect("trigger loop did not stop")
        .unwrap();
}

#[tokio::test]
async fn test_loops_started_after_signal_exit_immediately() {
    let storage = storage();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    shutdown_tx.send(true).unwrap();

    let calendar = TriggerCalendar::from_config(&SchedulerConfig::default(), Utc::now()).unwrap();
    let triggers = TriggerLoop::new(
        calendar,
        TaskDispatcher::new(storage.clone(), 3),
        OperationLog::new(storage),
        90,
        std::time::Duration::from_secs(3600),
    );

    timeout(STOP_WITHIN, triggers.run(shutdown_rx))
        .await
        .expect("trigger loop ignored an earlier signal");
}

#[tokio::test]
async fn test_admin_api_stops_on_signal() {
    let storage = storage();
    let state = AppState::new(
        TaskDispatcher::new(storage.clone(), 3),
        OperationLog::new(storage),
        Some(secret_string("admin-secret".to_string())),
    );
    let config = AdminConfig {
        enabled: true,
        bind_address: "127.0.0.1:0".to_string(),
        token: None,
    };
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let handle = tokio::spawn(async move { api::serve(&config, state, shutdown_rx).await });
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    shutdown_tx.send(true).unwrap();

    let result = timeout(STOP_WITHIN, handle)
        .await
        .expect("admin API did not stop")
        .unwrap();
    assert!(result.is_ok());
}
