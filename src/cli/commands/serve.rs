//! Serve command implementation
//!
//! Runs the long-lived engine: worker pool, periodic triggers and the admin
//! API, until a shutdown signal arrives.

use super::{connect_storage, load_or_report};
use crate::api::{self, AppState};
use crate::core::oplog::OperationLog;
use crate::core::scheduler::{
    alert_sink, ConfiguredRunner, RetryPolicy, TaskDispatcher, TriggerCalendar, TriggerLoop,
    WorkerPool, WorkerSettings,
};
use chrono::Utc;
use clap::Args;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Arguments for the serve command
#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Don't fire the scheduled triggers (workers and admin API still run)
    #[arg(long)]
    pub no_triggers: bool,

    /// Don't start the admin API
    #[arg(long)]
    pub no_admin: bool,
}

impl ServeArgs {
    /// Execute the serve command
    pub async fn execute(
        &self,
        config_path: &str,
        shutdown_signal: watch::Receiver<bool>,
    ) -> anyhow::Result<i32> {
        let config = match load_or_report(config_path) {
            Ok(c) => Arc::new(c),
            Err(code) => return Ok(code),
        };

        let storage = match connect_storage(&config).await {
            Ok(s) => s,
            Err(code) => return Ok(code),
        };
        if let Err(e) = storage.ensure_schema().await {
            tracing::error!(error = %e, "Failed to initialize schema");
            eprintln!("❌ Failed to initialize schema: {e}");
            return Ok(4);
        }

        let alerts = match alert_sink(&config.alerts) {
            Ok(a) => a,
            Err(e) => {
                eprintln!("❌ Invalid alert configuration: {e}");
                return Ok(2);
            }
        };

        let calendar = if config.scheduler.triggers_enabled && !self.no_triggers {
            match TriggerCalendar::from_config(&config.scheduler, Utc::now()) {
                Ok(c) => Some(c),
                Err(e) => {
                    eprintln!("❌ Invalid trigger schedule: {e}");
                    return Ok(2);
                }
            }
        } else {
            None
        };

        let dispatcher = TaskDispatcher::new(storage.clone(), config.scheduler.max_attempts);
        let oplog = OperationLog::new(storage.clone());
        let pool = Arc::new(WorkerPool::new(
            storage.clone(),
            Arc::new(ConfiguredRunner::new(config.clone(), storage.clone())),
            alerts,
            RetryPolicy::from_config(&config.scheduler),
            WorkerSettings::from_config(&config),
        ));

        tracing::info!(
            backend = storage.backend_name(),
            workers = config.scheduler.workers,
            "Catalog Sync engine starting"
        );
        println!("🚀 Catalog Sync running (Ctrl+C to stop)");

        let workers = tokio::spawn(pool.run(shutdown_signal.clone()));

        let triggers = calendar.map(|calendar| {
            let trigger_loop = TriggerLoop::new(
                calendar,
                dispatcher.clone(),
                oplog.clone(),
                config.retention.operation_log_days,
                Duration::from_secs(config.scheduler.poll_interval_seconds.max(1)),
            );
            tokio::spawn(trigger_loop.run(shutdown_signal.clone()))
        });

        if config.admin.enabled && !self.no_admin {
            let state = AppState::new(dispatcher, oplog, config.admin.token.clone());
            if let Err(e) = api::serve(&config.admin, state, shutdown_signal.clone()).await {
                tracing::error!(error = %e, "Admin API failed");
                eprintln!("❌ Admin API failed: {e}");
                return Ok(5);
            }
        }

        let mut shutdown = shutdown_signal;
        while !*shutdown.borrow() {
            if shutdown.changed().await.is_err() {
                break;
            }
        }

        if let Some(handle) = triggers {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Trigger loop panicked");
            }
        }
        match workers.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!(error = %e, "Worker pool failed"),
            Err(e) => tracing::error!(error = %e, "Worker pool panicked"),
        }

        println!("✅ Catalog Sync stopped");
        Ok(0)
    }
}
