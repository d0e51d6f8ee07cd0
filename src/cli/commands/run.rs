//! Run command implementation
//!
//! Executes one invocation inline, under the same lease the workers use,
//! and prints the resulting operation record.

use super::{connect_storage, load_or_report, print_record, OperationArgs};
use crate::adapters::database::EndpointStorage;
use crate::core::scheduler::LeaseGuard;
use crate::core::sync::SyncOrchestrator;
use crate::domain::{OperationStatus, SyncError};
use chrono::Utc;
use clap::Args;
use std::time::Duration;

/// Arguments for the run command
#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub operation: OperationArgs,
}

impl RunArgs {
    /// Execute the run command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        let kind = self.operation.kind;
        let parameters = match self.operation.parameters() {
            Ok(p) => p,
            Err(e) => {
                eprintln!("❌ {e}");
                return Ok(2);
            }
        };

        let config = match load_or_report(config_path) {
            Ok(c) => c,
            Err(code) => return Ok(code),
        };
        let storage = match connect_storage(&config).await {
            Ok(s) => s,
            Err(code) => return Ok(code),
        };
        if let Err(e) = storage.ensure_schema().await {
            eprintln!("❌ Failed to initialize schema: {e}");
            return Ok(4);
        }

        let orchestrator = match SyncOrchestrator::from_config(&config, storage.clone()) {
            Ok(o) => o,
            Err(e) => {
                tracing::error!(error = %e, "Cannot resolve external system");
                eprintln!("❌ {e}");
                return Ok(2);
            }
        };

        let holder = format!("cli-{}", std::process::id());
        let ttl = Duration::from_secs(config.scheduler.lease_ttl_seconds);
        let lease = match LeaseGuard::acquire(storage.clone(), kind, &parameters, &holder, ttl).await
        {
            Ok(Some(lease)) => lease,
            Ok(None) => {
                println!("⏸️  Another {kind} with the same parameters is running; try again later");
                return Ok(3);
            }
            Err(e) => {
                eprintln!("❌ Failed to take the lease: {e}");
                return Ok(4);
            }
        };

        println!("🚀 Running {kind}...");
        let outcome = orchestrator.run(kind, &parameters).await;
        if let Err(e) = lease.release().await {
            tracing::warn!(error = %e, "Failed to release lease");
        }

        let record = match outcome {
            Ok(record) => record,
            Err(e @ (SyncError::Configuration(_) | SyncError::Validation(_))) => {
                eprintln!("❌ {e}");
                return Ok(2);
            }
            Err(e) => {
                tracing::error!(error = %e, "Operation failed");
                eprintln!("❌ {kind} failed: {e}");
                return Ok(5);
            }
        };

        println!();
        print_record(&record);
        println!();

        if record.status != OperationStatus::Failed {
            if let Err(e) = storage
                .record_endpoint_sync(orchestrator.system_name(), Utc::now())
                .await
            {
                tracing::warn!(error = %e, "Failed to record endpoint sync");
            }
        }

        Ok(match record.status {
            OperationStatus::Completed => {
                println!("✅ {kind} completed");
                0
            }
            OperationStatus::Partial => {
                println!("⚠️  {kind} completed with {} failed record(s)", record.failed);
                3
            }
            _ => {
                println!("❌ {kind} failed");
                3
            }
        })
    }
}
