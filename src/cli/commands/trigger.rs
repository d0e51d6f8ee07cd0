//! Trigger command implementation
//!
//! Queues one invocation for the workers of a running `serve` and prints the
//! task handle. Needs a shared (PostgreSQL) backend to be useful.

use super::{connect_storage, load_or_report, OperationArgs};
use crate::core::scheduler::TaskDispatcher;
use clap::Args;

/// Arguments for the trigger command
#[derive(Args, Debug)]
pub struct TriggerArgs {
    #[command(flatten)]
    pub operation: OperationArgs,
}

impl TriggerArgs {
    /// Execute the trigger command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
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

        let dispatcher = TaskDispatcher::new(storage, config.scheduler.max_attempts);
        match dispatcher.trigger(self.operation.kind, parameters).await {
            Ok(task) => {
                println!("✅ {} queued", task.kind);
                println!("   Task: {}", task.id);
                Ok(0)
            }
            Err(e) if e.is_configuration() || matches!(e, crate::domain::SyncError::Validation(_)) => {
                eprintln!("❌ {e}");
                Ok(2)
            }
            Err(e) => {
                eprintln!("❌ Failed to queue task: {e}");
                Ok(4)
            }
        }
    }
}
