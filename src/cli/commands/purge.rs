//! Purge-logs command implementation

use super::{connect_storage, load_or_report};
use crate::core::oplog::OperationLog;
use chrono::Utc;
use clap::Args;

/// Arguments for the purge-logs command
#[derive(Args, Debug)]
pub struct PurgeLogsArgs {
    /// Retention in days; defaults to `retention.operation_log_days`
    #[arg(long)]
    pub days: Option<u32>,
}

impl PurgeLogsArgs {
    /// Execute the purge-logs command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        let config = match load_or_report(config_path) {
            Ok(c) => c,
            Err(code) => return Ok(code),
        };
        let days = self.days.unwrap_or(config.retention.operation_log_days);
        if days == 0 {
            eprintln!("❌ Retention must be at least one day");
            return Ok(2);
        }

        let storage = match connect_storage(&config).await {
            Ok(s) => s,
            Err(code) => return Ok(code),
        };

        match OperationLog::new(storage).purge_older_than(days, Utc::now()).await {
            Ok(purged) => {
                println!("🧹 Purged {purged} operation record(s) older than {days} days");
                Ok(0)
            }
            Err(e) => {
                eprintln!("❌ Purge failed: {e}");
                Ok(4)
            }
        }
    }
}
