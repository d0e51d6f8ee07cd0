//! Operations command implementation
//!
//! Read-only view over the operation log.

use super::{connect_storage, load_or_report, print_record};
use crate::core::oplog::OperationLog;
use crate::domain::{OperationFilter, OperationId, OperationKind, OperationStatus};
use clap::{Args, Subcommand};

/// Arguments for the operations command
#[derive(Args, Debug)]
pub struct OperationsArgs {
    #[command(subcommand)]
    pub command: OperationsCommand,
}

#[derive(Subcommand, Debug)]
pub enum OperationsCommand {
    /// List operation records, newest first
    List {
        /// Only this operation kind
        #[arg(long)]
        kind: Option<OperationKind>,

        /// Only this status (pending, running, completed, partial, failed)
        #[arg(long)]
        status: Option<OperationStatus>,

        /// Maximum number of records
        #[arg(long, default_value_t = OperationFilter::DEFAULT_LIMIT)]
        limit: usize,
    },

    /// Show one operation record with its messages
    Show {
        /// Operation id
        id: OperationId,
    },
}

impl OperationsArgs {
    /// Execute the operations command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        let config = match load_or_report(config_path) {
            Ok(c) => c,
            Err(code) => return Ok(code),
        };
        let storage = match connect_storage(&config).await {
            Ok(s) => s,
            Err(code) => return Ok(code),
        };
        let oplog = OperationLog::new(storage);

        match &self.command {
            OperationsCommand::List {
                kind,
                status,
                limit,
            } => {
                let filter = OperationFilter {
                    kind: *kind,
                    status: *status,
                    limit: Some(*limit),
                };
                let records = match oplog.list(&filter).await {
                    Ok(r) => r,
                    Err(e) => {
                        eprintln!("❌ Failed to list operations: {e}");
                        return Ok(4);
                    }
                };

                if records.is_empty() {
                    println!("No operations found.");
                    return Ok(0);
                }

                println!(
                    "{:<38} {:<16} {:<10} {:>9} {:>9} {:>7} {:<20}",
                    "Operation", "Kind", "Status", "Processed", "Succeeded", "Failed", "Started"
                );
                println!("{}", "-".repeat(115));
                for record in records {
                    let started = record
                        .started_at
                        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                        .unwrap_or_else(|| "-".to_string());
                    println!(
                        "{:<38} {:<16} {:<10} {:>9} {:>9} {:>7} {:<20}",
                        record.id.to_string(),
                        record.kind.as_str(),
                        record.status.as_str(),
                        record.processed,
                        record.succeeded,
                        record.failed,
                        started
                    );
                }
                Ok(0)
            }
            OperationsCommand::Show { id } => match oplog.get(id).await {
                Ok(Some(record)) => {
                    print_record(&record);
                    Ok(0)
                }
                Ok(None) => {
                    eprintln!("❌ Operation {id} not found");
                    Ok(5)
                }
                Err(e) => {
                    eprintln!("❌ Failed to load operation: {e}");
                    Ok(4)
                }
            },
        }
    }
}
