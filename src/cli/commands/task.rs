//! Task and cancel command implementations

use super::{connect_storage, load_or_report};
use crate::core::scheduler::{SyncTask, TaskDispatcher};
use crate::domain::TaskId;
use clap::Args;

/// Arguments for the task command
#[derive(Args, Debug)]
pub struct TaskArgs {
    /// Task id returned by `trigger` or the admin API
    pub id: TaskId,
}

/// Arguments for the cancel command
#[derive(Args, Debug)]
pub struct CancelArgs {
    /// Task id of a queued task
    pub id: TaskId,
}

async fn dispatcher(config_path: &str) -> Result<TaskDispatcher, i32> {
    let config = load_or_report(config_path)?;
    let storage = connect_storage(&config).await?;
    Ok(TaskDispatcher::new(storage, config.scheduler.max_attempts))
}

fn print_task(task: &SyncTask) {
    println!("Task {}", task.id);
    println!("  Kind: {}", task.kind);
    println!("  Status: {}", task.status);
    println!("  Attempts: {}/{}", task.attempts, task.max_attempts);
    if !task.is_terminal() {
        println!(
            "  Next Eligible: {}",
            task.next_eligible_at.format("%Y-%m-%d %H:%M:%S")
        );
    }
    if let Some(ref error) = task.last_error {
        println!("  Last Error: {error}");
    }
    for id in &task.operation_ids {
        println!("  Operation: {id}");
    }
}

impl TaskArgs {
    /// Execute the task command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        let dispatcher = match dispatcher(config_path).await {
            Ok(d) => d,
            Err(code) => return Ok(code),
        };
        match dispatcher.get(&self.id).await {
            Ok(Some(task)) => {
                print_task(&task);
                Ok(0)
            }
            Ok(None) => {
                eprintln!("❌ Task {} not found", self.id);
                Ok(5)
            }
            Err(e) => {
                eprintln!("❌ Failed to load task: {e}");
                Ok(4)
            }
        }
    }
}

impl CancelArgs {
    /// Execute the cancel command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        let dispatcher = match dispatcher(config_path).await {
            Ok(d) => d,
            Err(code) => return Ok(code),
        };
        match dispatcher.cancel(&self.id).await {
            Ok(true) => {
                println!("✅ Task {} cancelled", self.id);
                Ok(0)
            }
            Ok(false) => {
                match dispatcher.get(&self.id).await {
                    Ok(Some(task)) => {
                        eprintln!("❌ Task {} is {} and cannot be cancelled", self.id, task.status)
                    }
                    _ => eprintln!("❌ Task {} not found", self.id),
                }
                Ok(5)
            }
            Err(e) => {
                eprintln!("❌ Failed to cancel task: {e}");
                Ok(4)
            }
        }
    }
}
