//! CLI interface and argument parsing

pub mod commands;

use clap::{Parser, Subcommand};

/// Catalog Sync - synchronizes a retail catalog with an external system of record
#[derive(Parser, Debug)]
#[command(name = "catalog-sync")]
#[command(version, about, long_about = None)]
#[command(author = "Catalog Sync Contributors")]
pub struct Cli {
    /// Path to configuration file
    #[arg(
        short,
        long,
        default_value = "catalog-sync.toml",
        env = "CATALOG_SYNC_CONFIG"
    )]
    pub config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "CATALOG_SYNC_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run workers, scheduled triggers and the admin API until stopped
    Serve(commands::serve::ServeArgs),

    /// Queue one operation for the workers
    Trigger(commands::trigger::TriggerArgs),

    /// Run one operation inline and print its record
    Run(commands::run::RunArgs),

    /// Inspect the operation log
    Operations(commands::operations::OperationsArgs),

    /// Show a queued or finished task
    Task(commands::task::TaskArgs),

    /// Cancel a queued task
    Cancel(commands::task::CancelArgs),

    /// Delete finished operation records past retention
    PurgeLogs(commands::purge::PurgeLogsArgs),

    /// Validate configuration file
    ValidateConfig(commands::validate::ValidateArgs),

    /// Initialize a new configuration file
    Init(commands::init::InitArgs),
}

impl Commands {
    /// Long-running commands log to files as configured; the rest stay on the console
    pub fn is_long_running(&self) -> bool {
        matches!(self, Commands::Serve(_))
    }
}
