//! Core business logic for Catalog Sync.
//!
//! # Modules
//!
//! - [`mapping`] - Pure field mapping between external records and catalog entities
//! - [`sync`] - Sync orchestration and inventory reconciliation
//! - [`oplog`] - Operation log (audit ledger) management
//! - [`scheduler`] - Task queue, retries, leases, workers and periodic triggers
//!
//! # Workflow
//!
//! 1. **Trigger**: the calendar or an admin call enqueues a [`scheduler::SyncTask`]
//! 2. **Claim**: a worker claims the task and takes the (kind, parameters) lease
//! 3. **Open**: the orchestrator opens a `running` operation record
//! 4. **Fetch**: one call to the external system returns the whole batch
//! 5. **Process**: each record is mapped and persisted independently
//! 6. **Close**: the record is closed `completed`, `partial` or `failed`
//! 7. **Retry**: a `failed` record or transient error schedules another attempt
//!
//! # Example
//!
//! ```rust,no_run
//! use catalog_sync::adapters::database::create_storage;
//! use catalog_sync::config::load_config;
//! use catalog_sync::core::sync::SyncOrchestrator;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("catalog-sync.toml")?;
//! let storage = create_storage(&config).await?;
//!
//! let orchestrator = SyncOrchestrator::from_config(&config, storage)?;
//! let record = orchestrator.sync_products().await?;
//!
//! println!("Processed: {}", record.processed);
//! println!("Succeeded: {}", record.succeeded);
//! println!("Failed: {}", record.failed);
//! # Ok(())
//! # }
//! ```

pub mod mapping;
pub mod oplog;
pub mod scheduler;
pub mod sync;
