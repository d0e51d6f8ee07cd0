// Catalog Sync - External system synchronization engine
// Copyright (c) 2025 Catalog Sync Contributors
// Licensed under the MIT License

//! # Catalog Sync - External system synchronization engine
//!
//! Catalog Sync keeps a retail catalog in step with an external system of
//! record (a "gestionale"): products and stock flow in, orders flow out.
//!
//! ## Overview
//!
//! This library provides the core functionality for:
//! - **Importing** products from the external system, creating categories and
//!   brands on first reference
//! - **Reconciling** stock levels, recording every change as an inventory movement
//! - **Exporting** confirmed orders, with receipts so an order is never posted twice
//! - **Auditing** every invocation in an operation log
//! - **Scheduling** invocations as durable tasks with bounded retries and leases
//!
//! ## Architecture
//!
//! - [`cli`] - Command-line interface and argument parsing
//! - [`api`] - Admin HTTP trigger surface
//! - [`core`] - Business logic (mapping, sync, operation log, scheduler)
//! - [`adapters`] - External system client and storage backends
//! - [`domain`] - Core domain types and models
//! - [`config`] - Configuration management
//! - [`logging`] - Structured logging and observability
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use catalog_sync::adapters::database::create_storage;
//! use catalog_sync::config::load_config;
//! use catalog_sync::core::sync::SyncOrchestrator;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = load_config("catalog-sync.toml")?;
//!     let storage = create_storage(&config).await?;
//!     storage.ensure_schema().await?;
//!
//!     let orchestrator = SyncOrchestrator::from_config(&config, storage)?;
//!     let record = orchestrator.sync_inventory(None).await?;
//!
//!     println!("{}: {} processed, {} failed", record.status, record.processed, record.failed);
//!     Ok(())
//! }
//! ```
//!
//! ## Inventory Movements
//!
//! Stock is never overwritten silently. Each change writes an
//! [`InventoryMovement`](domain::InventoryMovement) first, so folding the
//! movements of a (store, item, variant) from zero gives the stored quantity:
//!
//! ```rust
//! use catalog_sync::domain::inventory::replay_quantity;
//!
//! assert_eq!(replay_quantity(&[]), 0);
//! ```
//!
//! ## Error Handling
//!
//! Every fallible operation returns [`domain::Result`], whose error is
//! [`domain::SyncError`]. The scheduler uses
//! [`SyncError::is_retryable`](domain::SyncError::is_retryable) to decide
//! between another attempt and an operator alert.
//!
//! ## Logging
//!
//! Structured logging with the `tracing` crate:
//!
//! ```rust,no_run
//! use tracing::{info, warn};
//!
//! info!(kind = "inventory_sync", "Starting sync");
//! warn!(sku = "SKU-1", "Record skipped");
//! ```

pub mod adapters;
pub mod api;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod logging;
