//! Batch synchronization against the external system
//!
//! - [`orchestrator`] - Product sync, inventory sync and order export
//! - [`reconciler`] - Inventory level writes with movement ledger entries
//! - [`batch`] - Per-invocation counters
//! - [`params`] - Operation parameter keys

pub mod batch;
pub mod orchestrator;
pub mod params;
pub mod reconciler;

pub use batch::BatchTally;
pub use orchestrator::{SyncOrchestrator, SyncSettings};
pub use reconciler::{InventoryReconciler, LevelUpdate, Reconciled, ReconciliationPlan};
