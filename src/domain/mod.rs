//! Domain models and types for Catalog Sync.
//!
//! # Overview
//!
//! The domain layer provides:
//! - **Strongly-typed identifiers** ([`Sku`], [`OperationId`], [`TaskId`], ...)
//! - **Catalog, inventory and order models** the engine reads and writes
//! - **The operation ledger model** ([`OperationRecord`])
//! - **Error types** ([`SyncError`], [`TransportError`]) and the [`Result`] alias
//!
//! # Type Safety
//!
//! ```rust
//! use catalog_sync::domain::{OperationId, TaskId};
//!
//! let op = OperationId::new();
//! let task = TaskId::new();
//! // let wrong: OperationId = task;  // Compile error!
//! # let _ = (op, task);
//! ```

pub mod catalog;
pub mod errors;
pub mod ids;
pub mod inventory;
pub mod operation;
pub mod order;
pub mod result;

// Re-export commonly used types for convenience
pub use catalog::{CatalogItem, ProductDraft, Taxon, TaxonomyKind};
pub use errors::{SyncError, TransportError};
pub use ids::{ItemId, OperationId, OrderId, Sku, StoreId, TaskId, TaxonId};
pub use inventory::{
    InventoryDraft, InventoryKey, InventoryLevel, InventoryMovement, MovementKind, Store,
};
pub use operation::{
    OperationFilter, OperationKind, OperationParams, OperationRecord, OperationStatus,
};
pub use order::{ExportReceipt, ExportWindow, OrderExportCandidate, OrderStatus};
pub use result::Result;
