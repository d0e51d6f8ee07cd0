//! Storage abstraction layer
//!
//! Trait-based so the engine runs against PostgreSQL in production and the
//! in-memory backend in tests and local dry runs.

pub mod factory;
pub mod traits;

pub use factory::create_storage;
pub use traits::{
    CatalogStorage, EndpointStorage, InventoryStorage, LeaseStorage, OperationLogStorage,
    OrderStorage, StorageBackend, SyncStorage, TaskStorage,
};
