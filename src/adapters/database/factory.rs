//! Storage backend factory

use crate::adapters::database::traits::SyncStorage;
use crate::adapters::memory::MemoryStorage;
use crate::adapters::postgresql::adapter::PostgreSQLAdapter;
use crate::adapters::postgresql::client::PostgreSQLClient;
use crate::config::schema::{CatalogSyncConfig, DatabaseTarget};
use crate::domain::{Result, SyncError};
use std::sync::Arc;

/// Create the storage backend selected by `database_target`
///
/// The schema is not touched here; call
/// [`StorageBackend::ensure_schema`](crate::adapters::database::StorageBackend::ensure_schema)
/// once at startup.
///
/// # Errors
///
/// Returns an error if the backend configuration is missing or the
/// connection pool cannot be created.
pub async fn create_storage(config: &CatalogSyncConfig) -> Result<Arc<dyn SyncStorage>> {
    match config.database_target {
        DatabaseTarget::PostgreSQL => {
            let pg_config = config.postgresql.as_ref().ok_or_else(|| {
                SyncError::Configuration(
                    "postgresql configuration is required when database_target = 'postgresql'"
                        .to_string(),
                )
            })?;

            tracing::info!("Creating PostgreSQL storage");
            let client = PostgreSQLClient::new(pg_config.clone()).await?;
            Ok(Arc::new(PostgreSQLAdapter::new(client)) as Arc<dyn SyncStorage>)
        }
        DatabaseTarget::Memory => {
            tracing::warn!("Using in-memory storage; nothing survives a restart");
            Ok(Arc::new(MemoryStorage::new()) as Arc<dyn SyncStorage>)
        }
    }
}
