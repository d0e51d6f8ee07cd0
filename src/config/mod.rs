//! Configuration management for Catalog Sync.
//!
//! This module provides TOML-based configuration loading, parsing, and validation.
//!
//! # Overview
//!
//! Catalog Sync uses TOML configuration files with support for:
//! - Environment variable substitution (`${VAR_NAME}`)
//! - `CATALOG_SYNC_<SECTION>_<KEY>` environment overrides
//! - Default values for optional settings
//! - Validation on load
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use catalog_sync::config::load_config;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("catalog-sync.toml")?;
//!
//! println!("Syncing against: {}", config.sync.system);
//! println!("Workers: {}", config.scheduler.workers);
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration Structure
//!
//! - [`ApplicationConfig`] - Log level
//! - [`ExternalSystemConfig`] - External endpoints and their credentials
//! - [`SyncConfig`] - Which endpoint to use and mapping defaults
//! - [`SchedulerConfig`] - Workers, retry policy, lease and trigger times
//! - [`RetentionConfig`] - Operation log retention
//! - [`PostgreSQLConfig`] - Storage connection
//! - [`AdminConfig`] - Admin trigger API
//! - [`AlertConfig`] - Operator alerts
//! - [`LoggingConfig`] - Local log files
//!
//! # Example Configuration
//!
//! ```toml
//! database_target = "postgresql"
//!
//! [[external_systems]]
//! name = "gestionale"
//! base_url = "https://erp.example.com/api/v1"
//! api_key = "${GESTIONALE_API_KEY}"
//!
//! [sync]
//! system = "gestionale"
//!
//! [postgresql]
//! connection_string = "${CATALOG_SYNC_PG_URL}"
//!
//! [admin]
//! token = "${CATALOG_SYNC_ADMIN_TOKEN}"
//! ```

pub mod loader;
pub mod schema;
pub mod secret;

// Re-export commonly used types
pub use loader::load_config;
pub use schema::{
    AdminConfig, AlertConfig, ApplicationConfig, CatalogSyncConfig, DatabaseTarget,
    ExternalSystemConfig, LoggingConfig, PostgreSQLConfig, RetentionConfig, SchedulerConfig,
    SyncConfig,
};
pub use secret::{secret_string, secret_string_opt, SecretString, SecretValue};
