//! Integrations with systems outside the engine.
//!
//! - [`external`] - HTTP client for the external system of record
//! - [`database`] - Storage abstraction (trait-based) and backend factory
//! - [`postgresql`] - PostgreSQL implementation of the storage traits
//! - [`memory`] - In-process implementation for tests and dry runs
//!
//! # Design Pattern
//!
//! Adapters isolate external dependencies so the engine can be tested with
//! in-memory or scripted implementations. The engine only sees the
//! [`external::ExternalSystem`] and [`database::SyncStorage`] traits.
//!
//! ```rust,no_run
//! use catalog_sync::adapters::external::{ExternalSystem, ExternalSystemClient};
//! use catalog_sync::config::load_config;
//! use reqwest::Method;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("catalog-sync.toml")?;
//! let client = ExternalSystemClient::resolve(&config.external_systems, &config.sync.system)?;
//! let products = client.execute(Method::GET, "/api/products", None).await?;
//! # let _ = products;
//! # Ok(())
//! # }
//! ```

pub mod database;
pub mod external;
pub mod memory;
pub mod postgresql;
