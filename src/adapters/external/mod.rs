//! External system of record ("gestionale") integration
//!
//! - [`client`] - HTTP client bound to one configured endpoint
//! - [`models`] - Request paths, response envelopes and the outbound order body

pub mod client;
pub mod models;

pub use client::{ExternalSystem, ExternalSystemClient};
pub use models::{envelope_records, inventory_path, OrderAck, ORDERS_PATH, PRODUCTS_PATH};
