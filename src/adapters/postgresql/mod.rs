//! PostgreSQL storage backend
//!
//! The production backend. Task claiming relies on `FOR UPDATE SKIP LOCKED`
//! and leases on conditional upserts, so several processes can share one
//! database.

pub mod adapter;
pub mod client;
pub mod models;

pub use adapter::PostgreSQLAdapter;
pub use client::PostgreSQLClient;
