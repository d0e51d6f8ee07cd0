//! Field mapping between external records and internal entities
//!
//! The mappers are pure: no I/O, no clock. Taxonomy resolution is the one
//! step that touches storage and lives in [`taxonomy`].

pub mod fields;
pub mod inventory;
pub mod order;
pub mod product;
pub mod slug;
pub mod taxonomy;

pub use inventory::map_inbound_inventory;
pub use order::map_outbound_order;
pub use product::{map_inbound_product, TaxonomyDefaults};
pub use slug::slugify;
pub use taxonomy::TaxonomyResolver;
