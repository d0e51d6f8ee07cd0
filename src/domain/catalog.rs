//! Catalog entities: items and their category/brand taxonomy

use crate::domain::ids::{ItemId, Sku, TaxonId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Which taxonomy a [`Taxon`] belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaxonomyKind {
    Category,
    Brand,
}

impl TaxonomyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaxonomyKind::Category => "category",
            TaxonomyKind::Brand => "brand",
        }
    }
}

impl fmt::Display for TaxonomyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaxonomyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "category" => Ok(TaxonomyKind::Category),
            "brand" => Ok(TaxonomyKind::Brand),
            other => Err(format!("Unknown taxonomy kind: {other}")),
        }
    }
}

/// A category or a brand
///
/// Taxa are created on first reference by external data and are unique by
/// `(kind, name)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Taxon {
    pub id: TaxonId,
    pub kind: TaxonomyKind,
    pub name: String,
    pub slug: String,
}

/// Internal product representation, upserted by SKU
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub id: ItemId,
    pub sku: Sku,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub short_description: String,
    pub category_id: TaxonId,
    pub brand_id: TaxonId,
    pub price: Decimal,
    pub cost_price: Decimal,
    pub attributes: Map<String, Value>,
    pub active: bool,
    pub weight: Option<Decimal>,
    pub updated_at: DateTime<Utc>,
}

impl CatalogItem {
    /// Whether every field an upsert overwrites already holds the same value
    ///
    /// Used to tell a no-op re-sync from a real change.
    pub fn same_content(&self, other: &CatalogItem) -> bool {
        self.sku == other.sku
            && self.name == other.name
            && self.slug == other.slug
            && self.description == other.description
            && self.short_description == other.short_description
            && self.category_id == other.category_id
            && self.brand_id == other.brand_id
            && self.price == other.price
            && self.cost_price == other.cost_price
            && self.attributes == other.attributes
            && self.active == other.active
            && self.weight == other.weight
    }
}

/// Output of the inbound product mapper, before taxonomy resolution
///
/// Category and brand are still names here; the taxonomy resolver turns them
/// into ids at the persistence boundary.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductDraft {
    pub sku: Sku,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub short_description: String,
    pub category_name: String,
    pub brand_name: String,
    pub price: Decimal,
    pub cost_price: Decimal,
    pub attributes: Map<String, Value>,
    pub active: bool,
    pub weight: Option<Decimal>,
}
