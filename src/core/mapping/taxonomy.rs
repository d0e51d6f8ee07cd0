//! Category and brand resolution at the persistence boundary
//!
//! External products name their category and brand; the catalog stores ids.
//! Unknown names are created on first reference, so the taxonomy grows with
//! the external data. Creation is an explicit, idempotent find-or-create.

use super::slug::slugify;
use crate::adapters::database::CatalogStorage;
use crate::domain::{CatalogItem, ItemId, ProductDraft, Result, Taxon, TaxonomyKind};
use chrono::Utc;
use std::collections::HashMap;

/// Turns drafts into catalog items, remembering taxa seen in this batch
#[derive(Debug, Default)]
pub struct TaxonomyResolver {
    seen: HashMap<(TaxonomyKind, String), Taxon>,
}

impl TaxonomyResolver {
    pub fn new() -> Self {
        Self::default()
    }

    async fn taxon<S>(&mut self, storage: &S, kind: TaxonomyKind, name: &str) -> Result<Taxon>
    where
        S: CatalogStorage + ?Sized,
    {
        let cache_key = (kind, name.to_string());
        if let Some(taxon) = self.seen.get(&cache_key) {
            return Ok(taxon.clone());
        }

        let taxon = storage
            .find_or_create_taxon(kind, name, &slugify(name))
            .await?;
        self.seen.insert(cache_key, taxon.clone());
        Ok(taxon)
    }

    /// Resolves category and brand, then builds the item to upsert
    ///
    /// The item id is fresh; storage keeps the existing id when the SKU is
    /// already known.
    pub async fn resolve<S>(&mut self, storage: &S, draft: ProductDraft) -> Result<CatalogItem>
    where
        S: CatalogStorage + ?Sized,
    {
        let category = self
            .taxon(storage, TaxonomyKind::Category, &draft.category_name)
            .await?;
        let brand = self
            .taxon(storage, TaxonomyKind::Brand, &draft.brand_name)
            .await?;

        Ok(CatalogItem {
            id: ItemId::new(),
            sku: draft.sku,
            name: draft.name,
            slug: draft.slug,
            description: draft.description,
            short_description: draft.short_description,
            category_id: category.id,
            brand_id: brand.id,
            price: draft.price,
            cost_price: draft.cost_price,
            attributes: draft.attributes,
            active: draft.active,
            weight: draft.weight,
            updated_at: Utc::now(),
        })
    }
}
