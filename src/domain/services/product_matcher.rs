//! Canonical product matching and merge
//!
//! One shared [`ProductMatcher`] owns every write to the product catalog made
//! by the pipeline. Listings are matched on the exact (name, brand, gender)
//! key; merges for the same key are serialized through a per-key async lock.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::domain::listing::NormalizedListing;
use crate::domain::product::{CanonicalProduct, ProductKey, Source, SourceListing};
use crate::domain::repositories::{ProductRepository, StoreError};

#[derive(Error, Debug)]
pub enum MatchError {
    /// The aggregate could not be written; previously committed state is intact
    #[error("Merge conflict for {key}: {cause}")]
    MergeConflict {
        key: String,
        #[source]
        cause: StoreError,
    },

    #[error("Product lookup failed: {0}")]
    Lookup(#[from] StoreError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeAction {
    /// No product had this key; a new one was created
    Created,
    /// Existing product, first listing from this source
    ListingAdded,
    /// Existing product and source; listing updated in place
    ListingUpdated,
}

#[derive(Debug, Clone)]
pub struct MergeOutcome {
    pub product: CanonicalProduct,
    pub action: MergeAction,
}

pub struct ProductMatcher {
    products: Arc<dyn ProductRepository>,
    key_locks: Mutex<HashMap<ProductKey, Arc<Mutex<()>>>>,
}

impl ProductMatcher {
    pub fn new(products: Arc<dyn ProductRepository>) -> Self {
        Self {
            products,
            key_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Create-or-update the canonical product for `listing` and persist it
    pub async fn merge(
        &self,
        listing: &NormalizedListing,
        source: &Source,
    ) -> Result<MergeOutcome, MatchError> {
        let key = ProductKey::new(listing.title.clone(), listing.brand.clone(), listing.gender);
        let key_lock = self.lock_for(&key).await;
        let outcome = {
            let _guard = key_lock.lock().await;
            self.merge_locked(&key, listing, source).await
        };
        drop(key_lock);
        self.release_lock(&key).await;
        outcome
    }

    async fn merge_locked(
        &self,
        key: &ProductKey,
        listing: &NormalizedListing,
        source: &Source,
    ) -> Result<MergeOutcome, MatchError> {
        let existing = self.products.find_by_key(key).await?;
        let mut product = existing
            .unwrap_or_else(|| CanonicalProduct::new(key.clone(), &listing.product_type, Utc::now()));
        let action = apply_listing(&mut product, listing, source, Utc::now());

        match self.products.save_product(&product).await {
            Ok(saved) => {
                debug!("Merged {} from {} ({:?})", key, source.name, action);
                Ok(MergeOutcome {
                    product: saved,
                    action,
                })
            }
            // Another writer created the same key first; merge into theirs once
            Err(StoreError::Conflict(_)) if action == MergeAction::Created => {
                let Some(mut product) = self.products.find_by_key(key).await? else {
                    return Err(MatchError::MergeConflict {
                        key: key.to_string(),
                        cause: StoreError::NotFound(key.to_string()),
                    });
                };
                let action = apply_listing(&mut product, listing, source, Utc::now());
                let saved = self.products.save_product(&product).await.map_err(|cause| {
                    MatchError::MergeConflict {
                        key: key.to_string(),
                        cause,
                    }
                })?;
                Ok(MergeOutcome {
                    product: saved,
                    action,
                })
            }
            Err(cause) => {
                warn!("Merge of {} from {} abandoned: {}", key, source.name, cause);
                Err(MatchError::MergeConflict {
                    key: key.to_string(),
                    cause,
                })
            }
        }
    }

    async fn lock_for(&self, key: &ProductKey) -> Arc<Mutex<()>> {
        let mut locks = self.key_locks.lock().await;
        Arc::clone(locks.entry(key.clone()).or_default())
    }

    async fn release_lock(&self, key: &ProductKey) {
        let mut locks = self.key_locks.lock().await;
        if locks.get(key).is_some_and(|l| Arc::strong_count(l) == 1) {
            locks.remove(key);
        }
    }
}

/// Fold one listing into `product` in memory.
///
/// Descriptive fields are only filled when empty. `last_checked` of an updated
/// listing always moves forward, even when the clock does not.
pub fn apply_listing(
    product: &mut CanonicalProduct,
    listing: &NormalizedListing,
    source: &Source,
    now: DateTime<Utc>,
) -> MergeAction {
    let created = product.id.is_none() && product.listings.is_empty();

    if product.description.is_none() {
        product.description = Some(listing.title.clone());
    }
    if product.images.is_empty() {
        product.images.extend(listing.image_url.iter().cloned());
    }
    product.updated_at = now.max(product.updated_at);

    if let Some(existing) = product.listings.iter_mut().find(|l| l.source_id == source.id) {
        existing.price = listing.price;
        existing.original_price = listing.original_price;
        existing.in_stock = listing.in_stock;
        existing.rating = listing.rating;
        existing.rating_count = listing.rating_count;
        if listing.listing_url.is_some() {
            existing.source_url.clone_from(&listing.listing_url);
        }
        existing.last_checked = now.max(existing.last_checked + Duration::microseconds(1));
        return MergeAction::ListingUpdated;
    }

    product.listings.push(SourceListing {
        source_id: source.id,
        source_name: source.name.clone(),
        source_product_id: listing.id.clone(),
        source_url: listing.listing_url.clone(),
        price: listing.price,
        original_price: listing.original_price,
        in_stock: listing.in_stock,
        rating: listing.rating,
        rating_count: listing.rating_count,
        last_checked: now,
    });

    if created {
        MergeAction::Created
    } else {
        MergeAction::ListingAdded
    }
}
