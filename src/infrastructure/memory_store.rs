//! In-memory catalog store
//!
//! Implements the repository traits over a single `RwLock`ed state. Used by
//! tests and for embedding the pipeline without a database.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::domain::product::{
    CanonicalProduct, NewReview, NewSource, ProductKey, RatingSummary, Review, Source,
};
use crate::domain::repositories::{
    ProductRepository, ReviewRepository, SourceRepository, StoreError, StoreResult,
};

#[derive(Debug, Default)]
struct CatalogState {
    products: HashMap<i64, CanonicalProduct>,
    by_key: HashMap<ProductKey, i64>,
    sources: Vec<Source>,
    reviews: Vec<Review>,
    next_product_id: i64,
    next_source_id: i64,
    next_review_id: i64,
}

#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    state: RwLock<CatalogState>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }
}

fn ensure_unique_sources(product: &CanonicalProduct) -> StoreResult<()> {
    for (i, listing) in product.listings.iter().enumerate() {
        if product.listings[..i]
            .iter()
            .any(|l| l.source_id == listing.source_id)
        {
            return Err(StoreError::Conflict(format!(
                "duplicate listing for product {} and source {}",
                product.key(),
                listing.source_id
            )));
        }
    }
    Ok(())
}

#[async_trait]
impl ProductRepository for InMemoryCatalog {
    async fn find_by_key(&self, key: &ProductKey) -> StoreResult<Option<CanonicalProduct>> {
        let state = self.state.read().await;
        Ok(state
            .by_key
            .get(key)
            .and_then(|id| state.products.get(id))
            .cloned())
    }

    async fn find_by_id(&self, id: i64) -> StoreResult<Option<CanonicalProduct>> {
        Ok(self.state.read().await.products.get(&id).cloned())
    }

    async fn save_product(&self, product: &CanonicalProduct) -> StoreResult<CanonicalProduct> {
        ensure_unique_sources(product)?;
        let key = product.key();
        let mut state = self.state.write().await;

        let id = match product.id {
            Some(id) => {
                let Some(stored) = state.products.get(&id) else {
                    return Err(StoreError::NotFound(format!("product {id}")));
                };
                if stored.key() != key {
                    if state.by_key.contains_key(&key) {
                        return Err(StoreError::Conflict(format!("product key {key} exists")));
                    }
                    let old_key = stored.key();
                    state.by_key.remove(&old_key);
                }
                id
            }
            None => {
                if state.by_key.contains_key(&key) {
                    return Err(StoreError::Conflict(format!("product key {key} exists")));
                }
                state.next_product_id += 1;
                state.next_product_id
            }
        };

        let mut saved = product.clone();
        saved.id = Some(id);
        state.by_key.insert(key, id);
        state.products.insert(id, saved.clone());
        Ok(saved)
    }

    async fn list_products(&self) -> StoreResult<Vec<CanonicalProduct>> {
        let state = self.state.read().await;
        let mut products: Vec<CanonicalProduct> = state.products.values().cloned().collect();
        products.sort_by_key(|p| p.id);
        Ok(products)
    }

    async fn delete_product(&self, id: i64) -> StoreResult<bool> {
        let mut state = self.state.write().await;
        let Some(product) = state.products.remove(&id) else {
            return Ok(false);
        };
        state.by_key.remove(&product.key());
        state.reviews.retain(|r| r.product_id != id);
        Ok(true)
    }
}

#[async_trait]
impl SourceRepository for InMemoryCatalog {
    async fn find_source_by_name(&self, name: &str) -> StoreResult<Option<Source>> {
        let state = self.state.read().await;
        Ok(state.sources.iter().find(|s| s.name == name).cloned())
    }

    async fn find_source_by_id(&self, id: i64) -> StoreResult<Option<Source>> {
        let state = self.state.read().await;
        Ok(state.sources.iter().find(|s| s.id == id).cloned())
    }

    async fn create_source(&self, source: &NewSource) -> StoreResult<Source> {
        let mut state = self.state.write().await;
        if state.sources.iter().any(|s| s.name == source.name) {
            return Err(StoreError::Conflict(format!("source {} exists", source.name)));
        }

        state.next_source_id += 1;
        let now = Utc::now();
        let created = Source {
            id: state.next_source_id,
            name: source.name.clone(),
            base_url: source.base_url.clone(),
            logo_url: source.logo_url.clone(),
            is_active: source.is_active,
            search_endpoint: source.search_endpoint.clone(),
            product_endpoint: source.product_endpoint.clone(),
            created_at: now,
            updated_at: now,
        };
        state.sources.push(created.clone());
        Ok(created)
    }

    async fn list_sources(&self, active_only: bool) -> StoreResult<Vec<Source>> {
        let state = self.state.read().await;
        Ok(state
            .sources
            .iter()
            .filter(|s| !active_only || s.is_active)
            .cloned()
            .collect())
    }

    async fn set_source_active(&self, id: i64, active: bool) -> StoreResult<bool> {
        let mut state = self.state.write().await;
        let Some(source) = state.sources.iter_mut().find(|s| s.id == id) else {
            return Ok(false);
        };
        source.is_active = active;
        source.updated_at = Utc::now();
        Ok(true)
    }
}

#[async_trait]
impl ReviewRepository for InMemoryCatalog {
    async fn add_review(&self, review: &NewReview) -> StoreResult<Review> {
        let mut state = self.state.write().await;
        if !state.products.contains_key(&review.product_id) {
            return Err(StoreError::NotFound(format!("product {}", review.product_id)));
        }

        state.next_review_id += 1;
        let created = Review {
            id: state.next_review_id,
            product_id: review.product_id,
            source_id: review.source_id,
            reviewer_name: review.reviewer_name.clone(),
            rating: review.rating,
            title: review.title.clone(),
            content: review.content.clone(),
            source_review_id: review.source_review_id.clone(),
            review_date: review.review_date,
            created_at: Utc::now(),
        };
        state.reviews.push(created.clone());
        Ok(created)
    }

    async fn reviews_for_product(&self, product_id: i64) -> StoreResult<Vec<Review>> {
        let state = self.state.read().await;
        Ok(state
            .reviews
            .iter()
            .filter(|r| r.product_id == product_id)
            .cloned()
            .collect())
    }

    async fn rating_summary(&self, product_id: i64) -> StoreResult<RatingSummary> {
        let reviews = self.reviews_for_product(product_id).await?;
        if reviews.is_empty() {
            return Ok(RatingSummary::default());
        }
        let count = u32::try_from(reviews.len()).unwrap_or(u32::MAX);
        let average = reviews.iter().map(|r| r.rating).sum::<f64>() / reviews.len() as f64;
        Ok(RatingSummary {
            average: Some(average),
            count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::product::Gender;

    fn product(name: &str) -> CanonicalProduct {
        CanonicalProduct::new(ProductKey::new(name, "Jockey", Gender::Men), "Brief", Utc::now())
    }

    #[tokio::test]
    async fn test_key_uniqueness_is_enforced() {
        let store = InMemoryCatalog::new();
        let saved = store.save_product(&product("Cotton Brief")).await.unwrap();
        assert_eq!(saved.id, Some(1));

        let err = store.save_product(&product("Cotton Brief")).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));

        let found = store.find_by_key(&saved.key()).await.unwrap().unwrap();
        assert_eq!(found.id, Some(1));
    }

    #[tokio::test]
    async fn test_defaults_seed_once() {
        let store = InMemoryCatalog::new();
        let first = store.initialize_defaults().await.unwrap();
        let second = store.initialize_defaults().await.unwrap();
        assert_eq!(first.len(), 4);
        assert_eq!(first, second);
        assert_eq!(store.list_sources(true).await.unwrap().len(), 4);

        store.set_source_active(first[0].id, false).await.unwrap();
        assert_eq!(store.list_sources(true).await.unwrap().len(), 3);
        assert_eq!(store.list_sources(false).await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_rating_summary_and_delete_cascade() {
        let store = InMemoryCatalog::new();
        let saved = store.save_product(&product("Cotton Brief")).await.unwrap();
        let id = saved.id.unwrap();

        assert_eq!(store.rating_summary(id).await.unwrap(), RatingSummary::default());
        store.add_review(&NewReview::new(id, 1, 4.0)).await.unwrap();
        store.add_review(&NewReview::new(id, 1, 5.0)).await.unwrap();

        let summary = store.rating_summary(id).await.unwrap();
        assert_eq!(summary.count, 2);
        assert_eq!(summary.average, Some(4.5));

        assert!(store.delete_product(id).await.unwrap());
        assert!(store.reviews_for_product(id).await.unwrap().is_empty());
        assert!(store.find_by_key(&saved.key()).await.unwrap().is_none());
    }
}
