//! Repository interfaces for the product catalog
//!
//! The aggregation pipeline only talks to storage through these traits. Two
//! implementations ship with the crate: an in-memory catalog and a SQLite one.

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

use super::constants::DEFAULT_SOURCES;
use super::product::{
    CanonicalProduct, NewReview, NewSource, ProductKey, RatingSummary, Review, Source,
};

#[derive(Error, Debug)]
pub enum StoreError {
    /// A uniqueness constraint (product key or product/source pair) was violated
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Storage backend error: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait ProductRepository: Send + Sync {
    async fn find_by_key(&self, key: &ProductKey) -> StoreResult<Option<CanonicalProduct>>;
    async fn find_by_id(&self, id: i64) -> StoreResult<Option<CanonicalProduct>>;

    /// Persist the whole aggregate (product row plus every listing) atomically.
    ///
    /// Products without an id are inserted and returned with the assigned id.
    async fn save_product(&self, product: &CanonicalProduct) -> StoreResult<CanonicalProduct>;

    async fn list_products(&self) -> StoreResult<Vec<CanonicalProduct>>;
    async fn delete_product(&self, id: i64) -> StoreResult<bool>;
}

#[async_trait]
pub trait SourceRepository: Send + Sync {
    async fn find_source_by_name(&self, name: &str) -> StoreResult<Option<Source>>;
    async fn find_source_by_id(&self, id: i64) -> StoreResult<Option<Source>>;
    async fn create_source(&self, source: &NewSource) -> StoreResult<Source>;
    async fn list_sources(&self, active_only: bool) -> StoreResult<Vec<Source>>;
    async fn set_source_active(&self, id: i64, active: bool) -> StoreResult<bool>;

    /// Look a source up by name, creating it when missing
    async fn ensure_source(&self, source: &NewSource) -> StoreResult<Source> {
        if let Some(existing) = self.find_source_by_name(&source.name).await? {
            return Ok(existing);
        }
        match self.create_source(source).await {
            Ok(created) => Ok(created),
            // Lost a race with a concurrent insert
            Err(StoreError::Conflict(_)) => self
                .find_source_by_name(&source.name)
                .await?
                .ok_or_else(|| StoreError::NotFound(source.name.clone())),
            Err(e) => Err(e),
        }
    }

    /// Seed the built-in sources; existing rows are left untouched
    async fn initialize_defaults(&self) -> StoreResult<Vec<Source>> {
        let mut sources = Vec::with_capacity(DEFAULT_SOURCES.len());
        for seed in DEFAULT_SOURCES {
            let source = self
                .ensure_source(&NewSource {
                    name: seed.name.to_string(),
                    base_url: seed.base_url.to_string(),
                    logo_url: Some(seed.logo_url.to_string()),
                    search_endpoint: Some(seed.search_endpoint.to_string()),
                    product_endpoint: Some(seed.product_endpoint.to_string()),
                    is_active: true,
                })
                .await?;
            sources.push(source);
        }
        info!("Initialized {} default sources", sources.len());
        Ok(sources)
    }
}

#[async_trait]
pub trait ReviewRepository: Send + Sync {
    async fn add_review(&self, review: &NewReview) -> StoreResult<Review>;
    async fn reviews_for_product(&self, product_id: i64) -> StoreResult<Vec<Review>>;
    async fn rating_summary(&self, product_id: i64) -> StoreResult<RatingSummary>;
}

/// Everything the aggregation pipeline needs from a backing store
pub trait CatalogStore: ProductRepository + SourceRepository + ReviewRepository {}

impl<T> CatalogStore for T where T: ProductRepository + SourceRepository + ReviewRepository {}
