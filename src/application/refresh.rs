//! Background refresh operations tracked in the task registry
//!
//! Both entry points register a task, spawn the work and return the pending
//! task right away; callers poll the registry for progress.

use std::sync::Arc;

use serde_json::{Value, json};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::application::aggregation::{AggregationRequest, Aggregator};
use crate::domain::constants::task_types;
use crate::domain::listing::{FetchRequest, NormalizedListing};
use crate::domain::product::{CanonicalProduct, Gender, SourceListing};
use crate::domain::repositories::StoreError;
use crate::domain::services::{NormalizeContext, normalize};
use crate::domain::task_registry::{Task, TaskError, TaskRegistry, TaskStatus};

/// Progress reported once a task starts running
const STARTED_PROGRESS: u8 = 10;

#[derive(Error, Debug)]
pub enum RefreshError {
    #[error("Product {0} not found")]
    ProductNotFound(i64),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Task error: {0}")]
    Task(#[from] TaskError),
}

/// Short unique task id with a readable prefix
fn task_id(prefix: &str) -> String {
    let suffix: String = Uuid::new_v4().simple().to_string().chars().take(8).collect();
    format!("{prefix}_{suffix}")
}

/// Progress after `done` of `total` steps, spread over what is left after start
fn step_progress(done: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    let remaining = usize::from(100 - STARTED_PROGRESS);
    let progress = usize::from(STARTED_PROGRESS) + remaining * done.min(total) / total;
    u8::try_from(progress).unwrap_or(100)
}

pub struct RefreshService {
    aggregator: Arc<Aggregator>,
    registry: TaskRegistry,
    shutdown: CancellationToken,
}

impl RefreshService {
    pub fn new(aggregator: Arc<Aggregator>, registry: TaskRegistry) -> Self {
        Self {
            aggregator,
            registry,
            shutdown: CancellationToken::new(),
        }
    }

    pub const fn registry(&self) -> &TaskRegistry {
        &self.registry
    }

    /// Cancel in-flight fetches of every running refresh
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Re-fetch every listing of a product through its source's direct URL
    pub async fn refresh_product(&self, product_id: i64) -> Result<Task, RefreshError> {
        let product = self
            .aggregator
            .catalog()
            .products
            .find_by_id(product_id)
            .await?
            .ok_or(RefreshError::ProductNotFound(product_id))?;

        let id = task_id("refresh_product");
        let task = self
            .registry
            .register(&id, task_types::PRODUCT_REFRESH, json!({ "product_id": product_id }))
            .await?;

        let job = ProductRefresh {
            aggregator: Arc::clone(&self.aggregator),
            registry: self.registry.clone(),
            cancel: self.shutdown.child_token(),
            task_id: id,
        };
        tokio::spawn(job.run(product));
        Ok(task)
    }

    /// Run a cache-bypassing aggregation in the background
    pub async fn refresh_query(&self, query: &str, gender: Option<Gender>) -> Result<Task, RefreshError> {
        let id = task_id(task_types::SCRAPE);
        let params = json!({
            "query": query,
            "gender": gender.map(Gender::as_str),
        });
        let task = self.registry.register(&id, task_types::SCRAPE, params).await?;

        let aggregator = Arc::clone(&self.aggregator);
        let registry = self.registry.clone();
        let query = query.to_string();
        let request = AggregationRequest::new(query.clone(), gender).bypassing_cache();
        tokio::spawn(async move {
            set_status(&registry, &id, TaskStatus::Running, Some(STARTED_PROGRESS), None, None).await;

            match aggregator.aggregate_with(request).await {
                Ok(report) if report.all_sources_failed() => {
                    let reasons: Vec<String> = report
                        .sources
                        .iter()
                        .map(|s| format!("{}: {:?}", s.source, s.outcome))
                        .collect();
                    let message = format!("All sources failed ({})", reasons.join(", "));
                    set_status(&registry, &id, TaskStatus::Failed, None, None, Some(message)).await;
                }
                Ok(report) => {
                    let product_ids: Vec<i64> = report.products.iter().map(|p| p.id).collect();
                    let result = json!({
                        "query": query,
                        "products": report.products.len(),
                        "product_ids": product_ids,
                        "sources": report.sources,
                    });
                    set_status(&registry, &id, TaskStatus::Completed, None, Some(result), None).await;
                }
                Err(e) => {
                    error!("Scrape task {} failed: {}", id, e);
                    set_status(&registry, &id, TaskStatus::Failed, None, None, Some(e.to_string())).await;
                }
            }
        });
        Ok(task)
    }
}

/// Apply a status change, logging instead of failing: the spawned work has
/// nobody to report a registry error to
async fn set_status(
    registry: &TaskRegistry,
    id: &str,
    status: TaskStatus,
    progress: Option<u8>,
    result: Option<Value>,
    error: Option<String>,
) {
    match registry.update(id, status, progress, result, error).await {
        Ok(Some(_)) => {}
        Ok(None) => warn!("Task {} disappeared before reaching {}", id, status),
        Err(e) => warn!("Task {} update rejected: {}", id, e),
    }
}

struct ProductRefresh {
    aggregator: Arc<Aggregator>,
    registry: TaskRegistry,
    cancel: CancellationToken,
    task_id: String,
}

impl ProductRefresh {
    async fn run(self, product: CanonicalProduct) {
        let id = self.task_id.as_str();
        set_status(&self.registry, id, TaskStatus::Running, Some(STARTED_PROGRESS), None, None).await;

        let total = product.listings.len();
        let mut updated = 0_usize;
        let mut failed = 0_usize;

        for (done, listing) in product.listings.iter().enumerate() {
            match self.refresh_listing(&product, listing).await {
                Ok(()) => updated += 1,
                Err(reason) => {
                    warn!("Refresh of {} from {} failed: {}", product.key(), listing.source_name, reason);
                    failed += 1;
                }
            }
            set_status(
                &self.registry,
                id,
                TaskStatus::Running,
                Some(step_progress(done + 1, total)),
                None,
                None,
            )
            .await;
        }

        // Cached searches may show the old prices
        self.aggregator.cache().clear(None).await;

        if updated == 0 && failed > 0 {
            let message = format!("No listing could be refreshed ({failed} failed)");
            set_status(&self.registry, id, TaskStatus::Failed, None, None, Some(message)).await;
            return;
        }

        let result = json!({
            "product_id": product.id,
            "updated": updated,
            "failed": failed,
        });
        info!("Refreshed product {}: {} updated, {} failed", product.key(), updated, failed);
        set_status(&self.registry, id, TaskStatus::Completed, None, Some(result), None).await;
    }

    async fn refresh_listing(&self, product: &CanonicalProduct, listing: &SourceListing) -> Result<(), String> {
        let catalog = self.aggregator.catalog();
        let source = catalog
            .sources
            .find_source_by_id(listing.source_id)
            .await
            .map_err(|e| e.to_string())?
            .ok_or_else(|| format!("source {} no longer exists", listing.source_id))?;
        let adapter = self
            .aggregator
            .adapter_for(&source.name)
            .ok_or_else(|| format!("no adapter for {}", source.name))?;
        let url = listing
            .source_url
            .as_deref()
            .ok_or_else(|| "listing has no URL".to_string())?;

        let request = FetchRequest::search(product.name.clone(), Some(product.gender)).with_direct_url(url);
        let raw = adapter
            .fetch(&request, &self.cancel)
            .await
            .map_err(|e| e.to_string())?;

        // A product page renders one listing; a result page may render several
        let picked = raw
            .iter()
            .find(|r| r.native_id == listing.source_product_id)
            .or_else(|| if raw.len() == 1 { raw.first() } else { None })
            .ok_or_else(|| format!("listing {} not found on page", listing.source_product_id))?;

        let ctx = NormalizeContext::new(&source.name, Some(product.gender)).with_base_url(adapter.base_url());
        let normalized = reanchor(normalize(picked, &ctx), product, listing);

        self.aggregator
            .matcher()
            .merge(&normalized, &source)
            .await
            .map(|_| ())
            .map_err(|e| e.to_string())
    }
}

/// Pin a freshly fetched listing to the product it refreshes; page titles
/// drift and must not spawn a new canonical product
fn reanchor(mut normalized: NormalizedListing, product: &CanonicalProduct, listing: &SourceListing) -> NormalizedListing {
    normalized.title.clone_from(&product.name);
    normalized.brand.clone_from(&product.brand);
    normalized.gender = product.gender;
    normalized.id.clone_from(&listing.source_product_id);
    if normalized.listing_url.is_none() {
        normalized.listing_url.clone_from(&listing.source_url);
    }
    normalized
}
