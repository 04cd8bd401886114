//! Multi-source aggregation use case
//!
//! A search fans out to every active source in parallel under one deadline.
//! Listings are normalized and merged into canonical products, summarized,
//! filtered, sorted and cached for a short time.
//!
//! Fetching and merging are separate phases: only fetching races the
//! deadline, so a merge is never interrupted half-way through a source.

use std::collections::HashSet;
use std::sync::Arc;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::{Instant, timeout_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::application::dto::{AggregatedProduct, ProductFilter, sort_products};
use crate::domain::listing::{FetchRequest, RawListing};
use crate::domain::product::{Gender, SortOrder, Source};
use crate::domain::repositories::{
    CatalogStore, ProductRepository, ReviewRepository, SourceRepository, StoreError,
};
use crate::domain::services::{NormalizeContext, ProductMatcher, normalize};
use crate::infrastructure::config::AggregationConfig;
use crate::infrastructure::http_client::FetchError;
use crate::infrastructure::result_cache::ResultCache;
use crate::infrastructure::sources::SourceAdapter;

pub type AggregationCache = ResultCache<Vec<AggregatedProduct>>;

#[derive(Error, Debug)]
pub enum AggregationError {
    #[error("Failed to load active sources: {0}")]
    Sources(#[from] StoreError),
}

/// Repository handles backed by one store
#[derive(Clone)]
pub struct CatalogHandle {
    pub products: Arc<dyn ProductRepository>,
    pub sources: Arc<dyn SourceRepository>,
    pub reviews: Arc<dyn ReviewRepository>,
}

impl CatalogHandle {
    pub fn new<S: CatalogStore + 'static>(store: Arc<S>) -> Self {
        Self {
            products: store.clone(),
            sources: store.clone(),
            reviews: store,
        }
    }
}

/// One search to aggregate
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregationRequest {
    pub query: String,
    pub gender: Option<Gender>,
    pub filter: ProductFilter,
    /// Falls back to the configured default sort
    pub sort: Option<SortOrder>,
    /// Skip the cache lookup; the fresh result is still cached
    pub bypass_cache: bool,
}

impl AggregationRequest {
    pub fn new(query: impl Into<String>, gender: Option<Gender>) -> Self {
        Self {
            query: query.into(),
            gender,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_filter(mut self, filter: ProductFilter) -> Self {
        self.filter = filter;
        self
    }

    #[must_use]
    pub const fn with_sort(mut self, sort: SortOrder) -> Self {
        self.sort = Some(sort);
        self
    }

    #[must_use]
    pub const fn bypassing_cache(mut self) -> Self {
        self.bypass_cache = true;
        self
    }
}

/// What one source contributed to an aggregation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum SourceOutcome {
    /// Number of listings extracted
    Listings(usize),
    /// The page was fetched but no listing could be extracted
    NoExtraction,
    Failed(String),
    TimedOut,
}

impl SourceOutcome {
    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_) | Self::TimedOut)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceReport {
    pub source: String,
    pub outcome: SourceOutcome,
    /// Listings merged into the catalog
    pub merged: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregationReport {
    pub products: Vec<AggregatedProduct>,
    /// Empty when served from the cache
    pub sources: Vec<SourceReport>,
    pub from_cache: bool,
}

impl AggregationReport {
    /// `true` when at least one source was queried and every one of them
    /// failed or timed out, as opposed to sources answering with nothing
    pub fn all_sources_failed(&self) -> bool {
        !self.sources.is_empty() && self.sources.iter().all(|s| s.outcome.is_failure())
    }

    fn produced_listings(&self) -> bool {
        self.sources
            .iter()
            .any(|s| matches!(s.outcome, SourceOutcome::Listings(_)))
    }
}

/// Trim, lower-case and collapse internal whitespace
pub fn normalize_query(query: &str) -> String {
    query
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Cache key for a search: query, gender, filter signature and sort
pub fn cache_key(query: &str, gender: Option<Gender>, filter: &ProductFilter, sort: SortOrder) -> String {
    let gender = gender.map_or("all", Gender::as_str);
    let signature = filter.signature();
    if signature.is_empty() {
        format!("search_{}_{}_{}", normalize_query(query), gender, sort.as_str())
    } else {
        format!(
            "search_{}_{}_{}_{}",
            normalize_query(query),
            gender,
            signature,
            sort.as_str()
        )
    }
}

/// Aggregates listings from all active sources into canonical products
pub struct Aggregator {
    adapters: Vec<Arc<dyn SourceAdapter>>,
    catalog: CatalogHandle,
    matcher: Arc<ProductMatcher>,
    cache: Arc<AggregationCache>,
    config: AggregationConfig,
    max_pages: u32,
}

impl Aggregator {
    pub fn new(
        adapters: Vec<Arc<dyn SourceAdapter>>,
        catalog: CatalogHandle,
        cache: Arc<AggregationCache>,
        config: AggregationConfig,
    ) -> Self {
        let matcher = Arc::new(ProductMatcher::new(Arc::clone(&catalog.products)));
        Self {
            adapters,
            catalog,
            matcher,
            cache,
            config,
            max_pages: 1,
        }
    }

    /// Result pages fetched per source, stopping early at the first empty page
    #[must_use]
    pub fn with_max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = max_pages.max(1);
        self
    }

    pub const fn catalog(&self) -> &CatalogHandle {
        &self.catalog
    }

    pub const fn matcher(&self) -> &Arc<ProductMatcher> {
        &self.matcher
    }

    pub const fn cache(&self) -> &Arc<AggregationCache> {
        &self.cache
    }

    pub fn adapter_for(&self, source_name: &str) -> Option<Arc<dyn SourceAdapter>> {
        self.adapters
            .iter()
            .find(|a| a.source_name().eq_ignore_ascii_case(source_name))
            .cloned()
    }

    /// Aggregate with no filter and the default sort
    pub async fn aggregate(
        &self,
        query: &str,
        gender: Option<Gender>,
    ) -> Result<Vec<AggregatedProduct>, AggregationError> {
        let report = self.aggregate_with(AggregationRequest::new(query, gender)).await?;
        Ok(report.products)
    }

    pub async fn aggregate_with(
        &self,
        request: AggregationRequest,
    ) -> Result<AggregationReport, AggregationError> {
        let sort = request.sort.unwrap_or(self.config.default_sort);
        let key = cache_key(&request.query, request.gender, &request.filter, sort);

        if !request.bypass_cache {
            if let Some(products) = self.cache.get(&key).await {
                debug!("Cache hit: {}", key);
                return Ok(AggregationReport {
                    products,
                    sources: Vec::new(),
                    from_cache: true,
                });
            }
        }

        let targets = self.active_targets().await?;
        if targets.is_empty() {
            warn!("No active source has a registered adapter");
            return Ok(AggregationReport {
                products: Vec::new(),
                sources: Vec::new(),
                from_cache: false,
            });
        }

        info!(
            "Aggregating '{}' ({}) across {} sources",
            request.query,
            request.gender.map_or("all", Gender::as_str),
            targets.len()
        );

        let (fetched, timed_out) = self.fetch_all(&targets, &request).await;

        let merges = targets
            .iter()
            .zip(fetched)
            .map(|((source, adapter), result)| self.merge_source(source, adapter, result, timed_out, request.gender));
        let merged = join_all(merges).await;

        let mut sources = Vec::with_capacity(merged.len());
        let mut product_ids = Vec::new();
        let mut seen = HashSet::new();
        for (report, ids) in merged {
            sources.push(report);
            for id in ids {
                if seen.insert(id) {
                    product_ids.push(id);
                }
            }
        }

        let mut products = self.summarize(&product_ids).await;
        products.retain(|p| request.filter.matches(p));
        sort_products(&mut products, sort);

        let report = AggregationReport {
            products,
            sources,
            from_cache: false,
        };

        if report.produced_listings() {
            self.cache
                .set(key, report.products.clone(), self.config.cache_ttl())
                .await;
        } else if report.all_sources_failed() {
            warn!("All sources failed for '{}'", request.query);
        }

        info!(
            "Aggregated {} products for '{}'",
            report.products.len(),
            request.query
        );
        Ok(report)
    }

    /// Active sources paired with their adapters, in source order
    async fn active_targets(&self) -> Result<Vec<(Source, Arc<dyn SourceAdapter>)>, StoreError> {
        let sources = self.catalog.sources.list_sources(true).await?;
        Ok(sources
            .into_iter()
            .filter_map(|source| {
                let adapter = self.adapter_for(&source.name)?;
                Some((source, adapter))
            })
            .collect())
    }

    /// Fetch every target concurrently. Pages are streamed back as they
    /// arrive, so a source cut off by the deadline after its first page still
    /// contributes what it fetched. Slots still `None` on return produced
    /// nothing; the flag tells whether the deadline cut them off.
    async fn fetch_all(
        &self,
        targets: &[(Source, Arc<dyn SourceAdapter>)],
        request: &AggregationRequest,
    ) -> (Vec<Option<Result<Vec<RawListing>, FetchError>>>, bool) {
        let deadline = Instant::now() + self.config.deadline();
        let cancel = CancellationToken::new();
        let (page_tx, mut page_rx) = mpsc::unbounded_channel();
        let mut join_set = JoinSet::new();

        for (slot, (_, adapter)) in targets.iter().enumerate() {
            let adapter = Arc::clone(adapter);
            let query = request.query.clone();
            let gender = request.gender;
            let max_pages = self.max_pages;
            let token = cancel.child_token();
            let pages = PageSink { slot, tx: page_tx.clone() };
            join_set.spawn(async move {
                (slot, fetch_pages(adapter.as_ref(), &query, gender, max_pages, &token, &pages).await)
            });
        }
        drop(page_tx);

        let mut finished: Vec<Option<Result<(), FetchError>>> = targets.iter().map(|_| None).collect();
        let mut timed_out = false;

        loop {
            match timeout_at(deadline, join_set.join_next()).await {
                Ok(Some(Ok((slot, result)))) => finished[slot] = Some(result),
                Ok(Some(Err(e))) => warn!("Fetch task failed: {}", e),
                Ok(None) => break,
                Err(_) => {
                    timed_out = true;
                    warn!(
                        "Aggregation deadline of {:?} reached with {} sources outstanding",
                        self.config.deadline(),
                        join_set.len()
                    );
                    cancel.cancel();
                    join_set.abort_all();
                    while join_set.join_next().await.is_some() {}
                    break;
                }
            }
        }

        // Every sender is gone once the join set is empty
        let mut pages: Vec<Vec<RawListing>> = targets.iter().map(|_| Vec::new()).collect();
        while let Some((slot, batch)) = page_rx.recv().await {
            pages[slot].extend(batch);
        }

        let fetched = finished
            .into_iter()
            .zip(pages)
            .zip(targets)
            .map(|((finished, listings), (source, _))| match finished {
                Some(Ok(())) => Some(Ok(listings)),
                Some(Err(e)) => Some(Err(e)),
                None if listings.is_empty() => None,
                None => {
                    warn!(
                        "{}: deadline reached mid-pagination, keeping {} fetched listings",
                        source.name,
                        listings.len()
                    );
                    Some(Ok(listings))
                }
            })
            .collect();

        (fetched, timed_out)
    }

    /// Normalize and merge one source's listings in extraction order
    async fn merge_source(
        &self,
        source: &Source,
        adapter: &Arc<dyn SourceAdapter>,
        fetched: Option<Result<Vec<RawListing>, FetchError>>,
        timed_out: bool,
        gender: Option<Gender>,
    ) -> (SourceReport, Vec<i64>) {
        let report = |outcome, merged| SourceReport {
            source: source.name.clone(),
            outcome,
            merged,
        };

        let raw = match fetched {
            Some(Ok(raw)) if raw.is_empty() => return (report(SourceOutcome::NoExtraction, 0), Vec::new()),
            Some(Ok(raw)) => raw,
            Some(Err(e)) => {
                warn!("{} contributed nothing: {}", source.name, e);
                return (report(SourceOutcome::Failed(e.to_string()), 0), Vec::new());
            }
            None if timed_out => return (report(SourceOutcome::TimedOut, 0), Vec::new()),
            None => {
                return (
                    report(SourceOutcome::Failed("fetch task aborted".to_string()), 0),
                    Vec::new(),
                );
            }
        };

        let ctx = NormalizeContext::new(&source.name, gender).with_base_url(adapter.base_url());
        let mut ids = Vec::with_capacity(raw.len());
        for listing in &raw {
            let normalized = normalize(listing, &ctx);
            match self.matcher.merge(&normalized, source).await {
                Ok(outcome) => ids.extend(outcome.product.id),
                Err(e) => warn!("Skipping listing {} from {}: {}", normalized.id, source.name, e),
            }
        }

        debug!("{}: merged {}/{} listings", source.name, ids.len(), raw.len());
        (report(SourceOutcome::Listings(raw.len()), ids.len()), ids)
    }

    /// Reload the touched products and summarize them
    async fn summarize(&self, product_ids: &[i64]) -> Vec<AggregatedProduct> {
        let mut products = Vec::with_capacity(product_ids.len());
        for &id in product_ids {
            let product = match self.catalog.products.find_by_id(id).await {
                Ok(Some(product)) => product,
                Ok(None) => continue,
                Err(e) => {
                    warn!("Failed to reload product {}: {}", id, e);
                    continue;
                }
            };
            let reviews = self
                .catalog
                .reviews
                .rating_summary(id)
                .await
                .unwrap_or_else(|e| {
                    warn!("Failed to load rating summary for {}: {}", id, e);
                    Default::default()
                });
            products.push(AggregatedProduct::from_product(&product, reviews));
        }
        products
    }
}

/// Per-source channel end receiving each fetched page
struct PageSink {
    slot: usize,
    tx: mpsc::UnboundedSender<(usize, Vec<RawListing>)>,
}

impl PageSink {
    fn push(&self, batch: Vec<RawListing>) {
        // The receiver outlives every fetch task
        let _ = self.tx.send((self.slot, batch));
    }
}

/// Fetch up to `max_pages` pages into `pages`, stopping at the first empty
/// one. A failure after the first page keeps what was already fetched.
async fn fetch_pages(
    adapter: &dyn SourceAdapter,
    query: &str,
    gender: Option<Gender>,
    max_pages: u32,
    cancel: &CancellationToken,
    pages: &PageSink,
) -> Result<(), FetchError> {
    for page in 1..=max_pages.max(1) {
        let request = FetchRequest::search(query, gender).with_page(page);
        match adapter.fetch(&request, cancel).await {
            Ok(batch) if batch.is_empty() => break,
            Ok(batch) => pages.push(batch),
            Err(e) if page > 1 => {
                warn!("{}: page {} failed, keeping earlier pages: {}", adapter.source_name(), page, e);
                break;
            }
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::product::SourceListing;
    use crate::infrastructure::memory_store::InMemoryCatalog;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Adapter serving canned listings after an optional delay
    struct StubAdapter {
        name: String,
        base_url: url::Url,
        delay: Duration,
        later_pages: Option<Duration>,
        result: Result<Vec<RawListing>, String>,
        calls: AtomicUsize,
    }

    impl StubAdapter {
        fn new(name: &str, result: Result<Vec<RawListing>, String>) -> Self {
            Self {
                name: name.to_string(),
                base_url: url::Url::parse("https://example.com").unwrap(),
                delay: Duration::ZERO,
                later_pages: None,
                result,
                calls: AtomicUsize::new(0),
            }
        }

        fn delayed(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        /// Serve pages after the first with the same listings after `delay`
        fn paginated(mut self, delay: Duration) -> Self {
            self.later_pages = Some(delay);
            self
        }
    }

    #[async_trait]
    impl SourceAdapter for StubAdapter {
        fn source_name(&self) -> &str {
            &self.name
        }

        fn base_url(&self) -> &url::Url {
            &self.base_url
        }

        async fn fetch(
            &self,
            request: &FetchRequest,
            cancel: &CancellationToken,
        ) -> Result<Vec<RawListing>, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let delay = match (request.page, self.later_pages) {
                (1, _) => self.delay,
                (_, Some(delay)) => delay,
                (_, None) => return Ok(Vec::new()),
            };
            tokio::select! {
                () = tokio::time::sleep(delay) => {},
                () = cancel.cancelled() => return Err(FetchError::Cancelled { url: self.name.clone() }),
            }
            self.result
                .clone()
                .map_err(|reason| FetchError::InvalidUrl { url: self.name.clone(), reason })
        }
    }

    fn raw(id: &str, title: &str, price: &str) -> RawListing {
        RawListing {
            native_id: id.to_string(),
            title: Some(title.to_string()),
            brand: Some("Jockey".to_string()),
            price_text: Some(price.to_string()),
            in_stock: true,
            ..RawListing::default()
        }
    }

    async fn aggregator(adapters: Vec<Arc<dyn SourceAdapter>>, deadline_ms: u64) -> Aggregator {
        let store = Arc::new(InMemoryCatalog::new());
        store.initialize_defaults().await.unwrap();
        let config = AggregationConfig {
            deadline_ms,
            ..AggregationConfig::default()
        };
        Aggregator::new(adapters, CatalogHandle::new(store), Arc::new(ResultCache::new()), config)
    }

    #[test]
    fn test_cache_key_normalizes_query() {
        let filter = ProductFilter::default();
        assert_eq!(
            cache_key("  Cotton   BRIEFS ", Some(Gender::Men), &filter, SortOrder::Newest),
            "search_cotton briefs_men_newest"
        );
        assert_eq!(
            cache_key("briefs", None, &filter, SortOrder::PriceAsc),
            "search_briefs_all_price_asc"
        );
        let narrowed = ProductFilter {
            brands: vec!["Jockey".into()],
            ..ProductFilter::default()
        };
        assert_ne!(
            cache_key("briefs", None, &narrowed, SortOrder::PriceAsc),
            cache_key("briefs", None, &filter, SortOrder::PriceAsc)
        );
    }

    #[tokio::test]
    async fn test_listings_from_sources_merge_into_one_product() {
        let adapters: Vec<Arc<dyn SourceAdapter>> = vec![
            Arc::new(StubAdapter::new("Amazon", Ok(vec![raw("A1", "Cotton Brief", "₹199")]))),
            Arc::new(StubAdapter::new("Flipkart", Ok(vec![raw("F1", "Cotton Brief", "₹249")]))),
            Arc::new(StubAdapter::new("Myntra", Ok(vec![raw("M1", "Cotton  Brief", "Rs. 199")]))),
            Arc::new(StubAdapter::new("Ajio", Ok(Vec::new()))),
        ];
        let aggregator = aggregator(adapters, 5_000).await;

        let report = aggregator
            .aggregate_with(AggregationRequest::new("brief", Some(Gender::Men)))
            .await
            .unwrap();

        assert_eq!(report.products.len(), 1);
        let product = &report.products[0];
        assert_eq!(product.lowest_price, Some(199.0));
        assert_eq!(product.highest_price, Some(249.0));
        // Sources merge concurrently, so association order is not fixed
        let mut sources = product.sources.clone();
        sources.sort();
        assert_eq!(sources, vec!["Amazon", "Flipkart", "Myntra"]);

        let outcomes: Vec<&SourceOutcome> = report.sources.iter().map(|s| &s.outcome).collect();
        assert_eq!(
            outcomes,
            vec![
                &SourceOutcome::Listings(1),
                &SourceOutcome::Listings(1),
                &SourceOutcome::Listings(1),
                &SourceOutcome::NoExtraction,
            ]
        );
        assert!(!report.all_sources_failed());
    }

    #[tokio::test]
    async fn test_second_call_is_served_from_cache() {
        let amazon = Arc::new(StubAdapter::new("Amazon", Ok(vec![raw("A1", "Cotton Brief", "199")])));
        let adapters: Vec<Arc<dyn SourceAdapter>> = vec![amazon.clone()];
        let aggregator = aggregator(adapters, 5_000).await;

        let first = aggregator.aggregate_with(AggregationRequest::new("Brief", None)).await.unwrap();
        let second = aggregator.aggregate_with(AggregationRequest::new(" brief ", None)).await.unwrap();

        assert!(!first.from_cache);
        assert!(second.from_cache);
        assert_eq!(first.products, second.products);
        assert_eq!(amazon.calls.load(Ordering::SeqCst), 1);

        let bypass = aggregator
            .aggregate_with(AggregationRequest::new("brief", None).bypassing_cache())
            .await
            .unwrap();
        assert!(!bypass.from_cache);
        assert_eq!(amazon.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_all_failed_is_distinct_and_not_cached() {
        let adapters: Vec<Arc<dyn SourceAdapter>> = vec![
            Arc::new(StubAdapter::new("Amazon", Err("blocked".into()))),
            Arc::new(StubAdapter::new("Flipkart", Err("blocked".into()))),
        ];
        let aggregator = aggregator(adapters, 5_000).await;

        let report = aggregator.aggregate_with(AggregationRequest::new("brief", None)).await.unwrap();
        assert!(report.products.is_empty());
        assert!(report.all_sources_failed());
        assert_eq!(aggregator.cache().stats().await.entries, 0);
    }

    #[tokio::test]
    async fn test_zero_results_is_not_a_failure() {
        let adapters: Vec<Arc<dyn SourceAdapter>> =
            vec![Arc::new(StubAdapter::new("Amazon", Ok(Vec::new())))];
        let aggregator = aggregator(adapters, 5_000).await;

        let report = aggregator.aggregate_with(AggregationRequest::new("brief", None)).await.unwrap();
        assert!(report.products.is_empty());
        assert!(!report.all_sources_failed());
        assert_eq!(report.sources[0].outcome, SourceOutcome::NoExtraction);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_source_times_out_without_blocking_others() {
        let adapters: Vec<Arc<dyn SourceAdapter>> = vec![
            Arc::new(StubAdapter::new("Amazon", Ok(vec![raw("A1", "Cotton Brief", "199")]))),
            Arc::new(
                StubAdapter::new("Flipkart", Ok(vec![raw("F1", "Cotton Brief", "249")]))
                    .delayed(Duration::from_secs(60)),
            ),
        ];
        let aggregator = aggregator(adapters, 1_000).await;

        let started = Instant::now();
        let report = aggregator.aggregate_with(AggregationRequest::new("brief", None)).await.unwrap();
        assert!(started.elapsed() < Duration::from_secs(2));

        assert_eq!(report.products.len(), 1);
        assert_eq!(report.products[0].sources, vec!["Amazon"]);
        assert_eq!(report.sources[1].outcome, SourceOutcome::TimedOut);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_keeps_pages_fetched_before_it() {
        let flipkart = Arc::new(
            StubAdapter::new(
                "Flipkart",
                Ok(vec![raw("F1", "Cotton Brief", "249"), raw("F2", "Modal Trunk", "299")]),
            )
            .paginated(Duration::from_secs(60)),
        );
        let adapters: Vec<Arc<dyn SourceAdapter>> = vec![
            Arc::new(StubAdapter::new("Amazon", Ok(vec![raw("A1", "Cotton Brief", "199")]))),
            flipkart.clone(),
        ];
        let aggregator = aggregator(adapters, 1_000).await.with_max_pages(3);

        let started = Instant::now();
        let report = aggregator.aggregate_with(AggregationRequest::new("brief", None)).await.unwrap();
        assert!(started.elapsed() < Duration::from_secs(2));

        // Page 2 was requested but never answered
        assert_eq!(flipkart.calls.load(Ordering::SeqCst), 2);
        assert_eq!(report.sources[1].outcome, SourceOutcome::Listings(2));
        assert_eq!(report.sources[1].merged, 2);

        let mut names: Vec<&str> = report.products.iter().map(|p| p.name.as_str()).collect();
        names.sort_unstable();
        assert_eq!(names, vec!["Cotton Brief", "Modal Trunk"]);
    }

    #[tokio::test]
    async fn test_inactive_sources_are_skipped() {
        let amazon = Arc::new(StubAdapter::new("Amazon", Ok(vec![raw("A1", "Cotton Brief", "199")])));
        let adapters: Vec<Arc<dyn SourceAdapter>> = vec![amazon.clone()];
        let aggregator = aggregator(adapters, 5_000).await;

        let source = aggregator
            .catalog()
            .sources
            .find_source_by_name("Amazon")
            .await
            .unwrap()
            .unwrap();
        aggregator.catalog().sources.set_source_active(source.id, false).await.unwrap();

        let report = aggregator.aggregate_with(AggregationRequest::new("brief", None)).await.unwrap();
        assert!(report.sources.is_empty());
        assert_eq!(amazon.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_filter_and_sort_apply_to_result() {
        let adapters: Vec<Arc<dyn SourceAdapter>> = vec![Arc::new(StubAdapter::new(
            "Amazon",
            Ok(vec![
                raw("A1", "Cotton Brief", "299"),
                raw("A2", "Modal Trunk", "149"),
                raw("A3", "Sports Vest", "0"),
            ]),
        ))];
        let aggregator = aggregator(adapters, 5_000).await;

        let request = AggregationRequest::new("jockey", Some(Gender::Men))
            .with_sort(SortOrder::PriceAsc)
            .with_filter(ProductFilter {
                max_price: Some(500.0),
                ..ProductFilter::default()
            });
        let report = aggregator.aggregate_with(request).await.unwrap();

        let names: Vec<&str> = report.products.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Modal Trunk", "Cotton Brief"]);
    }

    #[tokio::test]
    async fn test_known_source_updates_in_place() {
        let adapters: Vec<Arc<dyn SourceAdapter>> =
            vec![Arc::new(StubAdapter::new("Amazon", Ok(vec![raw("A1", "Cotton Brief", "199")])))];
        let aggregator = aggregator(adapters, 5_000).await;

        let first = aggregator.aggregate_with(AggregationRequest::new("brief", None)).await.unwrap();
        let product_id = first.products[0].id;
        let before: Vec<SourceListing> = aggregator
            .catalog()
            .products
            .find_by_id(product_id)
            .await
            .unwrap()
            .unwrap()
            .listings;

        aggregator
            .aggregate_with(AggregationRequest::new("brief", None).bypassing_cache())
            .await
            .unwrap();
        let after = aggregator
            .catalog()
            .products
            .find_by_id(product_id)
            .await
            .unwrap()
            .unwrap()
            .listings;

        assert_eq!(after.len(), before.len());
        assert!(after[0].last_checked > before[0].last_checked);
    }
}
