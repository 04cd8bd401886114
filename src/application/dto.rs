//! Data Transfer Objects for the aggregation pipeline
//!
//! Response shapes returned to callers of the orchestrator, plus the filter
//! and sort applied to them.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::product::{CanonicalProduct, Gender, RatingSummary, SortOrder, SourceListing};

// ============================================================================
// Aggregated product
// ============================================================================

/// One canonical product with its cross-source price and rating summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedProduct {
    pub id: i64,
    pub name: String,
    pub brand: String,
    pub gender: Gender,
    #[serde(rename = "type")]
    pub product_type: String,
    pub images: Vec<String>,
    pub available_sizes: Vec<String>,
    pub available_colors: Vec<String>,
    pub lowest_price: Option<f64>,
    /// Only present when different from `lowest_price`
    pub highest_price: Option<f64>,
    pub sources: Vec<String>,
    pub rating_average: Option<f64>,
    pub rating_count: u32,
    pub created_at: DateTime<Utc>,
}

impl AggregatedProduct {
    /// Summarize a persisted product. `reviews` wins over listing-level ratings
    /// whenever it holds at least one review.
    pub fn from_product(product: &CanonicalProduct, reviews: RatingSummary) -> Self {
        let (lowest_price, highest_price) = product.price_range();
        let rating = if reviews.count > 0 {
            reviews
        } else {
            listing_rating(&product.listings)
        };

        Self {
            id: product.id.unwrap_or_default(),
            name: product.name.clone(),
            brand: product.brand.clone(),
            gender: product.gender,
            product_type: product.product_type.clone(),
            images: product.images.clone(),
            available_sizes: product.available_sizes.clone(),
            available_colors: product.available_colors.clone(),
            lowest_price,
            highest_price,
            sources: product.source_names(),
            rating_average: rating.average,
            rating_count: rating.count,
            created_at: product.created_at,
        }
    }
}

/// Rating across listings, each listing weighted by its own rating count
pub fn listing_rating(listings: &[SourceListing]) -> RatingSummary {
    let mut weighted = 0.0;
    let mut weights = 0.0;
    let mut count: u32 = 0;

    for listing in listings {
        let Some(rating) = listing.rating else {
            continue;
        };
        let votes = listing.rating_count.unwrap_or(0);
        let weight = f64::from(votes.max(1));
        weighted += rating * weight;
        weights += weight;
        count = count.saturating_add(votes);
    }

    RatingSummary {
        average: (weights > 0.0).then(|| weighted / weights),
        count,
    }
}

// ============================================================================
// Filtering
// ============================================================================

/// Optional narrowing of an aggregated result set.
///
/// Set filters match case-insensitively; an empty set does not filter.
/// Price bounds apply to the lowest price, rating bounds to the average.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProductFilter {
    pub brands: Vec<String>,
    pub types: Vec<String>,
    pub sources: Vec<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub min_rating: Option<f64>,
}

impl ProductFilter {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Deterministic text form used in cache keys; empty for no filter
    pub fn signature(&self) -> String {
        if self.is_empty() {
            return String::new();
        }

        let set = |values: &[String]| {
            let mut normalized: Vec<String> = values.iter().map(|v| v.trim().to_lowercase()).collect();
            normalized.sort();
            normalized.dedup();
            normalized.join(",")
        };
        let bound = |value: Option<f64>| value.map(|v| v.to_string()).unwrap_or_default();

        format!(
            "b={};t={};s={};min={};max={};r={}",
            set(&self.brands),
            set(&self.types),
            set(&self.sources),
            bound(self.min_price),
            bound(self.max_price),
            bound(self.min_rating),
        )
    }

    pub fn matches(&self, product: &AggregatedProduct) -> bool {
        let in_set = |values: &[String], candidate: &str| {
            values.is_empty() || values.iter().any(|v| v.trim().eq_ignore_ascii_case(candidate))
        };

        if !in_set(&self.brands, &product.brand) || !in_set(&self.types, &product.product_type) {
            return false;
        }
        if !self.sources.is_empty() && !product.sources.iter().any(|s| in_set(&self.sources, s)) {
            return false;
        }
        if let Some(min) = self.min_price {
            if product.lowest_price.is_none_or(|p| p < min) {
                return false;
            }
        }
        if let Some(max) = self.max_price {
            if product.lowest_price.is_none_or(|p| p > max) {
                return false;
            }
        }
        if let Some(min) = self.min_rating {
            if product.rating_average.is_none_or(|r| r < min) {
                return false;
            }
        }
        true
    }
}

// ============================================================================
// Sorting
// ============================================================================

/// `None` sorts after every value regardless of direction
fn nulls_last(a: Option<f64>, b: Option<f64>, descending: bool) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => {
            let ord = a.total_cmp(&b);
            if descending { ord.reverse() } else { ord }
        }
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Sort in place; ties are broken by ascending id so the order is stable
/// across cache hits and misses
pub fn sort_products(products: &mut [AggregatedProduct], order: SortOrder) {
    products.sort_by(|a, b| {
        let primary = match order {
            SortOrder::PriceAsc => nulls_last(a.lowest_price, b.lowest_price, false),
            SortOrder::PriceDesc => nulls_last(a.lowest_price, b.lowest_price, true),
            SortOrder::RatingDesc => nulls_last(a.rating_average, b.rating_average, true),
            SortOrder::Newest => b.created_at.cmp(&a.created_at),
        };
        primary.then_with(|| a.id.cmp(&b.id))
    });
}
