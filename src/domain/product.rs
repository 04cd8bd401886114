use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Target audience of a product
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Men,
    Women,
    Unisex,
}

impl Gender {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Men => "men",
            Self::Women => "women",
            Self::Unisex => "unisex",
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Gender {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "men" | "male" | "m" => Ok(Self::Men),
            "women" | "female" | "w" | "f" => Ok(Self::Women),
            "unisex" | "u" => Ok(Self::Unisex),
            other => Err(format!("Invalid gender: {other}")),
        }
    }
}

/// Ordering of an aggregated product list
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    /// Cheapest lowest price first
    PriceAsc,
    PriceDesc,
    /// Best rated first; unrated products last
    RatingDesc,
    /// Most recently created first
    #[default]
    Newest,
}

impl SortOrder {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PriceAsc => "price_asc",
            Self::PriceDesc => "price_desc",
            Self::RatingDesc => "rating_desc",
            Self::Newest => "newest",
        }
    }
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "price_asc" => Ok(Self::PriceAsc),
            "price_desc" => Ok(Self::PriceDesc),
            "rating_desc" => Ok(Self::RatingDesc),
            "newest" => Ok(Self::Newest),
            other => Err(format!("Invalid sort order: {other}")),
        }
    }
}

/// Identity of a canonical product across sources.
///
/// Matching is exact on all three components; near-duplicate titles from
/// different sources produce different keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProductKey {
    pub name: String,
    pub brand: String,
    pub gender: Gender,
}

impl ProductKey {
    pub fn new(name: impl Into<String>, brand: impl Into<String>, gender: Gender) -> Self {
        Self {
            name: name.into(),
            brand: brand.into(),
            gender,
        }
    }
}

impl fmt::Display for ProductKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} / {} / {}", self.name, self.brand, self.gender)
    }
}

/// Deduplicated, cross-source representation of one item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalProduct {
    /// Store-assigned identifier, `None` until first persisted
    pub id: Option<i64>,
    pub name: String,
    pub brand: String,
    pub gender: Gender,
    #[serde(rename = "type")]
    pub product_type: String,

    pub description: Option<String>,
    pub material: Option<String>,
    pub fit: Option<String>,
    pub pattern: Option<String>,
    pub rise: Option<String>,
    pub occasion: Option<String>,
    pub care_instructions: Option<String>,
    pub features: Vec<String>,

    pub available_sizes: Vec<String>,
    pub available_colors: Vec<String>,
    pub images: Vec<String>,

    pub listings: Vec<SourceListing>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CanonicalProduct {
    /// Create an unsaved product with no listings
    pub fn new(key: ProductKey, product_type: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: None,
            name: key.name,
            brand: key.brand,
            gender: key.gender,
            product_type: product_type.into(),
            description: None,
            material: None,
            fit: None,
            pattern: None,
            rise: None,
            occasion: None,
            care_instructions: None,
            features: Vec::new(),
            available_sizes: Vec::new(),
            available_colors: Vec::new(),
            images: Vec::new(),
            listings: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn key(&self) -> ProductKey {
        ProductKey::new(self.name.clone(), self.brand.clone(), self.gender)
    }

    pub fn listing_for(&self, source_id: i64) -> Option<&SourceListing> {
        self.listings.iter().find(|l| l.source_id == source_id)
    }

    /// Lowest and highest known price across all associations.
    ///
    /// A price of 0 means "unknown" and is ignored. The highest price is only
    /// reported when it differs from the lowest.
    pub fn price_range(&self) -> (Option<f64>, Option<f64>) {
        summarize_prices(self.listings.iter().map(|l| l.price))
    }

    /// Names of the sources currently listing this product, in association order
    pub fn source_names(&self) -> Vec<String> {
        self.listings.iter().map(|l| l.source_name.clone()).collect()
    }
}

pub fn summarize_prices(prices: impl IntoIterator<Item = f64>) -> (Option<f64>, Option<f64>) {
    let known: Vec<f64> = prices.into_iter().filter(|p| *p > 0.0).collect();
    let lowest = known.iter().copied().reduce(f64::min);
    let highest = known.iter().copied().reduce(f64::max);

    match (lowest, highest) {
        (Some(lo), Some(hi)) if (hi - lo).abs() > f64::EPSILON => (Some(lo), Some(hi)),
        (lo, _) => (lo, None),
    }
}

/// One source's price/availability/link for a canonical product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceListing {
    pub source_id: i64,
    pub source_name: String,
    /// Identifier of the product on the source platform
    pub source_product_id: String,
    pub source_url: Option<String>,
    pub price: f64,
    pub original_price: Option<f64>,
    pub in_stock: bool,
    pub rating: Option<f64>,
    pub rating_count: Option<u32>,
    pub last_checked: DateTime<Utc>,
}

/// An e-commerce site the engine can aggregate from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub id: i64,
    pub name: String,
    pub base_url: String,
    pub logo_url: Option<String>,
    pub is_active: bool,
    pub search_endpoint: Option<String>,
    pub product_endpoint: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSource {
    pub name: String,
    pub base_url: String,
    pub logo_url: Option<String>,
    pub search_endpoint: Option<String>,
    pub product_endpoint: Option<String>,
    pub is_active: bool,
}

impl NewSource {
    pub fn new(name: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            logo_url: None,
            search_endpoint: None,
            product_endpoint: None,
            is_active: true,
        }
    }
}

/// A customer review attached to a canonical product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub id: i64,
    pub product_id: i64,
    pub source_id: i64,
    pub reviewer_name: Option<String>,
    /// Usually 1-5 stars
    pub rating: f64,
    pub title: Option<String>,
    pub content: Option<String>,
    pub source_review_id: Option<String>,
    pub review_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewReview {
    pub product_id: i64,
    pub source_id: i64,
    pub reviewer_name: Option<String>,
    pub rating: f64,
    pub title: Option<String>,
    pub content: Option<String>,
    pub source_review_id: Option<String>,
    pub review_date: Option<DateTime<Utc>>,
}

impl NewReview {
    pub const fn new(product_id: i64, source_id: i64, rating: f64) -> Self {
        Self {
            product_id,
            source_id,
            reviewer_name: None,
            rating,
            title: None,
            content: None,
            source_review_id: None,
            review_date: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RatingSummary {
    pub average: Option<f64>,
    pub count: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_price_range_reports_highest_only_when_different() {
        assert_eq!(summarize_prices([199.0, 249.0, 199.0]), (Some(199.0), Some(249.0)));
        assert_eq!(summarize_prices([299.0, 299.0]), (Some(299.0), None));
    }

    #[test]
    fn test_unknown_prices_are_ignored() {
        assert_eq!(summarize_prices([0.0, 450.0]), (Some(450.0), None));
        assert_eq!(summarize_prices([0.0, 0.0]), (None, None));
        assert_eq!(summarize_prices(Vec::<f64>::new()), (None, None));
    }

    #[test]
    fn test_gender_parses_loosely() {
        assert_eq!("Men".parse::<Gender>(), Ok(Gender::Men));
        assert_eq!(" women ".parse::<Gender>(), Ok(Gender::Women));
        assert_eq!("unisex".parse::<Gender>(), Ok(Gender::Unisex));
        assert!("kids".parse::<Gender>().is_err());
    }

    #[test]
    fn test_gender_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Gender::Women).unwrap(), "\"women\"");
    }
}
