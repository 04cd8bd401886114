//! Ephemeral listing types flowing from source adapters to the matcher

use serde::{Deserialize, Serialize};

use super::product::Gender;

/// Input to a source adapter invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchRequest {
    pub query: String,
    pub gender: Option<Gender>,
    /// 1-based page number
    pub page: u32,
    /// Fetch this URL instead of building a search URL
    pub direct_url: Option<String>,
}

impl FetchRequest {
    pub fn search(query: impl Into<String>, gender: Option<Gender>) -> Self {
        Self {
            query: query.into(),
            gender,
            page: 1,
            direct_url: None,
        }
    }

    #[must_use]
    pub fn with_page(mut self, page: u32) -> Self {
        self.page = page.max(1);
        self
    }

    #[must_use]
    pub fn with_direct_url(mut self, url: impl Into<String>) -> Self {
        self.direct_url = Some(url.into());
        self
    }
}

/// One listing as extracted from a source document, before any interpretation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawListing {
    /// Source-native identifier, or a synthesized fallback
    pub native_id: String,
    /// `true` when no id strategy matched and `native_id` was synthesized
    pub id_synthesized: bool,
    pub title: Option<String>,
    /// Brand text, for sites that render it separately from the title
    pub brand: Option<String>,
    pub price_text: Option<String>,
    pub original_price_text: Option<String>,
    pub discount_text: Option<String>,
    pub image_url: Option<String>,
    pub rating_text: Option<String>,
    pub rating_count_text: Option<String>,
    pub listing_url: Option<String>,
    pub in_stock: bool,
}

/// A listing in the common typed shape shared by all adapters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedListing {
    pub id: String,
    pub title: String,
    pub brand: String,
    pub gender: Gender,
    #[serde(rename = "type")]
    pub product_type: String,
    /// 0.0 when the price could not be parsed; treat as unknown, not free
    pub price: f64,
    pub original_price: Option<f64>,
    pub source_name: String,
    pub listing_url: Option<String>,
    pub image_url: Option<String>,
    pub rating: Option<f64>,
    pub rating_count: Option<u32>,
    pub in_stock: bool,
}
