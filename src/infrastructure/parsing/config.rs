//! Selector configuration for listing pages
//!
//! Centralized, serde-friendly description of where each listing field lives
//! in a site's markup. Site defaults live next to each adapter profile.

use serde::{Deserialize, Serialize};

use super::strategy::FieldStrategy;

/// CSS selectors and strategies for one site's search result page
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListingSelectors {
    /// Selectors for listing containers; the first one matching anything wins
    pub container: Vec<String>,

    pub link: Vec<FieldStrategy>,
    pub id: Vec<FieldStrategy>,
    pub title: Vec<FieldStrategy>,
    pub brand: Vec<FieldStrategy>,
    pub price: Vec<FieldStrategy>,
    pub original_price: Vec<FieldStrategy>,
    pub discount: Vec<FieldStrategy>,
    pub image: Vec<FieldStrategy>,
    pub rating: Vec<FieldStrategy>,
    pub rating_count: Vec<FieldStrategy>,

    /// Any match marks the listing as out of stock
    pub out_of_stock: Vec<FieldStrategy>,

    /// Image values ending with one of these are placeholders
    pub placeholder_images: Vec<String>,
}

/// Shorthand for a list of text strategies
pub fn texts(selectors: &[&str]) -> Vec<FieldStrategy> {
    selectors.iter().map(|s| FieldStrategy::text(s)).collect()
}
