//! INShop - multi-source e-commerce listing aggregation
//!
//! Fetches innerwear listings from several e-commerce sites, reconciles them
//! into canonical products with per-source prices, and serves the merged,
//! ranked result with short-lived caching.

// Module declarations
pub mod application;
pub mod domain;
pub mod infrastructure;
