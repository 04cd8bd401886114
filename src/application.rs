//! Application layer module
//!
//! This module contains the use cases and data transfer objects that
//! orchestrate the domain logic: search aggregation and background refresh.

pub mod aggregation;
pub mod dto;
pub mod refresh;

// Re-export commonly used items
pub use aggregation::{
    AggregationCache, AggregationError, AggregationReport, AggregationRequest, Aggregator,
    CatalogHandle, SourceOutcome, SourceReport,
};
pub use dto::{AggregatedProduct, ProductFilter};
pub use refresh::{RefreshError, RefreshService};
