//! Domain module - Core business logic and entities
//!
//! This module contains the canonical product model, the ephemeral listing
//! types produced by source adapters, repository interfaces, the task
//! registry and the domain services (normalizer and matcher).
//!
//! Modern Rust module organization (Rust 2018+ style):
//! - Each module is its own file in the domain/ directory
//! - Public exports are defined here for convenience

pub mod constants;
pub mod listing;
pub mod product;
pub mod repositories;
pub mod services;
pub mod task_registry;

// Re-export commonly used items for convenience
pub use listing::{FetchRequest, NormalizedListing, RawListing};
pub use product::{
    CanonicalProduct, Gender, NewReview, NewSource, ProductKey, RatingSummary, Review, SortOrder,
    Source, SourceListing,
};
pub use repositories::{
    CatalogStore, ProductRepository, ReviewRepository, SourceRepository, StoreError, StoreResult,
};
pub use task_registry::{Task, TaskError, TaskRegistry, TaskStatus};
