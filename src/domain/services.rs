//! Domain services
//!
//! Contains business logic that doesn't naturally fit within entities.

pub mod listing_normalizer;
pub mod product_matcher;

pub use listing_normalizer::{NormalizeContext, normalize};
pub use product_matcher::{MatchError, MergeAction, MergeOutcome, ProductMatcher};
