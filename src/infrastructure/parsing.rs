//! HTML listing extraction
//!
//! Selector-driven extraction of [`RawListing`](crate::domain::RawListing)s
//! from search result pages. Every field is read through an ordered chain of
//! strategies so a site redesign only needs new configuration.

pub mod config;
pub mod context;
pub mod listing_parser;
pub mod strategy;

// Re-export public types
pub use crate::infrastructure::parsing_error::{ParsingError, ParsingResult};
pub use config::ListingSelectors;
pub use context::ParseContext;
pub use listing_parser::ListingParser;
pub use strategy::{FieldChain, FieldStrategy};

use scraper::Html;

/// Parser trait with context support
pub trait ContextualParser {
    type Output;
    type Context;

    /// Parse HTML with contextual information
    fn parse_with_context(&self, html: &Html, context: &Self::Context) -> ParsingResult<Self::Output>;
}
