//! Infrastructure layer for storage, retrieval, parsing and runtime setup
//!
//! This module provides the catalog stores, the per-site source adapters with
//! their HTTP client and HTML extraction, the result cache, configuration and
//! logging bootstrap.

pub mod config;
pub mod database_connection;
pub mod http_client;
pub mod logging;
pub mod memory_store;  // Catalog for tests and embedding
pub mod parsing;  // Selector-driven listing extraction
pub mod parsing_error;
pub mod result_cache;
pub mod sources;  // One adapter per e-commerce site
pub mod sqlite_store;

// Re-export commonly used items
pub use config::{AppConfig, ConfigError};
pub use database_connection::DatabaseConnection;
pub use http_client::{FetchError, HttpClient, HttpClientConfig};
pub use logging::{init_logging, init_logging_with_config};
pub use memory_store::InMemoryCatalog;
pub use parsing::{ListingParser, ListingSelectors, ParseContext, ParsingError, ParsingResult};
pub use result_cache::{CacheStats, ResultCache};
pub use sources::{HtmlSourceAdapter, SiteProfile, SourceAdapter, SourceSetupError, build_default_adapters};
pub use sqlite_store::SqliteCatalog;
