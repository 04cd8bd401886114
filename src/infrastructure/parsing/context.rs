//! Parsing context for listing extraction

use url::Url;

/// Context information for parsing one result page
#[derive(Debug, Clone)]
pub struct ParseContext {
    /// Source the page was fetched from
    pub source_name: String,

    /// Base URL for resolving relative links
    pub base_url: Url,

    /// 1-based page number, used for synthesized ids
    pub page: u32,
}

impl ParseContext {
    pub fn new(source_name: impl Into<String>, base_url: Url) -> Self {
        Self {
            source_name: source_name.into(),
            base_url,
            page: 1,
        }
    }

    #[must_use]
    pub fn with_page(mut self, page: u32) -> Self {
        self.page = page;
        self
    }

    /// Fallback id for a listing no id strategy could read
    pub fn synthesized_id(&self, index: usize) -> String {
        format!("{}-p{}-i{}", self.source_name, self.page, index)
    }
}
