//! Source adapters
//!
//! One adapter per site. An adapter turns a [`FetchRequest`] into a page URL,
//! retrieves it through its own rate-limited [`HttpClient`] and extracts
//! [`RawListing`]s with the site's selector profile. Adapters never touch
//! persistence.

pub mod ajio;
pub mod amazon;
pub mod flipkart;
pub mod myntra;

use std::sync::Arc;

use async_trait::async_trait;
use scraper::Html;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use url::Url;

use crate::domain::constants::DEFAULT_SOURCES;
use crate::domain::listing::{FetchRequest, RawListing};
use crate::domain::product::Gender;
use crate::infrastructure::config::ScrapingConfig;
use crate::infrastructure::http_client::{FetchError, HttpClient, HttpClientConfig};
use crate::infrastructure::parsing::{
    ContextualParser, ListingParser, ListingSelectors, ParseContext, ParsingError,
};

/// Fetches and extracts listings from one e-commerce site
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Name matching the `Source` record this adapter feeds
    fn source_name(&self) -> &str;

    /// Base URL relative links and images are resolved against
    fn base_url(&self) -> &Url;

    /// Retrieve one page of listings.
    ///
    /// Zero extracted listings is `Ok(vec![])`, not an error.
    async fn fetch(
        &self,
        request: &FetchRequest,
        cancel: &CancellationToken,
    ) -> Result<Vec<RawListing>, FetchError>;
}

#[derive(Error, Debug)]
pub enum SourceSetupError {
    #[error("Invalid base URL for {source_name}: {reason}")]
    BaseUrl { source_name: String, reason: String },

    #[error("HTTP client for {source_name}: {source}")]
    Client {
        source_name: String,
        #[source]
        source: FetchError,
    },

    #[error("Selector profile for {source_name}: {source}")]
    Selectors {
        source_name: String,
        #[source]
        source: ParsingError,
    },
}

/// Search URL layout of a site
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SiteKind {
    /// `/s?k={gender} innerwear {query}&page=N`
    Amazon,
    /// `/search?q={gender} innerwear {query}&page=N`
    Flipkart,
    /// `/{gender}-innerwear-{query}?p=N`
    Myntra,
    /// `/s/{gender}/innerwear {query}?page=N`
    Ajio,
}

impl SiteKind {
    const fn page_param(self) -> &'static str {
        match self {
            Self::Myntra => "p",
            Self::Amazon | Self::Flipkart | Self::Ajio => "page",
        }
    }

    /// Build the search URL for `request`, ignoring any direct URL
    pub fn search_url(self, base_url: &Url, request: &FetchRequest) -> Result<Url, FetchError> {
        let query = collapse_whitespace(&request.query);
        let mut url = base_url.clone();
        url.set_query(None);

        {
            let mut segments = url.path_segments_mut().map_err(|()| FetchError::InvalidUrl {
                url: base_url.to_string(),
                reason: "base URL cannot carry a path".to_string(),
            })?;
            segments.pop_if_empty();

            match self {
                Self::Amazon => {
                    segments.push("s");
                }
                Self::Flipkart => {
                    segments.push("search");
                }
                Self::Myntra => {
                    let gender = request.gender.unwrap_or(Gender::Unisex);
                    let term = format!("{}-innerwear-{}", gender.as_str(), query.replace(' ', "-"));
                    segments.push(term.trim_end_matches('-'));
                }
                Self::Ajio => {
                    segments.push("s");
                    if let Some(gender) = request.gender.filter(|g| *g != Gender::Unisex) {
                        segments.push(gender.as_str());
                    }
                    segments.push(format!("innerwear {query}").trim());
                }
            }
        }

        match self {
            Self::Amazon => {
                url.query_pairs_mut().append_pair("k", &search_term(request.gender, &query));
            }
            Self::Flipkart => {
                url.query_pairs_mut().append_pair("q", &search_term(request.gender, &query));
            }
            Self::Myntra | Self::Ajio => {}
        }

        self.append_page(&mut url, request.page);
        Ok(url)
    }

    /// Resolve a direct listing URL against the base URL, composing the page in
    pub fn direct_url(self, base_url: &Url, direct: &str, page: u32) -> Result<Url, FetchError> {
        let mut url = base_url.join(direct).map_err(|e| FetchError::InvalidUrl {
            url: direct.to_string(),
            reason: e.to_string(),
        })?;
        self.append_page(&mut url, page);
        Ok(url)
    }

    fn append_page(self, url: &mut Url, page: u32) {
        if page > 1 {
            url.query_pairs_mut()
                .append_pair(self.page_param(), &page.to_string());
        }
    }
}

/// Free-text search term used by sites with a query parameter
fn search_term(gender: Option<Gender>, query: &str) -> String {
    let gender = gender.map_or("", Gender::as_str);
    format!("{gender} innerwear {query}").trim().to_string()
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Everything that distinguishes one site from another
#[derive(Debug, Clone)]
pub struct SiteProfile {
    pub name: String,
    pub base_url: Url,
    pub kind: SiteKind,
    pub selectors: ListingSelectors,
    /// Selectors for a single product page, used when refreshing a listing
    pub detail_selectors: ListingSelectors,
}

impl SiteProfile {
    pub fn request_url(&self, request: &FetchRequest) -> Result<Url, FetchError> {
        match &request.direct_url {
            Some(direct) => self.kind.direct_url(&self.base_url, direct, request.page),
            None => self.kind.search_url(&self.base_url, request),
        }
    }
}

/// Adapter for sites rendering their result pages as HTML
#[derive(Debug)]
pub struct HtmlSourceAdapter {
    profile: SiteProfile,
    client: HttpClient,
    parser: ListingParser,
    detail_parser: ListingParser,
}

impl HtmlSourceAdapter {
    pub fn new(profile: SiteProfile, client: HttpClient) -> Result<Self, SourceSetupError> {
        let compile = |selectors: &ListingSelectors| {
            ListingParser::new(selectors).map_err(|source| SourceSetupError::Selectors {
                source_name: profile.name.clone(),
                source,
            })
        };
        let parser = compile(&profile.selectors)?;
        let detail_parser = compile(&profile.detail_selectors)?;
        Ok(Self {
            profile,
            client,
            parser,
            detail_parser,
        })
    }

    /// Product pages carry one listing; fall back to the result layout for
    /// direct URLs that point at a listing page instead.
    fn extract(&self, html: &str, request: &FetchRequest) -> Vec<RawListing> {
        let document = Html::parse_document(html);
        let context = ParseContext::new(&self.profile.name, self.profile.base_url.clone())
            .with_page(request.page);
        if request.direct_url.is_some() {
            if let Ok(listings) = self.detail_parser.parse_with_context(&document, &context) {
                return listings;
            }
        }
        self.parser.parse_document(&document, &context)
    }

    pub const fn profile(&self) -> &SiteProfile {
        &self.profile
    }
}

#[async_trait]
impl SourceAdapter for HtmlSourceAdapter {
    fn source_name(&self) -> &str {
        &self.profile.name
    }

    fn base_url(&self) -> &Url {
        &self.profile.base_url
    }

    async fn fetch(
        &self,
        request: &FetchRequest,
        cancel: &CancellationToken,
    ) -> Result<Vec<RawListing>, FetchError> {
        let url = self.profile.request_url(request)?;
        let html = self.client.get_text(&url, cancel).await?;
        let listings = self.extract(&html, request);

        if listings.is_empty() {
            info!("{}: no listings extracted from {}", self.profile.name, url);
        } else {
            debug!("{}: extracted {} listings from {}", self.profile.name, listings.len(), url);
        }
        Ok(listings)
    }
}

/// Selector profile of a built-in site
pub fn default_profile(name: &str, base_url: Url) -> Option<SiteProfile> {
    match name {
        n if n.eq_ignore_ascii_case(amazon::NAME) => Some(amazon::profile(base_url)),
        n if n.eq_ignore_ascii_case(flipkart::NAME) => Some(flipkart::profile(base_url)),
        n if n.eq_ignore_ascii_case(myntra::NAME) => Some(myntra::profile(base_url)),
        n if n.eq_ignore_ascii_case(ajio::NAME) => Some(ajio::profile(base_url)),
        _ => None,
    }
}

/// Build one adapter per built-in site, each with its own HTTP client
pub fn build_default_adapters(
    config: &ScrapingConfig,
) -> Result<Vec<Arc<dyn SourceAdapter>>, SourceSetupError> {
    let mut adapters: Vec<Arc<dyn SourceAdapter>> = Vec::with_capacity(DEFAULT_SOURCES.len());

    for source in DEFAULT_SOURCES {
        let raw_base = config.base_url_override(source.name).unwrap_or(source.base_url);
        let base_url = Url::parse(raw_base).map_err(|e| SourceSetupError::BaseUrl {
            source_name: source.name.to_string(),
            reason: e.to_string(),
        })?;

        let Some(profile) = default_profile(source.name, base_url) else {
            continue;
        };
        let client = HttpClient::new(HttpClientConfig::from(config)).map_err(|source_err| {
            SourceSetupError::Client {
                source_name: source.name.to_string(),
                source: source_err,
            }
        })?;

        info!("Registered source adapter {} ({})", profile.name, profile.base_url);
        adapters.push(Arc::new(HtmlSourceAdapter::new(profile, client)?));
    }

    Ok(adapters)
}
