//! Listing page parser
//!
//! Extracts [`RawListing`]s from a search result page. A listing is never
//! dropped for a missing field: a missing id is synthesized and the rest is
//! left for the normalizer to fill with placeholders.

use scraper::{ElementRef, Html, Selector};
use tracing::{Level, debug, warn};

use super::config::ListingSelectors;
use super::strategy::{FieldChain, FieldStrategy};
use super::{ContextualParser, ParseContext, ParsingError, ParsingResult};
use crate::domain::listing::RawListing;

/// Parser for extracting listings from one site's result pages
#[derive(Debug, Clone)]
pub struct ListingParser {
    containers: Vec<(String, Selector)>,
    link: FieldChain,
    id: FieldChain,
    title: FieldChain,
    brand: FieldChain,
    price: FieldChain,
    original_price: FieldChain,
    discount: FieldChain,
    image: FieldChain,
    rating: FieldChain,
    rating_count: FieldChain,
    out_of_stock: FieldChain,
}

impl ListingParser {
    /// Compile the selector configuration.
    ///
    /// Invalid field strategies are skipped; the parser only fails when no
    /// container selector compiles.
    pub fn new(selectors: &ListingSelectors) -> ParsingResult<Self> {
        let containers = Self::compile_containers(&selectors.container)?;
        let chain = |field: &str, specs: &[FieldStrategy]| FieldChain::compile(field, specs).0;

        Ok(Self {
            containers,
            link: chain("link", &selectors.link),
            id: chain("id", &selectors.id),
            title: chain("title", &selectors.title),
            brand: chain("brand", &selectors.brand),
            price: chain("price", &selectors.price),
            original_price: chain("original_price", &selectors.original_price),
            discount: chain("discount", &selectors.discount),
            image: chain("image", &selectors.image).rejecting_suffixes(&selectors.placeholder_images),
            rating: chain("rating", &selectors.rating),
            rating_count: chain("rating_count", &selectors.rating_count),
            out_of_stock: chain("out_of_stock", &selectors.out_of_stock),
        })
    }

    fn compile_containers(selector_strings: &[String]) -> ParsingResult<Vec<(String, Selector)>> {
        let mut selectors = Vec::new();
        let mut errors = Vec::new();

        for selector_str in selector_strings {
            match Selector::parse(selector_str) {
                Ok(selector) => selectors.push((selector_str.clone(), selector)),
                Err(e) => {
                    warn!("Failed to compile container selector '{}': {}", selector_str, e);
                    errors.push(format!("'{selector_str}': {e}"));
                }
            }
        }

        if selectors.is_empty() {
            return Err(ParsingError::ConfigurationError {
                message: format!("No valid container selectors. Errors: {}", errors.join(", ")),
                field: "container".to_string(),
            });
        }
        Ok(selectors)
    }

    /// Parse a page. Zero extracted listings yields an empty list.
    pub fn parse(&self, html: &str, context: &ParseContext) -> Vec<RawListing> {
        self.parse_document(&Html::parse_document(html), context)
    }

    pub fn parse_document(&self, document: &Html, context: &ParseContext) -> Vec<RawListing> {
        self.parse_with_context(document, context).unwrap_or_else(|e| {
            report(&e);
            Vec::new()
        })
    }

    fn extract_listing(&self, element: &ElementRef<'_>, index: usize, context: &ParseContext) -> RawListing {
        let listing_url = self
            .link
            .extract(element, None)
            .and_then(|href| match context.base_url.join(&href) {
                Ok(url) => Some(url.to_string()),
                Err(e) => {
                    let err = ParsingError::UrlResolutionFailed {
                        url: href,
                        reason: e.to_string(),
                        base_url: Some(context.base_url.to_string()),
                    };
                    report(&err);
                    None
                }
            });

        let (native_id, id_synthesized) = match self.id.extract(element, listing_url.as_deref()) {
            Some(id) => (id, false),
            None => (context.synthesized_id(index), true),
        };

        let image_url = self
            .image
            .extract(element, None)
            .and_then(|src| context.base_url.join(&src).ok().map(String::from));

        let title = self.title.extract(element, None);
        if title.is_none() {
            report(&ParsingError::required_field_missing("title", Some(native_id.as_str())));
        }

        RawListing {
            native_id,
            id_synthesized,
            title,
            brand: self.brand.extract(element, None),
            price_text: self.price.extract(element, None),
            original_price_text: self.original_price.extract(element, None),
            discount_text: self.discount.extract(element, None),
            image_url,
            rating_text: self.rating.extract(element, None),
            rating_count_text: self.rating_count.extract(element, None),
            listing_url,
            in_stock: self.out_of_stock.is_empty() || self.out_of_stock.extract(element, None).is_none(),
        }
    }
}

fn report(err: &ParsingError) {
    if err.log_level() == Level::WARN {
        warn!("{}", err);
    } else {
        debug!("{}", err);
    }
}

impl ContextualParser for ListingParser {
    type Output = Vec<RawListing>;
    type Context = ParseContext;

    fn parse_with_context(&self, html: &Html, context: &Self::Context) -> ParsingResult<Self::Output> {
        let mut tried_selectors = Vec::new();

        for (selector_str, selector) in &self.containers {
            tried_selectors.push(selector_str.clone());
            let elements: Vec<ElementRef<'_>> = html.select(selector).collect();
            if elements.is_empty() {
                continue;
            }

            debug!(
                "Found {} {} listings on page {} using '{}'",
                elements.len(),
                context.source_name,
                context.page,
                selector_str
            );

            let listings = elements
                .iter()
                .enumerate()
                .map(|(index, element)| self.extract_listing(element, index, context))
                .collect();
            return Ok(listings);
        }

        Err(ParsingError::no_listings_found(
            &context.source_name,
            context.page,
            tried_selectors,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::parsing::config::texts;
    use url::Url;

    fn selectors() -> ListingSelectors {
        ListingSelectors {
            container: vec!["ul.missing li".into(), "div.card".into()],
            link: vec![FieldStrategy::attr("a.link", "href")],
            id: vec![
                FieldStrategy::container_attr("data-id"),
                FieldStrategy::link_pattern(r"/p/(\w+)$"),
            ],
            title: texts(&[".name"]),
            price: texts(&[".price"]),
            image: vec![
                FieldStrategy::attr("img", "src"),
                FieldStrategy::attr("img", "data-src"),
            ],
            out_of_stock: texts(&[".sold-out"]),
            placeholder_images: vec!["default-product.jpg".into()],
            ..ListingSelectors::default()
        }
    }

    fn context() -> ParseContext {
        ParseContext::new("Shop", Url::parse("https://shop.example").unwrap()).with_page(2)
    }

    const PAGE: &str = r#"
        <html><body>
          <div class="card" data-id="A1">
            <a class="link" href="/p/A1">x</a>
            <span class="name">  Cotton Brief </span>
            <span class="price">₹199</span>
            <img src="//cdn.example/a1.jpg">
          </div>
          <div class="card">
            <a class="link" href="/p/B2">x</a>
            <span class="price">₹249</span>
            <img src="/img/default-product.jpg" data-src="/img/b2.jpg">
            <span class="sold-out">Sold out</span>
          </div>
          <div class="card">
            <span class="name">No link here</span>
          </div>
        </body></html>
    "#;

    #[test]
    fn test_parse_listing_page() {
        let parser = ListingParser::new(&selectors()).unwrap();
        let listings = parser.parse(PAGE, &context());

        assert_eq!(listings.len(), 3);

        assert_eq!(listings[0].native_id, "A1");
        assert_eq!(listings[0].title.as_deref(), Some("Cotton Brief"));
        assert_eq!(listings[0].listing_url.as_deref(), Some("https://shop.example/p/A1"));
        assert_eq!(listings[0].image_url.as_deref(), Some("https://cdn.example/a1.jpg"));
        assert!(listings[0].in_stock);

        assert_eq!(listings[1].native_id, "B2");
        assert!(!listings[1].id_synthesized);
        assert_eq!(listings[1].title, None);
        assert_eq!(listings[1].image_url.as_deref(), Some("https://shop.example/img/b2.jpg"));
        assert!(!listings[1].in_stock);

        assert_eq!(listings[2].native_id, "Shop-p2-i2");
        assert!(listings[2].id_synthesized);
    }

    #[test]
    fn test_no_container_match_is_empty_not_error() {
        let parser = ListingParser::new(&selectors()).unwrap();
        assert!(parser.parse("<html><body><p>captcha</p></body></html>", &context()).is_empty());

        let document = Html::parse_document("<p>captcha</p>");
        let err = parser.parse_with_context(&document, &context()).unwrap_err();
        assert!(matches!(err, ParsingError::NoListingsFound { page: 2, .. }));
    }

    #[test]
    fn test_requires_a_valid_container_selector() {
        let bad = ListingSelectors {
            container: vec!["div[[".into()],
            ..ListingSelectors::default()
        };
        assert!(ListingParser::new(&bad).is_err());
    }
}
