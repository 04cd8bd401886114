//! Ajio search result profile
//!
//! Ajio lazy-loads images: `src` holds a placeholder until the real URL is
//! copied over from `data-src`.

use url::Url;

use super::{SiteKind, SiteProfile};
use crate::infrastructure::parsing::config::texts;
use crate::infrastructure::parsing::{FieldStrategy, ListingSelectors};

pub use crate::domain::constants::AJIO as NAME;

pub fn profile(base_url: Url) -> SiteProfile {
    SiteProfile {
        name: NAME.to_string(),
        base_url,
        kind: SiteKind::Ajio,
        selectors: selectors(),
        detail_selectors: detail_selectors(),
    }
}

fn selectors() -> ListingSelectors {
    ListingSelectors {
        container: vec!["div.item.rilrtl-products-list__item".to_string(), "div.item".to_string()],
        link: vec![FieldStrategy::attr("a.rilrtl-products-list__link", "href")],
        id: vec![FieldStrategy::link_pattern(r"/p/([\w\d]+)$")],
        title: texts(&[".nameCls", ".name"]),
        brand: texts(&[".brand"]),
        price: texts(&[".price strong", ".price"]),
        original_price: texts(&[".orginal-price", ".original-price"]),
        discount: texts(&[".discount"]),
        image: vec![
            FieldStrategy::attr("img.rilrtl-lazy-img", "src"),
            FieldStrategy::attr("img.rilrtl-lazy-img", "data-src"),
        ],
        rating: texts(&["._3I65V"]),
        out_of_stock: texts(&[".out-of-stock", ".oos-label"]),
        placeholder_images: vec!["default-product.jpg".to_string()],
        ..ListingSelectors::default()
    }
}

/// Product page (`/<slug>/p/<code>`)
fn detail_selectors() -> ListingSelectors {
    ListingSelectors {
        container: vec!["div.prod-container".to_string(), "div.prod-content".to_string()],
        title: texts(&["h1.prod-name"]),
        brand: texts(&["h2.brand-name"]),
        price: texts(&["div.prod-sp"]),
        original_price: texts(&["span.prod-cp"]),
        discount: texts(&["span.prod-discnt"]),
        image: vec![
            FieldStrategy::attr("img.rilrtl-lazy-img", "src"),
            FieldStrategy::attr("img.rilrtl-lazy-img", "data-src"),
        ],
        out_of_stock: texts(&[".out-of-stock", ".oos-label"]),
        placeholder_images: vec!["default-product.jpg".to_string()],
        ..ListingSelectors::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::parsing::{ListingParser, ParseContext};

    #[test]
    fn test_placeholder_image_falls_through_to_data_src() {
        let html = r#"
            <div class="item rilrtl-products-list__item">
              <a class="rilrtl-products-list__link" href="/jockey-brief/p/460123456">
                <img class="rilrtl-lazy-img" src="/static/default-product.jpg" data-src="https://assets.ajio.com/b1.jpg">
                <div class="brand">Jockey</div>
                <div class="nameCls">Pack of 2 Briefs</div>
                <span class="price"><strong>Rs.499</strong></span>
                <span class="discount">(50% off)</span>
              </a>
            </div>"#;
        let base_url = Url::parse("https://www.ajio.com").unwrap();
        let parser = ListingParser::new(&profile(base_url.clone()).selectors).unwrap();
        let listings = parser.parse(html, &ParseContext::new(NAME, base_url));

        assert_eq!(listings.len(), 1);
        let listing = &listings[0];
        assert_eq!(listing.native_id, "460123456");
        assert!(!listing.id_synthesized);
        assert_eq!(listing.image_url.as_deref(), Some("https://assets.ajio.com/b1.jpg"));
        assert_eq!(listing.brand.as_deref(), Some("Jockey"));
        assert_eq!(listing.price_text.as_deref(), Some("Rs.499"));
        assert_eq!(listing.discount_text.as_deref(), Some("(50% off)"));
        assert!(listing.in_stock);
    }
}
