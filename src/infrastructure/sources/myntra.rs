//! Myntra search result profile

use url::Url;

use super::{SiteKind, SiteProfile};
use crate::infrastructure::parsing::config::texts;
use crate::infrastructure::parsing::{FieldStrategy, ListingSelectors};

pub use crate::domain::constants::MYNTRA as NAME;

pub fn profile(base_url: Url) -> SiteProfile {
    SiteProfile {
        name: NAME.to_string(),
        base_url,
        kind: SiteKind::Myntra,
        selectors: selectors(),
        detail_selectors: detail_selectors(),
    }
}

fn selectors() -> ListingSelectors {
    ListingSelectors {
        container: vec!["ul.results-base li.product-base".to_string(), "li.product-base".to_string()],
        link: vec![
            FieldStrategy::attr("a.product-link", "href"),
            FieldStrategy::attr("a", "href"),
        ],
        id: vec![
            FieldStrategy::link_pattern(r"/(\d+)(?:/buy)?/?$"),
            FieldStrategy::container_attr("data-id"),
            FieldStrategy::container_attr("id"),
        ],
        title: texts(&[".product-product", ".product-title"]),
        brand: texts(&[".product-brand"]),
        price: texts(&[".product-discountedPrice", ".product-price"]),
        original_price: texts(&[".product-strike"]),
        discount: texts(&[".product-discountPercentage"]),
        image: vec![
            FieldStrategy::attr("img.product-image", "src"),
            FieldStrategy::attr("img", "src"),
        ],
        rating: texts(&[".product-ratingsContainer span"]),
        rating_count: texts(&[".product-ratingsCount"]),
        out_of_stock: texts(&[".product-sizeNoInventoryPresent", ".product-outOfStock"]),
        ..ListingSelectors::default()
    }
}

/// Product page (`/<category>/<brand>/<slug>/<id>/buy`)
fn detail_selectors() -> ListingSelectors {
    ListingSelectors {
        container: vec!["div.pdp-details".to_string(), "div.pdp-description-container".to_string()],
        title: texts(&["h1.pdp-name"]),
        brand: texts(&["h1.pdp-title"]),
        price: texts(&["span.pdp-price strong", "span.pdp-price"]),
        original_price: texts(&["span.pdp-mrp s", "span.pdp-mrp"]),
        discount: texts(&["span.pdp-discount"]),
        rating: texts(&["div.index-overallRating div"]),
        rating_count: texts(&["div.index-ratingsCount"]),
        out_of_stock: texts(&["div.size-buttons-out-of-stock", "div.pdp-out-of-stock"]),
        ..ListingSelectors::default()
    }
}
