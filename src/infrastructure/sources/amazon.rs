//! Amazon search result profile

use url::Url;

use super::{SiteKind, SiteProfile};
use crate::infrastructure::parsing::config::texts;
use crate::infrastructure::parsing::{FieldStrategy, ListingSelectors};

pub use crate::domain::constants::AMAZON as NAME;

pub fn profile(base_url: Url) -> SiteProfile {
    SiteProfile {
        name: NAME.to_string(),
        base_url,
        kind: SiteKind::Amazon,
        selectors: selectors(),
        detail_selectors: detail_selectors(),
    }
}

fn selectors() -> ListingSelectors {
    ListingSelectors {
        container: vec![
            r#"div[data-component-type="s-search-result"]"#.to_string(),
            "div.s-result-item[data-asin]".to_string(),
        ],
        link: vec![
            FieldStrategy::attr("h2 a", "href"),
            FieldStrategy::attr("a.a-link-normal.s-no-outline", "href"),
        ],
        id: vec![
            FieldStrategy::container_attr("data-asin"),
            FieldStrategy::link_pattern(r"/dp/([A-Z0-9]{10})"),
        ],
        title: texts(&["h2 a span", "h2 span", "h2"]),
        price: texts(&[".a-price .a-offscreen", ".a-price-whole"]),
        original_price: texts(&[".a-text-price .a-offscreen", ".a-text-price span"]),
        image: vec![
            FieldStrategy::attr("img.s-image", "src"),
            FieldStrategy::attr("img", "src"),
        ],
        rating: texts(&[".a-icon-star-small .a-icon-alt", ".a-icon-star-small", ".a-icon-alt"]),
        rating_count: texts(&["span.a-size-base.s-underline-text", "a[href*='customerReviews'] span"]),
        ..ListingSelectors::default()
    }
}

/// Product page (`/dp/<ASIN>`)
fn detail_selectors() -> ListingSelectors {
    ListingSelectors {
        container: vec!["#dp".to_string(), "#ppd".to_string()],
        id: vec![FieldStrategy::attr("input#ASIN", "value")],
        title: texts(&["#productTitle"]),
        brand: texts(&["#bylineInfo"]),
        price: texts(&[
            "#corePrice_feature_div .a-offscreen",
            "#corePriceDisplay_desktop_feature_div .a-price .a-offscreen",
            "#priceblock_ourprice",
            "#priceblock_dealprice",
        ]),
        original_price: texts(&[
            "#corePriceDisplay_desktop_feature_div .a-text-price .a-offscreen",
            ".basisPrice .a-offscreen",
        ]),
        image: vec![
            FieldStrategy::attr("#landingImage", "src"),
            FieldStrategy::attr("#imgTagWrapperId img", "src"),
        ],
        rating: texts(&["#acrPopover .a-icon-alt", "#averageCustomerReviews .a-icon-alt"]),
        rating_count: texts(&["#acrCustomerReviewText"]),
        out_of_stock: texts(&["#outOfStock"]),
        ..ListingSelectors::default()
    }
}
