//! Flipkart search result profile
//!
//! Flipkart ships hashed class names that change between deploys, so most
//! fields carry the old and the new class.

use url::Url;

use super::{SiteKind, SiteProfile};
use crate::infrastructure::parsing::config::texts;
use crate::infrastructure::parsing::{FieldStrategy, ListingSelectors};

pub use crate::domain::constants::FLIPKART as NAME;

pub fn profile(base_url: Url) -> SiteProfile {
    SiteProfile {
        name: NAME.to_string(),
        base_url,
        kind: SiteKind::Flipkart,
        selectors: selectors(),
        detail_selectors: detail_selectors(),
    }
}

fn selectors() -> ListingSelectors {
    ListingSelectors {
        container: vec![
            "div._1AtVbE div._13oc-S".to_string(),
            "div[data-id]".to_string(),
        ],
        link: vec![
            FieldStrategy::attr("a._1fQZEK", "href"),
            FieldStrategy::attr("a._2rpwqI", "href"),
            FieldStrategy::attr("a.s1Q9rs", "href"),
        ],
        id: vec![
            FieldStrategy::link_pattern(r"pid=([\w\d]+)"),
            FieldStrategy::container_attr("data-id"),
        ],
        title: texts(&["div._4rR01T", "a.s1Q9rs", "a.IRpwTa"]),
        brand: texts(&["div._2WkVRV"]),
        price: texts(&["div._30jeq3"]),
        original_price: texts(&["div._3I9_wc"]),
        discount: texts(&["div._3Ay6Sb span"]),
        image: vec![
            FieldStrategy::attr("img._396cs4", "src"),
            FieldStrategy::attr("img._2r_T1I", "src"),
        ],
        rating: texts(&["div._3LWZlK"]),
        rating_count: texts(&["span._2_R_DZ"]),
        out_of_stock: texts(&["div._192laR"]),
        ..ListingSelectors::default()
    }
}

/// Product page (`/<slug>/p/<item>?pid=<PID>`)
fn detail_selectors() -> ListingSelectors {
    ListingSelectors {
        container: vec!["div._1YokD2._3Mn1Gg".to_string(), "div.C7fEHH".to_string()],
        title: texts(&["span.B_NuCI", "span.VU-ZEz", "h1 span"]),
        brand: texts(&["span.G6XhRU", "span.mEh187"]),
        price: texts(&["div._30jeq3._16Jk6d", "div.Nx9bqj.CxhGGd"]),
        original_price: texts(&["div._3I9_wc._2p6lqe", "div.yRaY8j"]),
        discount: texts(&["div._3Ay6Sb._31Dcoz span", "div.UkUFwK span"]),
        image: vec![
            FieldStrategy::attr("img._396cs4._2amPTt", "src"),
            FieldStrategy::attr("img.DByuf4", "src"),
        ],
        rating: texts(&["div._3LWZlK", "div.XQDdHH"]),
        rating_count: texts(&["span._2_R_DZ", "span.Wphh3N"]),
        out_of_stock: texts(&["div._16FRp0", "div.Z8JjpR"]),
        ..ListingSelectors::default()
    }
}
