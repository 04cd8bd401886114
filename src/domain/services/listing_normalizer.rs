//! Listing normalizer
//!
//! Turns the loosely-typed text pulled out of a source page into a
//! [`NormalizedListing`]. Every function here is pure; a field that cannot be
//! interpreted degrades to a placeholder instead of failing the listing.

use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

use crate::domain::constants::{
    GENERIC_FALLBACK_TYPE, KNOWN_BRANDS, MEN_FALLBACK_TYPE, MEN_PRODUCT_TYPES, UNKNOWN_BRAND,
    WOMEN_FALLBACK_TYPE, WOMEN_PRODUCT_TYPES,
};
use crate::domain::listing::{NormalizedListing, RawListing};
use crate::domain::product::Gender;

static NUMBER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d[\d,]*(?:\.\d+)?").expect("static number regex"));
static DECIMAL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d+(?:\.\d+)?").expect("static decimal regex"));
static COUNT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d[\d,]*(?:\.\d+)?)\s*(?:([kKlLmM])\b)?").expect("static count regex")
});
static PERCENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+(?:\.\d+)?)\s*%").expect("static percent regex"));
static TYPE_PATTERNS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    MEN_PRODUCT_TYPES
        .iter()
        .chain(WOMEN_PRODUCT_TYPES)
        .map(|word| {
            let re = Regex::new(&format!(r"\b{word}s?\b")).expect("static type regex");
            (*word, re)
        })
        .collect()
});

/// Per-call inputs that do not come from the listing itself
#[derive(Debug, Clone)]
pub struct NormalizeContext<'a> {
    pub source_name: &'a str,
    /// Gender filter of the originating request
    pub gender: Option<Gender>,
    /// Base for resolving relative listing and image URLs
    pub base_url: Option<&'a Url>,
}

impl<'a> NormalizeContext<'a> {
    pub const fn new(source_name: &'a str, gender: Option<Gender>) -> Self {
        Self {
            source_name,
            gender,
            base_url: None,
        }
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: &'a Url) -> Self {
        self.base_url = Some(base_url);
        self
    }
}

pub fn normalize(raw: &RawListing, ctx: &NormalizeContext<'_>) -> NormalizedListing {
    let gender = ctx.gender.unwrap_or(Gender::Unisex);
    let raw_title = raw.title.as_deref().map(collapse_whitespace).filter(|t| !t.is_empty());

    let brand = raw
        .brand
        .as_deref()
        .map(collapse_whitespace)
        .filter(|b| !b.is_empty())
        .unwrap_or_else(|| infer_brand(raw_title.as_deref().unwrap_or_default()));

    let product_type = classify_type(raw_title.as_deref().unwrap_or_default(), ctx.gender);

    let price = raw.price_text.as_deref().and_then(parse_price).unwrap_or(0.0);
    let original_price = raw
        .original_price_text
        .as_deref()
        .and_then(parse_price)
        .filter(|op| *op >= price)
        .or_else(|| {
            raw.discount_text
                .as_deref()
                .and_then(parse_discount_percent)
                .and_then(|pct| derive_original_price(price, pct))
        });

    let title = raw_title.unwrap_or_else(|| format!("{} listing {}", ctx.source_name, raw.native_id));

    NormalizedListing {
        id: raw.native_id.clone(),
        title,
        brand,
        gender,
        product_type,
        price,
        original_price,
        source_name: ctx.source_name.to_string(),
        listing_url: resolve(raw.listing_url.as_deref(), ctx.base_url),
        image_url: resolve(raw.image_url.as_deref(), ctx.base_url),
        rating: raw.rating_text.as_deref().and_then(parse_rating),
        rating_count: raw.rating_count_text.as_deref().and_then(parse_count),
        in_stock: raw.in_stock,
    }
}

/// First numeric run with currency symbols and thousands separators ignored
pub fn parse_price(text: &str) -> Option<f64> {
    let m = NUMBER_RE.find(text)?;
    m.as_str().replace(',', "").parse::<f64>().ok()
}

pub fn parse_rating(text: &str) -> Option<f64> {
    let m = DECIMAL_RE.find(text)?;
    m.as_str()
        .parse::<f64>()
        .ok()
        .filter(|r| (0.0..=5.0).contains(r))
}

/// Review or rating count, honoring abbreviated thousands (`k`), lakhs (`L`)
/// and millions (`M`)
pub fn parse_count(text: &str) -> Option<u32> {
    let caps = COUNT_RE.captures(text)?;
    let value: f64 = caps.get(1)?.as_str().replace(',', "").parse().ok()?;
    let count = match caps.get(2).map(|m| m.as_str().to_ascii_lowercase()) {
        Some(suffix) => {
            let multiplier = match suffix.as_str() {
                "k" => 1_000.0,
                "l" => 100_000.0,
                _ => 1_000_000.0,
            };
            (value * multiplier).round()
        }
        None => value.trunc(),
    };
    (count <= f64::from(u32::MAX)).then_some(count as u32)
}

pub fn parse_discount_percent(text: &str) -> Option<f64> {
    let caps = PERCENT_RE.captures(text)?;
    caps.get(1)?.as_str().parse().ok()
}

/// `price / (1 - pct/100)` rounded to 2 decimals, only for a known price and
/// a percentage strictly between 0 and 100
pub fn derive_original_price(price: f64, pct: f64) -> Option<f64> {
    if price <= 0.0 || pct <= 0.0 || pct >= 100.0 {
        return None;
    }
    let original = price / (1.0 - pct / 100.0);
    Some((original * 100.0).round() / 100.0)
}

/// Known-brand catalog match, else the first title token, else `"Unknown"`
pub fn infer_brand(title: &str) -> String {
    let lower = title.to_lowercase();
    if let Some(brand) = KNOWN_BRANDS
        .iter()
        .find(|brand| lower.contains(&brand.to_lowercase()))
    {
        return (*brand).to_string();
    }

    title
        .split_whitespace()
        .next()
        .map_or_else(|| UNKNOWN_BRAND.to_string(), str::to_string)
}

pub fn classify_type(title: &str, gender: Option<Gender>) -> String {
    let lower = title.to_lowercase();
    let allowed: &[&str] = match gender {
        Some(Gender::Men) => MEN_PRODUCT_TYPES,
        Some(Gender::Women) => WOMEN_PRODUCT_TYPES,
        Some(Gender::Unisex) | None => &[],
    };

    let found = TYPE_PATTERNS
        .iter()
        .filter(|(word, _)| allowed.is_empty() || allowed.contains(word))
        .find(|(_, re)| re.is_match(&lower))
        .map(|(word, _)| capitalize(word));

    found.unwrap_or_else(|| {
        match gender {
            Some(Gender::Men) => MEN_FALLBACK_TYPE,
            Some(Gender::Women) => WOMEN_FALLBACK_TYPE,
            Some(Gender::Unisex) | None => GENERIC_FALLBACK_TYPE,
        }
        .to_string()
    })
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn resolve(href: Option<&str>, base: Option<&Url>) -> Option<String> {
    let href = href.map(str::trim).filter(|h| !h.is_empty())?;
    match base {
        Some(base) => base.join(href).ok().map(String::from),
        None => Some(href.to_string()),
    }
}
