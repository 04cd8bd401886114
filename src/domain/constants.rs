//! Domain constants: brand catalog, product-type vocabulary and default sources

/// Brands recognised when a listing title does not carry an explicit brand field.
///
/// Matching is a case-insensitive substring test; the first catalog entry found wins.
pub const KNOWN_BRANDS: &[&str] = &[
    "Jockey",
    "Van Heusen",
    "Calvin Klein",
    "Tommy Hilfiger",
    "Zivame",
    "Clovia",
    "Amante",
    "Enamor",
    "Marks & Spencer",
    "H&M",
    "Under Armour",
    "Nike",
    "Adidas",
    "Puma",
    "Reebok",
    "Hanes",
    "Fruit of the Loom",
    "Diesel",
    "Hugo Boss",
    "Armani",
    "Ralph Lauren",
    "Triumph",
    "Wacoal",
    "Victoria's Secret",
    "La Senza",
    "Rupa",
    "Lux",
    "Dollar",
    "Amul",
];

pub const UNKNOWN_BRAND: &str = "Unknown";

pub const MEN_PRODUCT_TYPES: &[&str] = &["boxer", "brief", "trunk", "vest", "undershirt", "underwear"];

pub const WOMEN_PRODUCT_TYPES: &[&str] = &[
    "bra", "panty", "panties", "thong", "bikini", "hipster", "camisole", "slip",
];

pub const MEN_FALLBACK_TYPE: &str = "Men's Innerwear";
pub const WOMEN_FALLBACK_TYPE: &str = "Women's Innerwear";
pub const GENERIC_FALLBACK_TYPE: &str = "Innerwear";

/// Seed data for one of the built-in sources
#[derive(Debug, Clone, Copy)]
pub struct DefaultSource {
    pub name: &'static str,
    pub base_url: &'static str,
    pub logo_url: &'static str,
    pub search_endpoint: &'static str,
    pub product_endpoint: &'static str,
}

pub const AMAZON: &str = "Amazon";
pub const FLIPKART: &str = "Flipkart";
pub const MYNTRA: &str = "Myntra";
pub const AJIO: &str = "Ajio";

pub const DEFAULT_SOURCES: &[DefaultSource] = &[
    DefaultSource {
        name: AMAZON,
        base_url: "https://www.amazon.in",
        logo_url: "https://upload.wikimedia.org/wikipedia/commons/a/a9/Amazon_logo.svg",
        search_endpoint: "/s?k=",
        product_endpoint: "/dp/",
    },
    DefaultSource {
        name: FLIPKART,
        base_url: "https://www.flipkart.com",
        logo_url: "https://upload.wikimedia.org/wikipedia/commons/7/7a/Flipkart_logo.svg",
        search_endpoint: "/search?q=",
        product_endpoint: "/",
    },
    DefaultSource {
        name: MYNTRA,
        base_url: "https://www.myntra.com",
        logo_url: "https://upload.wikimedia.org/wikipedia/commons/b/bc/Myntra_Logo.png",
        search_endpoint: "/",
        product_endpoint: "/",
    },
    DefaultSource {
        name: AJIO,
        base_url: "https://www.ajio.com",
        logo_url: "https://upload.wikimedia.org/wikipedia/commons/8/80/Ajio_logo.svg",
        search_endpoint: "/s/",
        product_endpoint: "/p/",
    },
];

/// Task type tags used by the background services
pub mod task_types {
    pub const PRODUCT_REFRESH: &str = "product_refresh";
    pub const SCRAPE: &str = "scrape";
}
