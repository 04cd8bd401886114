//! Extraction and normalization throughput on a synthetic result page

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use url::Url;

use inshop_aggregator::domain::Gender;
use inshop_aggregator::domain::services::{NormalizeContext, normalize};
use inshop_aggregator::infrastructure::sources::amazon;
use inshop_aggregator::infrastructure::{ListingParser, ParseContext};

const TITLES: &[&str] = &[
    "Jockey Men's Cotton Brief (Pack of 2)",
    "Van Heusen Men's Solid Trunk",
    "Hanes   Men's Cotton Vest",
    "Rupa Frontline Men's Boxer Shorts",
    "Cotton Rich Innerwear Set",
];

fn result_page(listings: usize) -> String {
    let mut html = String::from("<html><body>");
    for i in 0..listings {
        let title = TITLES[i % TITLES.len()];
        html.push_str(&format!(
            r#"<div data-component-type="s-search-result" data-asin="B0{i:08}">
                 <h2><a href="/item/dp/B0{i:08}"><span>{title}</span></a></h2>
                 <span class="a-price"><span class="a-offscreen">₹{price}.00</span></span>
                 <span class="a-price a-text-price"><span class="a-offscreen">₹{original}.00</span></span>
                 <img class="s-image" src="https://m.media-amazon.com/images/I/{i}.jpg">
                 <i class="a-icon-star-small"><span class="a-icon-alt">4.{rating} out of 5 stars</span></i>
                 <span class="a-size-base s-underline-text">1,{i:03}</span>
               </div>"#,
            price = 199 + i,
            original = 399 + i,
            rating = i % 10,
        ));
    }
    html.push_str("</body></html>");
    html
}

fn bench_parse(c: &mut Criterion) {
    let base = Url::parse("https://www.amazon.in").unwrap();
    let profile = amazon::profile(base.clone());
    let parser = ListingParser::new(&profile.selectors).unwrap();
    let context = ParseContext::new(amazon::NAME, base);

    let mut group = c.benchmark_group("parse_result_page");
    for size in [10_usize, 50, 200] {
        let html = result_page(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &html, |b, html| {
            b.iter(|| parser.parse(black_box(html), &context));
        });
    }
    group.finish();
}

fn bench_normalize(c: &mut Criterion) {
    let base = Url::parse("https://www.amazon.in").unwrap();
    let profile = amazon::profile(base.clone());
    let parser = ListingParser::new(&profile.selectors).unwrap();
    let raw = parser.parse(&result_page(50), &ParseContext::new(amazon::NAME, base.clone()));
    let ctx = NormalizeContext::new(amazon::NAME, Some(Gender::Men)).with_base_url(&base);

    c.bench_function("normalize_50_listings", |b| {
        b.iter(|| {
            raw.iter()
                .map(|listing| normalize(black_box(listing), &ctx))
                .count()
        });
    });
}

criterion_group!(benches, bench_parse, bench_normalize);
criterion_main!(benches);
