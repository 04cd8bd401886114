//! Product matching against the SQLite-backed catalog

use std::sync::Arc;

use tempfile::TempDir;

use inshop_aggregator::domain::services::{MergeAction, ProductMatcher};
use inshop_aggregator::domain::{Gender, NormalizedListing, ProductRepository, Source, SourceRepository};
use inshop_aggregator::infrastructure::{DatabaseConnection, SqliteCatalog};

async fn catalog() -> (TempDir, Arc<SqliteCatalog>, Vec<Source>) {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite:{}", dir.path().join("aggregator.db").display());
    let db = DatabaseConnection::new(&url, 5).await.unwrap();
    db.migrate().await.unwrap();

    let store = Arc::new(SqliteCatalog::new(db.pool().clone()));
    let sources = store.initialize_defaults().await.unwrap();
    (dir, store, sources)
}

fn listing(id: &str, source: &Source, price: f64) -> NormalizedListing {
    NormalizedListing {
        id: id.to_string(),
        title: "Jockey Men's Cotton Brief".into(),
        brand: "Jockey".into(),
        gender: Gender::Men,
        product_type: "Brief".into(),
        price,
        original_price: Some(399.0),
        source_name: source.name.clone(),
        listing_url: Some(format!("{}/dp/{id}", source.base_url)),
        image_url: Some("https://img.example/brief.jpg".into()),
        rating: Some(4.1),
        rating_count: Some(87),
        in_stock: true,
    }
}

#[tokio::test]
async fn test_concurrent_merges_of_one_key_create_one_product() {
    let (_dir, store, sources) = catalog().await;
    let matcher = Arc::new(ProductMatcher::new(store.clone()));

    let source_count = sources.len();
    let mut handles = Vec::new();
    for i in 0..8 {
        let matcher = Arc::clone(&matcher);
        let source = sources[i % sources.len()].clone();
        handles.push(tokio::spawn(async move {
            let incoming = listing(&format!("N{}", i % source_count), &source, 199.0 + i as f64);
            matcher.merge(&incoming, &source).await
        }));
    }
    let mut created = 0;
    for handle in handles {
        if handle.await.unwrap().unwrap().action == MergeAction::Created {
            created += 1;
        }
    }

    assert_eq!(created, 1);
    let products = store.list_products().await.unwrap();
    assert_eq!(products.len(), 1);
    assert_eq!(products[0].listings.len(), sources.len());
}

#[tokio::test]
async fn test_new_source_adds_exactly_one_listing() {
    let (_dir, store, sources) = catalog().await;
    let matcher = ProductMatcher::new(store.clone());

    let first = matcher.merge(&listing("B0AAA11111", &sources[0], 199.0), &sources[0]).await.unwrap();
    assert_eq!(first.action, MergeAction::Created);

    let second = matcher.merge(&listing("UNDG7XJ8Q2", &sources[1], 249.0), &sources[1]).await.unwrap();
    assert_eq!(second.action, MergeAction::ListingAdded);
    assert_eq!(second.product.id, first.product.id);

    let stored = store.find_by_id(first.product.id.unwrap()).await.unwrap().unwrap();
    assert_eq!(stored.listings.len(), 2);
    assert_eq!(stored.price_range(), (Some(199.0), Some(249.0)));
}

#[tokio::test]
async fn test_known_source_updates_listing_in_place() {
    let (_dir, store, sources) = catalog().await;
    let matcher = ProductMatcher::new(store.clone());
    let amazon = &sources[0];

    let first = matcher.merge(&listing("B0AAA11111", amazon, 199.0), amazon).await.unwrap();
    let before = first.product.listings[0].last_checked;

    let second = matcher.merge(&listing("B0AAA11111", amazon, 179.0), amazon).await.unwrap();
    assert_eq!(second.action, MergeAction::ListingUpdated);

    let stored = store.find_by_id(first.product.id.unwrap()).await.unwrap().unwrap();
    assert_eq!(stored.listings.len(), 1);
    assert_eq!(stored.listings[0].price, 179.0);
    assert!(stored.listings[0].last_checked > before);
}

#[tokio::test]
async fn test_inactive_sources_are_hidden_from_active_listing() {
    let (_dir, store, sources) = catalog().await;
    assert_eq!(sources.len(), 4);

    assert!(store.set_source_active(sources[3].id, false).await.unwrap());
    let active = store.list_sources(true).await.unwrap();
    assert_eq!(active.len(), 3);
    assert!(active.iter().all(|s| s.name != sources[3].name));

    // Seeding again leaves existing rows alone
    store.initialize_defaults().await.unwrap();
    assert_eq!(store.list_sources(false).await.unwrap().len(), 4);
    assert_eq!(store.list_sources(true).await.unwrap().len(), 3);
}
