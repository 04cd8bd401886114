//! SQLite-backed catalog store
//!
//! Every product aggregate is written in one transaction: the product row and
//! its complete listing set are replaced together, so a failed write leaves the
//! previously committed aggregate untouched.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::{debug, error};

use crate::domain::product::{
    CanonicalProduct, Gender, NewReview, NewSource, ProductKey, RatingSummary, Review, Source,
    SourceListing,
};
use crate::domain::repositories::{
    ProductRepository, ReviewRepository, SourceRepository, StoreError, StoreResult,
};

const PRODUCT_COLUMNS: &str = "id, name, brand, gender, product_type, description, material, fit, \
     pattern, rise, occasion, care_instructions, features, available_sizes, available_colors, \
     images, created_at, updated_at";

const LISTING_SELECT: &str = "SELECT ps.product_id, ps.source_id, s.name AS source_name, \
     ps.source_product_id, ps.source_url, ps.price, ps.original_price, ps.in_stock, ps.rating, \
     ps.rating_count, ps.last_checked \
     FROM product_sources ps JOIN sources s ON s.id = ps.source_id";

const SOURCE_COLUMNS: &str = "id, name, base_url, logo_url, is_active, search_endpoint, \
     product_endpoint, created_at, updated_at";

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => Self::NotFound(err.to_string()),
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                Self::Conflict(db.message().to_string())
            }
            _ => Self::Backend(err.to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SqliteCatalog {
    pool: SqlitePool,
}

impl SqliteCatalog {
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn load_listings(&self, product_id: i64) -> StoreResult<Vec<SourceListing>> {
        let sql = format!("{LISTING_SELECT} WHERE ps.product_id = ? ORDER BY ps.position");
        let rows = sqlx::query(&sql).bind(product_id).fetch_all(&self.pool).await?;
        rows.iter().map(listing_from_row).collect()
    }

    async fn load_product(&self, row: &SqliteRow) -> StoreResult<CanonicalProduct> {
        let mut product = product_from_row(row)?;
        if let Some(id) = product.id {
            product.listings = self.load_listings(id).await?;
        }
        Ok(product)
    }
}

fn json_list(row: &SqliteRow, column: &str) -> StoreResult<Vec<String>> {
    let raw: String = row.try_get(column)?;
    serde_json::from_str(&raw)
        .map_err(|e| StoreError::Backend(format!("corrupt {column} column: {e}")))
}

fn to_json(values: &[String]) -> StoreResult<String> {
    serde_json::to_string(values).map_err(|e| StoreError::Backend(e.to_string()))
}

fn product_from_row(row: &SqliteRow) -> StoreResult<CanonicalProduct> {
    let gender: String = row.try_get("gender")?;
    Ok(CanonicalProduct {
        id: Some(row.try_get("id")?),
        name: row.try_get("name")?,
        brand: row.try_get("brand")?,
        gender: gender.parse::<Gender>().map_err(StoreError::Backend)?,
        product_type: row.try_get("product_type")?,
        description: row.try_get("description")?,
        material: row.try_get("material")?,
        fit: row.try_get("fit")?,
        pattern: row.try_get("pattern")?,
        rise: row.try_get("rise")?,
        occasion: row.try_get("occasion")?,
        care_instructions: row.try_get("care_instructions")?,
        features: json_list(row, "features")?,
        available_sizes: json_list(row, "available_sizes")?,
        available_colors: json_list(row, "available_colors")?,
        images: json_list(row, "images")?,
        listings: Vec::new(),
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn listing_from_row(row: &SqliteRow) -> StoreResult<SourceListing> {
    let rating_count: Option<i64> = row.try_get("rating_count")?;
    Ok(SourceListing {
        source_id: row.try_get("source_id")?,
        source_name: row.try_get("source_name")?,
        source_product_id: row.try_get("source_product_id")?,
        source_url: row.try_get("source_url")?,
        price: row.try_get("price")?,
        original_price: row.try_get("original_price")?,
        in_stock: row.try_get("in_stock")?,
        rating: row.try_get("rating")?,
        rating_count: rating_count.and_then(|c| u32::try_from(c).ok()),
        last_checked: row.try_get("last_checked")?,
    })
}

fn source_from_row(row: &SqliteRow) -> StoreResult<Source> {
    Ok(Source {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        base_url: row.try_get("base_url")?,
        logo_url: row.try_get("logo_url")?,
        is_active: row.try_get("is_active")?,
        search_endpoint: row.try_get("search_endpoint")?,
        product_endpoint: row.try_get("product_endpoint")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn review_from_row(row: &SqliteRow) -> StoreResult<Review> {
    Ok(Review {
        id: row.try_get("id")?,
        product_id: row.try_get("product_id")?,
        source_id: row.try_get("source_id")?,
        reviewer_name: row.try_get("reviewer_name")?,
        rating: row.try_get("rating")?,
        title: row.try_get("title")?,
        content: row.try_get("content")?,
        source_review_id: row.try_get("source_review_id")?,
        review_date: row.try_get::<Option<DateTime<Utc>>, _>("review_date")?,
        created_at: row.try_get("created_at")?,
    })
}

#[async_trait]
impl ProductRepository for SqliteCatalog {
    async fn find_by_key(&self, key: &ProductKey) -> StoreResult<Option<CanonicalProduct>> {
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE name = ? AND brand = ? AND gender = ?"
        );
        let row = sqlx::query(&sql)
            .bind(&key.name)
            .bind(&key.brand)
            .bind(key.gender.as_str())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(self.load_product(&row).await?)),
            None => Ok(None),
        }
    }

    async fn find_by_id(&self, id: i64) -> StoreResult<Option<CanonicalProduct>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?");
        let row = sqlx::query(&sql).bind(id).fetch_optional(&self.pool).await?;

        match row {
            Some(row) => Ok(Some(self.load_product(&row).await?)),
            None => Ok(None),
        }
    }

    async fn save_product(&self, product: &CanonicalProduct) -> StoreResult<CanonicalProduct> {
        let features = to_json(&product.features)?;
        let sizes = to_json(&product.available_sizes)?;
        let colors = to_json(&product.available_colors)?;
        let images = to_json(&product.images)?;

        let mut tx = self.pool.begin().await?;

        let id = match product.id {
            None => {
                let result = sqlx::query(
                    "INSERT INTO products (name, brand, gender, product_type, description, material, \
                     fit, pattern, rise, occasion, care_instructions, features, available_sizes, \
                     available_colors, images, created_at, updated_at) \
                     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                )
                .bind(&product.name)
                .bind(&product.brand)
                .bind(product.gender.as_str())
                .bind(&product.product_type)
                .bind(&product.description)
                .bind(&product.material)
                .bind(&product.fit)
                .bind(&product.pattern)
                .bind(&product.rise)
                .bind(&product.occasion)
                .bind(&product.care_instructions)
                .bind(&features)
                .bind(&sizes)
                .bind(&colors)
                .bind(&images)
                .bind(product.created_at)
                .bind(product.updated_at)
                .execute(&mut *tx)
                .await?;
                result.last_insert_rowid()
            }
            Some(id) => {
                let result = sqlx::query(
                    "UPDATE products SET name = ?, brand = ?, gender = ?, product_type = ?, \
                     description = ?, material = ?, fit = ?, pattern = ?, rise = ?, occasion = ?, \
                     care_instructions = ?, features = ?, available_sizes = ?, available_colors = ?, \
                     images = ?, updated_at = ? WHERE id = ?",
                )
                .bind(&product.name)
                .bind(&product.brand)
                .bind(product.gender.as_str())
                .bind(&product.product_type)
                .bind(&product.description)
                .bind(&product.material)
                .bind(&product.fit)
                .bind(&product.pattern)
                .bind(&product.rise)
                .bind(&product.occasion)
                .bind(&product.care_instructions)
                .bind(&features)
                .bind(&sizes)
                .bind(&colors)
                .bind(&images)
                .bind(product.updated_at)
                .bind(id)
                .execute(&mut *tx)
                .await?;
                if result.rows_affected() == 0 {
                    return Err(StoreError::NotFound(format!("product {id}")));
                }
                id
            }
        };

        sqlx::query("DELETE FROM product_sources WHERE product_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        for (position, listing) in product.listings.iter().enumerate() {
            sqlx::query(
                "INSERT INTO product_sources (product_id, source_id, position, source_product_id, \
                 source_url, price, original_price, in_stock, rating, rating_count, last_checked) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(id)
            .bind(listing.source_id)
            .bind(i64::try_from(position).unwrap_or(i64::MAX))
            .bind(&listing.source_product_id)
            .bind(&listing.source_url)
            .bind(listing.price)
            .bind(listing.original_price)
            .bind(listing.in_stock)
            .bind(listing.rating)
            .bind(listing.rating_count.map(i64::from))
            .bind(listing.last_checked)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await.map_err(|e| {
            error!("Commit of product {} failed: {}", product.key(), e);
            StoreError::from(e)
        })?;

        debug!("Saved product {} ({} listings)", id, product.listings.len());
        let mut saved = product.clone();
        saved.id = Some(id);
        Ok(saved)
    }

    async fn list_products(&self) -> StoreResult<Vec<CanonicalProduct>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products ORDER BY id");
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        let mut products = rows.iter().map(product_from_row).collect::<StoreResult<Vec<_>>>()?;

        let sql = format!("{LISTING_SELECT} ORDER BY ps.product_id, ps.position");
        let listing_rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        let mut listings: HashMap<i64, Vec<SourceListing>> = HashMap::new();
        for row in &listing_rows {
            let product_id: i64 = row.try_get("product_id")?;
            listings.entry(product_id).or_default().push(listing_from_row(row)?);
        }

        for product in &mut products {
            if let Some(found) = product.id.and_then(|id| listings.remove(&id)) {
                product.listings = found;
            }
        }
        Ok(products)
    }

    async fn delete_product(&self, id: i64) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM products WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl SourceRepository for SqliteCatalog {
    async fn find_source_by_name(&self, name: &str) -> StoreResult<Option<Source>> {
        let sql = format!("SELECT {SOURCE_COLUMNS} FROM sources WHERE name = ?");
        let row = sqlx::query(&sql).bind(name).fetch_optional(&self.pool).await?;
        row.as_ref().map(source_from_row).transpose()
    }

    async fn find_source_by_id(&self, id: i64) -> StoreResult<Option<Source>> {
        let sql = format!("SELECT {SOURCE_COLUMNS} FROM sources WHERE id = ?");
        let row = sqlx::query(&sql).bind(id).fetch_optional(&self.pool).await?;
        row.as_ref().map(source_from_row).transpose()
    }

    async fn create_source(&self, source: &NewSource) -> StoreResult<Source> {
        let now = Utc::now();
        let result = sqlx::query(
            "INSERT INTO sources (name, base_url, logo_url, is_active, search_endpoint, \
             product_endpoint, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&source.name)
        .bind(&source.base_url)
        .bind(&source.logo_url)
        .bind(source.is_active)
        .bind(&source.search_endpoint)
        .bind(&source.product_endpoint)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(Source {
            id: result.last_insert_rowid(),
            name: source.name.clone(),
            base_url: source.base_url.clone(),
            logo_url: source.logo_url.clone(),
            is_active: source.is_active,
            search_endpoint: source.search_endpoint.clone(),
            product_endpoint: source.product_endpoint.clone(),
            created_at: now,
            updated_at: now,
        })
    }

    async fn list_sources(&self, active_only: bool) -> StoreResult<Vec<Source>> {
        let sql = if active_only {
            format!("SELECT {SOURCE_COLUMNS} FROM sources WHERE is_active = 1 ORDER BY id")
        } else {
            format!("SELECT {SOURCE_COLUMNS} FROM sources ORDER BY id")
        };
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        rows.iter().map(source_from_row).collect()
    }

    async fn set_source_active(&self, id: i64, active: bool) -> StoreResult<bool> {
        let result = sqlx::query("UPDATE sources SET is_active = ?, updated_at = ? WHERE id = ?")
            .bind(active)
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl ReviewRepository for SqliteCatalog {
    async fn add_review(&self, review: &NewReview) -> StoreResult<Review> {
        let now = Utc::now();
        let result = sqlx::query(
            "INSERT INTO reviews (product_id, source_id, reviewer_name, rating, title, content, \
             source_review_id, review_date, created_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(review.product_id)
        .bind(review.source_id)
        .bind(&review.reviewer_name)
        .bind(review.rating)
        .bind(&review.title)
        .bind(&review.content)
        .bind(&review.source_review_id)
        .bind(review.review_date)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| match StoreError::from(e) {
            // Foreign key failures surface as generic database errors
            StoreError::Backend(msg) if msg.contains("FOREIGN KEY") => {
                StoreError::NotFound(format!("product {}", review.product_id))
            }
            other => other,
        })?;

        Ok(Review {
            id: result.last_insert_rowid(),
            product_id: review.product_id,
            source_id: review.source_id,
            reviewer_name: review.reviewer_name.clone(),
            rating: review.rating,
            title: review.title.clone(),
            content: review.content.clone(),
            source_review_id: review.source_review_id.clone(),
            review_date: review.review_date,
            created_at: now,
        })
    }

    async fn reviews_for_product(&self, product_id: i64) -> StoreResult<Vec<Review>> {
        let rows = sqlx::query("SELECT * FROM reviews WHERE product_id = ? ORDER BY id")
            .bind(product_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(review_from_row).collect()
    }

    async fn rating_summary(&self, product_id: i64) -> StoreResult<RatingSummary> {
        let row = sqlx::query(
            "SELECT AVG(rating) AS average, COUNT(*) AS count FROM reviews WHERE product_id = ?",
        )
        .bind(product_id)
        .fetch_one(&self.pool)
        .await?;

        let count: i64 = row.try_get("count")?;
        Ok(RatingSummary {
            average: row.try_get("average")?,
            count: u32::try_from(count).unwrap_or(u32::MAX),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::database_connection::DatabaseConnection;
    use tempfile::TempDir;

    #[test]
    fn test_missing_row_maps_to_not_found() {
        assert!(matches!(StoreError::from(sqlx::Error::RowNotFound), StoreError::NotFound(_)));
        assert!(matches!(
            StoreError::from(sqlx::Error::PoolTimedOut),
            StoreError::Backend(_)
        ));
    }

    async fn catalog() -> (TempDir, SqliteCatalog) {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite:{}", dir.path().join("catalog.db").display());
        let db = DatabaseConnection::new(&url, 4).await.unwrap();
        db.migrate().await.unwrap();
        (dir, SqliteCatalog::new(db.pool().clone()))
    }

    fn listing(source: &Source, price: f64) -> SourceListing {
        SourceListing {
            source_id: source.id,
            source_name: source.name.clone(),
            source_product_id: "B0001".into(),
            source_url: Some("https://www.amazon.in/dp/B0001".into()),
            price,
            original_price: Some(499.0),
            in_stock: true,
            rating: Some(4.2),
            rating_count: Some(120),
            last_checked: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_product_round_trip_with_listings() {
        let (_dir, store) = catalog().await;
        let sources = store.initialize_defaults().await.unwrap();

        let mut product = CanonicalProduct::new(
            ProductKey::new("Cotton Brief", "Jockey", Gender::Men),
            "Brief",
            Utc::now(),
        );
        product.images = vec!["https://img.example/1.jpg".into()];
        product.listings = vec![listing(&sources[0], 199.0), listing(&sources[1], 249.0)];

        let saved = store.save_product(&product).await.unwrap();
        let loaded = store.find_by_key(&product.key()).await.unwrap().unwrap();

        assert_eq!(loaded.id, saved.id);
        assert_eq!(loaded.images, product.images);
        assert_eq!(loaded.listings.len(), 2);
        assert_eq!(loaded.listings[0].source_name, "Amazon");
        assert_eq!(loaded.listings[1].price, 249.0);
        assert_eq!(loaded.listings[0].rating_count, Some(120));
    }

    #[tokio::test]
    async fn test_duplicate_key_is_a_conflict() {
        let (_dir, store) = catalog().await;
        let product = CanonicalProduct::new(
            ProductKey::new("Cotton Brief", "Jockey", Gender::Men),
            "Brief",
            Utc::now(),
        );
        store.save_product(&product).await.unwrap();

        let err = store.save_product(&product).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn test_failed_save_keeps_previous_aggregate() {
        let (_dir, store) = catalog().await;
        let sources = store.initialize_defaults().await.unwrap();
        let mut product = CanonicalProduct::new(
            ProductKey::new("Cotton Brief", "Jockey", Gender::Men),
            "Brief",
            Utc::now(),
        );
        product.listings = vec![listing(&sources[0], 199.0)];
        let saved = store.save_product(&product).await.unwrap();

        // Two listings for the same source violate the primary key
        let mut broken = saved.clone();
        broken.listings.push(listing(&sources[0], 150.0));
        assert!(store.save_product(&broken).await.is_err());

        let loaded = store.find_by_id(saved.id.unwrap()).await.unwrap().unwrap();
        assert_eq!(loaded.listings.len(), 1);
        assert_eq!(loaded.listings[0].price, 199.0);
    }

    #[tokio::test]
    async fn test_reviews_feed_rating_summary() {
        let (_dir, store) = catalog().await;
        let sources = store.initialize_defaults().await.unwrap();
        let product = store
            .save_product(&CanonicalProduct::new(
                ProductKey::new("Lace Bra", "Zivame", Gender::Women),
                "Bra",
                Utc::now(),
            ))
            .await
            .unwrap();
        let id = product.id.unwrap();

        assert_eq!(store.rating_summary(id).await.unwrap(), RatingSummary::default());
        store.add_review(&NewReview::new(id, sources[0].id, 3.0)).await.unwrap();
        store.add_review(&NewReview::new(id, sources[1].id, 5.0)).await.unwrap();

        let summary = store.rating_summary(id).await.unwrap();
        assert_eq!(summary.count, 2);
        assert_eq!(summary.average, Some(4.0));
        assert_eq!(store.reviews_for_product(id).await.unwrap().len(), 2);

        assert!(store.delete_product(id).await.unwrap());
        assert!(store.reviews_for_product(id).await.unwrap().is_empty());
    }
}
