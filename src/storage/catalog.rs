use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{FromRow, Pool, Postgres, QueryBuilder};
use tracing::debug;

use crate::cli::config::StoreSettings;
use crate::crawler::job::{BrandJob, ProductRecord};
use crate::error::StoreError;
use crate::sitemap::BrandEntry;

/// One persisted product row, as needed by the HTML archiver.
#[derive(Debug, Clone, FromRow)]
pub struct ProductPage {
    pub id: i64,
    pub name: String,
    pub url: String,
}

/// Store-wide progress counters for status reporting.
#[derive(Debug, Clone, Copy)]
pub struct StoreCounts {
    pub brands_total: i64,
    pub brands_completed: i64,
    pub products: i64,
}

/// Durable backlog and result store consumed by the crawl core.
///
/// `mark_brand_completed` is the checkpoint: a brand disappears from the
/// pending set only once it is marked, and the aggregator marks it only
/// after its records were persisted. Workers never touch this trait.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Brands not yet checkpointed as completed, in stable store order.
    async fn pending_brands(&self) -> Result<Vec<BrandJob>, StoreError>;

    /// Bulk-insert discovered brands. Returns the number actually added.
    async fn insert_brands(&self, entries: &[BrandEntry]) -> Result<u64, StoreError>;

    /// Batch-insert scraped products. Duplicates across resumed runs are
    /// tolerated by the schema, not deduplicated here.
    async fn insert_products(&self, products: &[ProductRecord]) -> Result<(), StoreError>;

    /// Write the completion checkpoint for one brand.
    async fn mark_brand_completed(&self, brand_id: i64) -> Result<(), StoreError>;

    /// Every persisted product, for the archiver.
    async fn all_products(&self) -> Result<Vec<ProductPage>, StoreError>;

    async fn counts(&self) -> Result<StoreCounts, StoreError>;
}

/// PostgreSQL implementation of the catalog store.
pub struct PostgresCatalogStore {
    pool: Pool<Postgres>,
}

#[derive(FromRow)]
struct BrandRow {
    id: i64,
    name: String,
    url: String,
}

impl PostgresCatalogStore {
    /// Connect and make sure the tables exist.
    pub async fn connect(settings: &StoreSettings) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(settings.max_connections)
            .connect(&settings.connection_string)
            .await?;

        let store = Self { pool };
        store.ensure_tables().await?;

        debug!("connected to catalog database");

        Ok(store)
    }

    async fn ensure_tables(&self) -> Result<(), StoreError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS brands (
                id BIGSERIAL PRIMARY KEY,
                name TEXT NOT NULL,
                url TEXT NOT NULL UNIQUE,
                status TEXT,
                discovered_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS products (
                id BIGSERIAL PRIMARY KEY,
                name TEXT NOT NULL,
                url TEXT NOT NULL,
                brand_name TEXT NOT NULL,
                brand_url TEXT NOT NULL,
                scraped_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl CatalogStore for PostgresCatalogStore {
    async fn pending_brands(&self) -> Result<Vec<BrandJob>, StoreError> {
        let rows: Vec<BrandRow> = sqlx::query_as(
            "SELECT id, name, url
             FROM brands
             WHERE status IS NULL OR status <> 'done'
             ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| BrandJob {
                id: row.id,
                name: row.name,
                url: row.url,
            })
            .collect())
    }

    async fn insert_brands(&self, entries: &[BrandEntry]) -> Result<u64, StoreError> {
        if entries.is_empty() {
            return Ok(0);
        }

        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new("INSERT INTO brands (name, url) ");
        builder.push_values(entries, |mut row, entry| {
            row.push_bind(&entry.name).push_bind(&entry.url);
        });
        // Re-running discovery must not duplicate known brands
        builder.push(" ON CONFLICT (url) DO NOTHING");

        let result = builder.build().execute(&self.pool).await?;

        debug!(
            "inserted {} of {} discovered brands",
            result.rows_affected(),
            entries.len()
        );

        Ok(result.rows_affected())
    }

    async fn insert_products(&self, products: &[ProductRecord]) -> Result<(), StoreError> {
        if products.is_empty() {
            return Ok(());
        }

        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new("INSERT INTO products (name, url, brand_name, brand_url) ");
        builder.push_values(products, |mut row, product| {
            row.push_bind(&product.name)
                .push_bind(&product.url)
                .push_bind(&product.brand_name)
                .push_bind(&product.brand_url);
        });

        builder.build().execute(&self.pool).await?;

        debug!("inserted {} products", products.len());

        Ok(())
    }

    async fn mark_brand_completed(&self, brand_id: i64) -> Result<(), StoreError> {
        sqlx::query("UPDATE brands SET status = 'done' WHERE id = $1")
            .bind(brand_id)
            .execute(&self.pool)
            .await?;

        debug!("marked brand {} as completed", brand_id);

        Ok(())
    }

    async fn all_products(&self) -> Result<Vec<ProductPage>, StoreError> {
        let rows: Vec<ProductPage> =
            sqlx::query_as("SELECT id, name, url FROM products ORDER BY id")
                .fetch_all(&self.pool)
                .await?;

        Ok(rows)
    }

    async fn counts(&self) -> Result<StoreCounts, StoreError> {
        let brands_total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM brands")
            .fetch_one(&self.pool)
            .await?;
        let brands_completed: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM brands WHERE status = 'done'")
                .fetch_one(&self.pool)
                .await?;
        let products: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await?;

        Ok(StoreCounts {
            brands_total,
            brands_completed,
            products,
        })
    }
}
