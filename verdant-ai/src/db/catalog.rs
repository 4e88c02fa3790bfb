//! Read-only access to the storefront product catalog

use async_trait::async_trait;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use verdant_common::Result;

use crate::models::MatchedProduct;

/// Product catalog as seen by the analysis pipeline
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Bounded sample of product names offered to the model
    async fn list_names(&self, limit: u32) -> Result<Vec<String>>;

    /// Products whose name exactly equals one of `names` (case-sensitive)
    async fn find_by_names(&self, names: &[String]) -> Result<Vec<MatchedProduct>>;
}

/// SQLite-backed [`Catalog`] over the `products` table
#[derive(Clone)]
pub struct SqliteCatalog {
    pool: SqlitePool,
}

impl SqliteCatalog {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Catalog for SqliteCatalog {
    async fn list_names(&self, limit: u32) -> Result<Vec<String>> {
        let names: Vec<String> =
            sqlx::query_scalar("SELECT name FROM products ORDER BY rowid LIMIT ?")
                .bind(i64::from(limit))
                .fetch_all(&self.pool)
                .await?;
        Ok(names)
    }

    async fn find_by_names(&self, names: &[String]) -> Result<Vec<MatchedProduct>> {
        if names.is_empty() {
            return Ok(Vec::new());
        }

        let mut query: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT id, name, slug, images, price FROM products WHERE name IN (");
        let mut separated = query.separated(", ");
        for name in names {
            separated.push_bind(name.clone());
        }
        separated.push_unseparated(") ORDER BY rowid");

        let rows = query.build().fetch_all(&self.pool).await?;

        Ok(rows
            .iter()
            .map(|row| {
                let images: String = row.get("images");
                MatchedProduct {
                    id: row.get("id"),
                    name: row.get("name"),
                    slug: row.get("slug"),
                    images: parse_images(&images),
                    price: row.get("price"),
                }
            })
            .collect())
    }
}

fn parse_images(raw: &str) -> Vec<String> {
    serde_json::from_str(raw).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Unreadable product images column, treating as empty");
        Vec::new()
    })
}

/// Insert a catalog product (seeding and tests; the storefront owns this table)
pub async fn insert_product(pool: &SqlitePool, product: &MatchedProduct) -> Result<()> {
    sqlx::query("INSERT INTO products (id, name, slug, images, price) VALUES (?, ?, ?, ?, ?)")
        .bind(&product.id)
        .bind(&product.name)
        .bind(&product.slug)
        .bind(serde_json::to_string(&product.images)?)
        .bind(&product.price)
        .execute(pool)
        .await?;
    Ok(())
}
