//! Database access for verdant-ai
//!
//! SQLite holds the analysis records this service owns and the storefront's
//! product table, which is only ever read here.

pub mod analyses;
pub mod catalog;

pub use analyses::{AnalysisStore, SqliteAnalysisStore};
pub use catalog::{Catalog, SqliteCatalog};

use anyhow::Result;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::path::Path;

/// Initialize database connection pool
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // mode=rwc: read, write, create
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    tracing::debug!("Connecting to database: {}", db_url);

    let pool = SqlitePool::connect(&db_url).await?;

    init_tables(&pool).await?;

    Ok(pool)
}

/// Single-connection in-memory database with tables created
///
/// One connection only: every SQLite `:memory:` connection is its own database.
pub async fn connect_in_memory() -> verdant_common::Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    init_tables(&pool).await?;
    Ok(pool)
}

/// Create tables if they don't exist
///
/// `products` normally already exists (owned by the storefront); creating it
/// here lets the service run standalone.
pub async fn init_tables(pool: &SqlitePool) -> verdant_common::Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS plant_analyses (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            plant_name TEXT NOT NULL,
            status TEXT NOT NULL,
            care_steps TEXT NOT NULL,
            image_url TEXT NOT NULL,
            product_suggestions TEXT NOT NULL DEFAULT '[]',
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_plant_analyses_user ON plant_analyses (user_id, created_at)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS products (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            slug TEXT NOT NULL UNIQUE,
            images TEXT NOT NULL DEFAULT '[]',
            price TEXT NOT NULL DEFAULT '0'
        )
        "#,
    )
    .execute(pool)
    .await?;

    tracing::info!("Database tables initialized (plant_analyses, products)");

    Ok(())
}
