//! Plant analysis persistence
//!
//! Records are insert-only: created once by a successful pipeline run, never
//! updated or deleted by this service.

use async_trait::async_trait;
use chrono::{SecondsFormat, SubsecRound};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;
use verdant_common::{Error, Result};

use crate::models::{NewPlantAnalysis, PlantAnalysis};
use crate::services::product_matcher::parse_stored_suggestions;

/// Durable store for analysis records
#[async_trait]
pub trait AnalysisStore: Send + Sync {
    async fn create(&self, analysis: NewPlantAnalysis) -> Result<PlantAnalysis>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<PlantAnalysis>>;
    /// Newest first
    async fn find_by_user(&self, user_id: &str) -> Result<Vec<PlantAnalysis>>;
    /// Newest first
    async fn find_all(&self) -> Result<Vec<PlantAnalysis>>;
}

/// SQLite-backed [`AnalysisStore`]
#[derive(Clone)]
pub struct SqliteAnalysisStore {
    pool: SqlitePool,
}

impl SqliteAnalysisStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AnalysisStore for SqliteAnalysisStore {
    async fn create(&self, analysis: NewPlantAnalysis) -> Result<PlantAnalysis> {
        let record = PlantAnalysis {
            id: Uuid::new_v4(),
            user_id: analysis.user_id,
            plant_name: analysis.plant_name,
            status: analysis.status,
            care_steps: analysis.care_steps,
            image_url: analysis.image_url,
            product_suggestions: analysis.product_suggestions,
            // Stored with microsecond precision
            created_at: verdant_common::time::now().trunc_subsecs(6),
        };
        save_analysis(&self.pool, &record).await?;
        Ok(record)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<PlantAnalysis>> {
        load_analysis(&self.pool, id).await
    }

    async fn find_by_user(&self, user_id: &str) -> Result<Vec<PlantAnalysis>> {
        load_user_analyses(&self.pool, user_id).await
    }

    async fn find_all(&self) -> Result<Vec<PlantAnalysis>> {
        load_all_analyses(&self.pool).await
    }
}

const SELECT_COLUMNS: &str = "SELECT id, user_id, plant_name, status, care_steps, image_url, \
     product_suggestions, created_at FROM plant_analyses";

/// Insert a new analysis record
pub async fn save_analysis(pool: &SqlitePool, analysis: &PlantAnalysis) -> Result<()> {
    let suggestions = serde_json::to_string(&analysis.product_suggestions)?;
    // Fixed-width UTC text so ORDER BY created_at sorts chronologically
    let created_at = analysis
        .created_at
        .to_rfc3339_opts(SecondsFormat::Micros, true);

    sqlx::query(
        r#"
        INSERT INTO plant_analyses (
            id, user_id, plant_name, status, care_steps, image_url,
            product_suggestions, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(analysis.id.to_string())
    .bind(&analysis.user_id)
    .bind(&analysis.plant_name)
    .bind(&analysis.status)
    .bind(&analysis.care_steps)
    .bind(&analysis.image_url)
    .bind(suggestions)
    .bind(created_at)
    .execute(pool)
    .await?;

    tracing::debug!(analysis_id = %analysis.id, user_id = %analysis.user_id, "Plant analysis saved");

    Ok(())
}

/// Load analysis by id
pub async fn load_analysis(pool: &SqlitePool, id: Uuid) -> Result<Option<PlantAnalysis>> {
    let row = sqlx::query(&format!("{} WHERE id = ?", SELECT_COLUMNS))
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?;

    row.map(|r| analysis_from_row(&r)).transpose()
}

/// Load all analyses for a user, newest first
pub async fn load_user_analyses(pool: &SqlitePool, user_id: &str) -> Result<Vec<PlantAnalysis>> {
    let rows = sqlx::query(&format!(
        "{} WHERE user_id = ? ORDER BY created_at DESC, rowid DESC",
        SELECT_COLUMNS
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    rows.iter().map(analysis_from_row).collect()
}

/// Load every analysis, newest first
pub async fn load_all_analyses(pool: &SqlitePool) -> Result<Vec<PlantAnalysis>> {
    let rows = sqlx::query(&format!(
        "{} ORDER BY created_at DESC, rowid DESC",
        SELECT_COLUMNS
    ))
    .fetch_all(pool)
    .await?;

    rows.iter().map(analysis_from_row).collect()
}

fn analysis_from_row(row: &SqliteRow) -> Result<PlantAnalysis> {
    let id: String = row.get("id");
    let id = Uuid::parse_str(&id)
        .map_err(|e| Error::Internal(format!("Invalid analysis id '{}': {}", id, e)))?;

    let suggestions: String = row.get("product_suggestions");
    let created_at: String = row.get("created_at");

    Ok(PlantAnalysis {
        id,
        user_id: row.get("user_id"),
        plant_name: row.get("plant_name"),
        status: row.get("status"),
        care_steps: row.get("care_steps"),
        image_url: row.get("image_url"),
        product_suggestions: parse_stored_suggestions(&suggestions),
        created_at: verdant_common::time::parse_rfc3339(&created_at)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::connect_in_memory;

    fn new_analysis(user_id: &str, plant_name: &str) -> NewPlantAnalysis {
        NewPlantAnalysis {
            user_id: user_id.to_string(),
            plant_name: plant_name.to_string(),
            status: "Healthy".to_string(),
            care_steps: "## Watering\n1. Water weekly".to_string(),
            image_url: "https://utfs.io/f/abc.jpg".to_string(),
            product_suggestions: vec!["Organic Fertilizer".to_string(), "Neem Oil".to_string()],
        }
    }

    #[tokio::test]
    async fn test_create_and_find_by_id() {
        let store = SqliteAnalysisStore::new(connect_in_memory().await.unwrap());

        let created = store.create(new_analysis("user-1", "Tomato")).await.unwrap();
        let loaded = store.find_by_id(created.id).await.unwrap().expect("record exists");

        assert_eq!(loaded, created);
        assert_eq!(loaded.product_suggestions, vec!["Organic Fertilizer", "Neem Oil"]);
    }

    #[tokio::test]
    async fn test_find_by_id_missing() {
        let store = SqliteAnalysisStore::new(connect_in_memory().await.unwrap());
        assert!(store.find_by_id(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_each_create_is_a_new_record() {
        let store = SqliteAnalysisStore::new(connect_in_memory().await.unwrap());
        let a = store.create(new_analysis("user-1", "Tomato")).await.unwrap();
        let b = store.create(new_analysis("user-1", "Tomato")).await.unwrap();
        assert_ne!(a.id, b.id);
        assert_eq!(store.find_all().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_find_by_user_newest_first() {
        let store = SqliteAnalysisStore::new(connect_in_memory().await.unwrap());

        let first = store.create(new_analysis("user-1", "Basil")).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let second = store.create(new_analysis("user-1", "Mint")).await.unwrap();
        store.create(new_analysis("user-2", "Fern")).await.unwrap();

        let mine = store.find_by_user("user-1").await.unwrap();
        assert_eq!(mine.len(), 2);
        assert_eq!(mine[0].id, second.id);
        assert_eq!(mine[1].id, first.id);

        assert!(store.find_by_user("nobody").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_legacy_double_encoded_suggestions_are_read() {
        let pool = connect_in_memory().await.unwrap();
        let id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO plant_analyses VALUES (?, 'u', 'Rose', 'Sick', 'steps', 'url', ?, '2024-01-01T00:00:00.000000Z')",
        )
        .bind(id.to_string())
        .bind(r#""[\"Neem Oil\"]""#)
        .execute(&pool)
        .await
        .unwrap();

        let loaded = load_analysis(&pool, id).await.unwrap().unwrap();
        assert_eq!(loaded.product_suggestions, vec!["Neem Oil"]);
    }
}
