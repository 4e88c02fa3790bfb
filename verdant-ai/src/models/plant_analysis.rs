//! Plant analysis records and request types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Caller-supplied analysis request
///
/// Missing fields deserialize as empty so the pipeline can reject them and
/// still clean up the upload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AnalysisRequest {
    /// Public URL of the uploaded image
    pub image_url: String,
    /// Owner of the resulting analysis
    pub user_id: String,
    /// Object-store key, used only to delete the upload on failure
    pub storage_key: String,
}

impl AnalysisRequest {
    pub fn new(
        image_url: impl Into<String>,
        user_id: impl Into<String>,
        storage_key: impl Into<String>,
    ) -> Self {
        Self {
            image_url: image_url.into(),
            user_id: user_id.into(),
            storage_key: storage_key.into(),
        }
    }
}

/// Fields required to persist a new analysis
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPlantAnalysis {
    pub user_id: String,
    pub plant_name: String,
    pub status: String,
    pub care_steps: String,
    pub image_url: String,
    pub product_suggestions: Vec<String>,
}

/// Persisted plant analysis
///
/// Created once by a successful pipeline run and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlantAnalysis {
    pub id: Uuid,
    pub user_id: String,
    pub plant_name: String,
    /// Free-form health label as returned by the model
    pub status: String,
    /// Markdown care instructions
    pub care_steps: String,
    pub image_url: String,
    /// Suggested product names in model order
    pub product_suggestions: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl PlantAnalysis {
    /// Display bucket derived from the free-form status
    pub fn health(&self) -> HealthBucket {
        HealthBucket::classify(&self.status)
    }
}

/// Display bucket for a free-form status label
///
/// Lexical classification, checked in order: "healthy", then "sick" or
/// "disease", then "water" or "attention". Case-insensitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthBucket {
    Healthy,
    SickDiseased,
    NeedsAttention,
    Unknown,
}

impl HealthBucket {
    pub fn classify(status: &str) -> Self {
        let s = status.to_lowercase();
        if s.contains("healthy") {
            HealthBucket::Healthy
        } else if s.contains("sick") || s.contains("disease") {
            HealthBucket::SickDiseased
        } else if s.contains("water") || s.contains("attention") {
            HealthBucket::NeedsAttention
        } else {
            HealthBucket::Unknown
        }
    }
}
