//! Plant analysis pipeline orchestrator
//!
//! Sequences catalog sampling, image download, inference, validation and
//! persistence for one request, and owns the cleanup contract for the
//! uploaded image: every run that does not end in a stored analysis deletes
//! the upload exactly once (best effort), while a successful run keeps it
//! because the record points at it.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

use crate::db::{AnalysisStore, Catalog};
use crate::models::{
    AnalysisRequest, AnalysisRun, FailureKind, NewPlantAnalysis, PipelineState, PlantAnalysis,
};
use crate::services::asset_store::AssetStore;
use crate::services::image_fetcher::{FetchError, ImageFetcher};
use crate::services::inference_client::{InferenceClient, InferenceError};
use crate::services::response_validator::{self, InferenceResult, ValidationError};

pub const MSG_INVALID_API_KEY: &str = "Invalid API key. Please check your Gemini API configuration.";
pub const MSG_MODEL_UNAVAILABLE: &str = "Gemini model not available. Please try again.";
pub const MSG_RATE_LIMITED: &str = "The analysis service is busy. Please try again in a moment.";
pub const MSG_NOT_A_PLANT: &str = "Please upload plant image";
pub const MSG_GENERIC_FAILURE: &str = "Analysis failed. Please try again.";

/// Everything that can stop a run short of a stored analysis
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Image is not a plant")]
    NotAPlant,

    #[error("Persistence error: {0}")]
    Persistence(#[from] verdant_common::Error),
}

impl From<FetchError> for AnalysisError {
    fn from(e: FetchError) -> Self {
        AnalysisError::Network(format!("image fetch failed: {}", e))
    }
}

impl From<InferenceError> for AnalysisError {
    fn from(e: InferenceError) -> Self {
        match e {
            InferenceError::MissingApiKey | InferenceError::InvalidApiKey(_) => {
                AnalysisError::Configuration(e.to_string())
            }
            InferenceError::RateLimited(_) => AnalysisError::RateLimited(e.to_string()),
            InferenceError::ModelUnavailable { .. } => {
                AnalysisError::ModelUnavailable(e.to_string())
            }
            InferenceError::NetworkError(_)
            | InferenceError::Timeout
            | InferenceError::ApiError(..)
            | InferenceError::ParseError(_)
            | InferenceError::EmptyResponse => AnalysisError::Network(e.to_string()),
        }
    }
}

impl AnalysisError {
    /// Failure kind; `None` for a not-a-plant rejection
    pub fn kind(&self) -> Option<FailureKind> {
        match self {
            AnalysisError::Configuration(_) => Some(FailureKind::Configuration),
            AnalysisError::Network(_) => Some(FailureKind::Network),
            AnalysisError::RateLimited(_) => Some(FailureKind::RateLimited),
            AnalysisError::ModelUnavailable(_) => Some(FailureKind::ModelUnavailable),
            AnalysisError::Validation(_) => Some(FailureKind::Validation),
            AnalysisError::InvalidRequest(_) => Some(FailureKind::InvalidRequest),
            AnalysisError::Persistence(_) => Some(FailureKind::Persistence),
            AnalysisError::NotAPlant => None,
        }
    }

    /// Terminal state this error moves the run into
    pub fn terminal_state(&self) -> PipelineState {
        match self.kind() {
            Some(kind) => PipelineState::Failed(kind),
            None => PipelineState::Rejected,
        }
    }

    /// Fixed message safe to show end users
    pub fn user_message(&self) -> &'static str {
        match self {
            AnalysisError::Configuration(_) => MSG_INVALID_API_KEY,
            AnalysisError::ModelUnavailable(_) => MSG_MODEL_UNAVAILABLE,
            AnalysisError::RateLimited(_) => MSG_RATE_LIMITED,
            AnalysisError::NotAPlant => MSG_NOT_A_PLANT,
            AnalysisError::Network(_)
            | AnalysisError::Validation(_)
            | AnalysisError::InvalidRequest(_)
            | AnalysisError::Persistence(_) => MSG_GENERIC_FAILURE,
        }
    }
}

/// Caller-facing result: `{success, analysisId}` or `{success, error}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisOutcome {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AnalysisOutcome {
    pub fn succeeded(analysis_id: Uuid) -> Self {
        Self {
            success: true,
            analysis_id: Some(analysis_id),
            error: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            analysis_id: None,
            error: Some(message.into()),
        }
    }
}

impl From<&Result<PlantAnalysis, AnalysisError>> for AnalysisOutcome {
    fn from(result: &Result<PlantAnalysis, AnalysisError>) -> Self {
        match result {
            Ok(analysis) => AnalysisOutcome::succeeded(analysis.id),
            Err(e) => AnalysisOutcome::failed(e.user_message()),
        }
    }
}

/// Scoped hold on an uploaded asset
///
/// Must end in [`retain`](Self::retain) or [`release`](Self::release). If
/// dropped while still held (the request future was cancelled), the delete is
/// spawned on the current tokio runtime.
pub struct AssetLease {
    store: Arc<dyn AssetStore>,
    key: Option<String>,
}

impl AssetLease {
    pub fn acquire(store: Arc<dyn AssetStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: Some(key.into()),
        }
    }

    /// Keep the upload
    pub fn retain(mut self) {
        self.key = None;
    }

    /// Delete the upload, swallowing any error
    pub async fn release(mut self) {
        if let Some(key) = self.key.take() {
            delete_best_effort(self.store.as_ref(), &key).await;
        }
    }
}

impl Drop for AssetLease {
    fn drop(&mut self) {
        let Some(key) = self.key.take() else {
            return;
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                tracing::warn!(storage_key = %key, "Analysis abandoned, deleting upload in background");
                let store = Arc::clone(&self.store);
                handle.spawn(async move {
                    delete_best_effort(store.as_ref(), &key).await;
                });
            }
            Err(_) => {
                tracing::warn!(storage_key = %key, "No runtime available, upload left in storage");
            }
        }
    }
}

async fn delete_best_effort(store: &dyn AssetStore, key: &str) {
    if key.trim().is_empty() {
        tracing::warn!("No storage key supplied, nothing to clean up");
        return;
    }

    match store.delete(key).await {
        Ok(()) => tracing::info!(storage_key = %key, "Uploaded image deleted"),
        Err(e) => tracing::warn!(
            storage_key = %key,
            error = %e,
            "Failed to delete uploaded image"
        ),
    }
}

/// Pipeline tuning
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub catalog_sample_size: u32,
    pub inference_timeout: Duration,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            catalog_sample_size: 50,
            inference_timeout: Duration::from_secs(60),
        }
    }
}

/// Plant analysis orchestrator
///
/// Holds no per-request state; one instance serves concurrent requests.
pub struct AnalysisPipeline {
    fetcher: Arc<dyn ImageFetcher>,
    inference: Arc<dyn InferenceClient>,
    catalog: Arc<dyn Catalog>,
    store: Arc<dyn AnalysisStore>,
    assets: Arc<dyn AssetStore>,
    settings: PipelineSettings,
}

impl AnalysisPipeline {
    pub fn new(
        fetcher: Arc<dyn ImageFetcher>,
        inference: Arc<dyn InferenceClient>,
        catalog: Arc<dyn Catalog>,
        store: Arc<dyn AnalysisStore>,
        assets: Arc<dyn AssetStore>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            fetcher,
            inference,
            catalog,
            store,
            assets,
            settings,
        }
    }

    /// Analyze an uploaded image and return the caller-facing outcome
    pub async fn analyze(&self, request: AnalysisRequest) -> AnalysisOutcome {
        AnalysisOutcome::from(&self.run(request).await)
    }

    /// Analyze an uploaded image, keeping the internal error for the caller
    ///
    /// Cleanup has already happened when this returns an error.
    pub async fn run(&self, request: AnalysisRequest) -> Result<PlantAnalysis, AnalysisError> {
        let lease = AssetLease::acquire(Arc::clone(&self.assets), request.storage_key.clone());
        let mut run = AnalysisRun::new();

        tracing::info!(
            run_id = %run.run_id,
            user_id = %request.user_id,
            image_url = %request.image_url,
            "Plant analysis started"
        );

        match self.execute(&request, &mut run).await {
            Ok(analysis) => {
                run.transition_to(PipelineState::Done);
                lease.retain();
                tracing::info!(
                    run_id = %run.run_id,
                    analysis_id = %analysis.id,
                    plant_name = %analysis.plant_name,
                    elapsed_ms = run.elapsed_ms(),
                    "Plant analysis completed"
                );
                Ok(analysis)
            }
            Err(error) => {
                let failed_in = run.state;
                run.transition_to(error.terminal_state());
                match error {
                    AnalysisError::NotAPlant => tracing::warn!(
                        run_id = %run.run_id,
                        user_id = %request.user_id,
                        "Image rejected: not a plant"
                    ),
                    _ => tracing::error!(
                        run_id = %run.run_id,
                        user_id = %request.user_id,
                        failed_in = ?failed_in,
                        kind = ?error.kind(),
                        error = %error,
                        "Plant analysis failed"
                    ),
                }
                lease.release().await;
                Err(error)
            }
        }
    }

    async fn execute(
        &self,
        request: &AnalysisRequest,
        run: &mut AnalysisRun,
    ) -> Result<PlantAnalysis, AnalysisError> {
        validate_request(request)?;

        let catalog_names = self
            .catalog
            .list_names(self.settings.catalog_sample_size)
            .await?;
        let image = self.fetcher.fetch(&request.image_url).await?;

        run.transition_to(PipelineState::Inferring);
        let raw_text = tokio::time::timeout(
            self.settings.inference_timeout,
            self.inference
                .infer(&image.bytes, &image.mime_type, &catalog_names),
        )
        .await
        .map_err(|_| {
            AnalysisError::Network(format!(
                "inference timed out after {:?}",
                self.settings.inference_timeout
            ))
        })??;

        run.transition_to(PipelineState::Validating);
        let findings = match response_validator::validate(&raw_text, &catalog_names) {
            Ok(InferenceResult::Plant(findings)) => findings,
            Ok(InferenceResult::NotAPlant) => return Err(AnalysisError::NotAPlant),
            Err(e) => {
                tracing::debug!(
                    run_id = %run.run_id,
                    raw_chars = raw_text.len(),
                    "Unusable model output"
                );
                return Err(e.into());
            }
        };

        run.transition_to(PipelineState::Persisting);
        let analysis = self
            .store
            .create(NewPlantAnalysis {
                user_id: request.user_id.clone(),
                plant_name: findings.plant_name,
                status: findings.status,
                care_steps: findings.care_steps,
                image_url: request.image_url.clone(),
                product_suggestions: findings.product_suggestions,
            })
            .await?;

        Ok(analysis)
    }
}

fn validate_request(request: &AnalysisRequest) -> Result<(), AnalysisError> {
    if request.user_id.trim().is_empty() {
        return Err(AnalysisError::InvalidRequest("user id is required".to_string()));
    }
    if request.image_url.trim().is_empty() {
        return Err(AnalysisError::InvalidRequest("image url is required".to_string()));
    }
    Ok(())
}
