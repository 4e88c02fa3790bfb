//! Plant analysis API handlers
//!
//! POST /analyses, GET /analyses/:id, GET /users/:user_id/analyses,
//! GET /analyses (admin overview)

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    error::{ApiError, ApiResult},
    models::{AnalysisRequest, HealthBucket, MatchedProduct, PlantAnalysis},
    services::{product_matcher::order_by_suggestions, AnalysisOutcome},
    AppState,
};

/// Analysis plus its display bucket
#[derive(Debug, Serialize)]
pub struct AnalysisSummary {
    pub analysis: PlantAnalysis,
    pub health: HealthBucket,
}

impl From<PlantAnalysis> for AnalysisSummary {
    fn from(analysis: PlantAnalysis) -> Self {
        let health = analysis.health();
        Self { analysis, health }
    }
}

/// GET /analyses/:id response
#[derive(Debug, Serialize)]
pub struct AnalysisDetailResponse {
    pub analysis: PlantAnalysis,
    pub health: HealthBucket,
    /// Current catalog products for the stored suggestions, in suggestion order
    pub products: Vec<MatchedProduct>,
}

/// GET /analyses response
#[derive(Debug, Serialize)]
pub struct AnalysisOverviewResponse {
    pub total: usize,
    pub healthy: usize,
    pub sick: usize,
    pub analyses: Vec<AnalysisSummary>,
}

/// POST /analyses
///
/// Always 200: the outcome body carries success or the user-facing message.
pub async fn create_analysis(
    State(state): State<AppState>,
    Json(request): Json<AnalysisRequest>,
) -> Json<AnalysisOutcome> {
    let result = state.pipeline.run(request).await;

    if let Err(error) = &result {
        let mut last_error = state.last_error.write().await;
        *last_error = Some(format!("{:?}: {}", error.terminal_state(), error));
    }

    Json(AnalysisOutcome::from(&result))
}

/// GET /analyses/:id
pub async fn get_analysis(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<AnalysisDetailResponse>> {
    let id = Uuid::parse_str(&id)
        .map_err(|_| ApiError::BadRequest(format!("Invalid analysis id: {}", id)))?;

    let analysis = state
        .store
        .find_by_id(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Analysis not found: {}", id)))?;

    let products = state
        .matcher
        .match_names(&analysis.product_suggestions)
        .await?;
    let products = order_by_suggestions(products, &analysis.product_suggestions);

    Ok(Json(AnalysisDetailResponse {
        health: analysis.health(),
        analysis,
        products,
    }))
}

/// GET /users/:user_id/analyses
pub async fn list_user_analyses(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<Json<Vec<AnalysisSummary>>> {
    let analyses = state.store.find_by_user(&user_id).await?;
    Ok(Json(analyses.into_iter().map(AnalysisSummary::from).collect()))
}

/// GET /analyses
pub async fn list_all_analyses(
    State(state): State<AppState>,
) -> ApiResult<Json<AnalysisOverviewResponse>> {
    let analyses: Vec<AnalysisSummary> = state
        .store
        .find_all()
        .await?
        .into_iter()
        .map(AnalysisSummary::from)
        .collect();

    let count = |bucket: HealthBucket| analyses.iter().filter(|a| a.health == bucket).count();

    Ok(Json(AnalysisOverviewResponse {
        total: analyses.len(),
        healthy: count(HealthBucket::Healthy),
        sick: count(HealthBucket::SickDiseased),
        analyses,
    }))
}

/// Build analysis routes
pub fn analysis_routes() -> Router<AppState> {
    Router::new()
        .route("/analyses", get(list_all_analyses).post(create_analysis))
        .route("/analyses/:id", get(get_analysis))
        .route("/users/:user_id/analyses", get(list_user_analyses))
}
