//! verdant-ai library interface
//!
//! Plant image analysis service: the pipeline, its collaborators and the
//! HTTP surface. Exposed as a library for integration testing.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::trace::TraceLayer;

use crate::db::AnalysisStore;
use crate::services::{AnalysisPipeline, ProductMatcher};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    pub pipeline: Arc<AnalysisPipeline>,
    pub matcher: ProductMatcher,
    pub store: Arc<dyn AnalysisStore>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last pipeline failure for diagnostics
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(
        db: SqlitePool,
        pipeline: AnalysisPipeline,
        matcher: ProductMatcher,
        store: Arc<dyn AnalysisStore>,
    ) -> Self {
        Self {
            db,
            pipeline: Arc::new(pipeline),
            matcher,
            store,
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::analysis_routes())
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
