//! Data models for verdant-ai

pub mod analysis_run;
pub mod plant_analysis;
pub mod product;

pub use analysis_run::{AnalysisRun, FailureKind, PipelineState, StateTransition};
pub use plant_analysis::{AnalysisRequest, HealthBucket, NewPlantAnalysis, PlantAnalysis};
pub use product::MatchedProduct;
