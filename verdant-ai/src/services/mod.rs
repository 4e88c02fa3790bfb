//! Pipeline collaborators and the orchestrator that sequences them

pub mod asset_store;
pub mod image_fetcher;
pub mod inference_client;
pub mod pipeline;
pub mod product_matcher;
pub mod response_validator;

pub use asset_store::{AssetStore, AssetStoreError, UploadThingClient};
pub use image_fetcher::{FetchError, FetchedImage, HttpImageFetcher, ImageFetcher};
pub use inference_client::{GeminiClient, GeminiConfig, InferenceClient, InferenceError};
pub use pipeline::{
    AnalysisError, AnalysisOutcome, AnalysisPipeline, AssetLease, PipelineSettings,
};
pub use product_matcher::ProductMatcher;
pub use response_validator::{InferenceResult, PlantFindings, ValidationError};
