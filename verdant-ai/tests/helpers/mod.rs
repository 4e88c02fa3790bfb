//! Test doubles for the pipeline collaborators
//!
//! Each integration test binary compiles this module separately, so not
//! every helper is used everywhere.
#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;
use uuid::Uuid;

use verdant_ai::db::{connect_in_memory, AnalysisStore, Catalog, SqliteAnalysisStore};
use verdant_ai::models::{MatchedProduct, NewPlantAnalysis, PlantAnalysis};
use verdant_ai::services::{
    AnalysisPipeline, AssetStore, AssetStoreError, FetchError, FetchedImage, ImageFetcher,
    InferenceClient, InferenceError, PipelineSettings,
};

pub const STORAGE_KEY: &str = "key-123";
pub const IMAGE_URL: &str = "https://utfs.io/f/key-123.jpg";

pub fn product(name: &str) -> MatchedProduct {
    let slug = name.to_lowercase().replace(' ', "-");
    MatchedProduct {
        id: format!("prod-{}", slug),
        images: vec![format!("https://cdn.example/{}.jpg", slug)],
        name: name.to_string(),
        slug,
        price: "12.50".to_string(),
    }
}

// ---------------------------------------------------------------------------
// Image fetcher
// ---------------------------------------------------------------------------

pub struct FakeFetcher {
    fail: bool,
    pub calls: Mutex<Vec<String>>,
}

impl FakeFetcher {
    pub fn ok() -> Self {
        Self {
            fail: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl ImageFetcher for FakeFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedImage, FetchError> {
        self.calls.lock().unwrap().push(url.to_string());
        if self.fail {
            return Err(FetchError::HttpStatus(404));
        }
        Ok(FetchedImage {
            bytes: vec![0xFF, 0xD8, 0xFF, 0xE0],
            mime_type: "image/jpeg".to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// Inference client
// ---------------------------------------------------------------------------

pub struct FakeInference {
    reply: Mutex<Option<Result<String, InferenceError>>>,
    delay: Option<Duration>,
    /// Catalog names offered on each call
    pub offered: Mutex<Vec<Vec<String>>>,
    pub entered: Notify,
}

impl FakeInference {
    pub fn replying(text: &str) -> Self {
        Self::with_result(Ok(text.to_string()))
    }

    pub fn failing(error: InferenceError) -> Self {
        Self::with_result(Err(error))
    }

    /// Never answers within any reasonable timeout
    pub fn hanging() -> Self {
        Self {
            reply: Mutex::new(Some(Ok("{}".to_string()))),
            delay: Some(Duration::from_secs(3600)),
            offered: Mutex::new(Vec::new()),
            entered: Notify::new(),
        }
    }

    fn with_result(result: Result<String, InferenceError>) -> Self {
        Self {
            reply: Mutex::new(Some(result)),
            delay: None,
            offered: Mutex::new(Vec::new()),
            entered: Notify::new(),
        }
    }

    pub fn call_count(&self) -> usize {
        self.offered.lock().unwrap().len()
    }
}

#[async_trait]
impl InferenceClient for FakeInference {
    async fn infer(
        &self,
        _image_bytes: &[u8],
        _mime_type: &str,
        catalog_names: &[String],
    ) -> Result<String, InferenceError> {
        self.offered.lock().unwrap().push(catalog_names.to_vec());
        self.entered.notify_one();

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.reply
            .lock()
            .unwrap()
            .take()
            .unwrap_or(Err(InferenceError::EmptyResponse))
    }
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

pub struct MemoryCatalog {
    products: Vec<MatchedProduct>,
    fail: bool,
    lookups: AtomicUsize,
}

impl MemoryCatalog {
    pub fn with_names(names: &[&str]) -> Self {
        Self {
            products: names.iter().map(|n| product(n)).collect(),
            fail: false,
            lookups: AtomicUsize::new(0),
        }
    }

    pub fn unavailable() -> Self {
        Self {
            products: Vec::new(),
            fail: true,
            lookups: AtomicUsize::new(0),
        }
    }

    /// Number of `find_by_names` calls
    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Catalog for MemoryCatalog {
    async fn list_names(&self, limit: u32) -> verdant_common::Result<Vec<String>> {
        if self.fail {
            return Err(verdant_common::Error::Internal("catalog offline".to_string()));
        }
        Ok(self
            .products
            .iter()
            .take(limit as usize)
            .map(|p| p.name.clone())
            .collect())
    }

    async fn find_by_names(&self, names: &[String]) -> verdant_common::Result<Vec<MatchedProduct>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(verdant_common::Error::Internal("catalog offline".to_string()));
        }
        Ok(self
            .products
            .iter()
            .filter(|p| names.contains(&p.name))
            .cloned()
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Analysis store
// ---------------------------------------------------------------------------

/// Store whose writes always fail
pub struct BrokenStore;

#[async_trait]
impl AnalysisStore for BrokenStore {
    async fn create(&self, _analysis: NewPlantAnalysis) -> verdant_common::Result<PlantAnalysis> {
        Err(verdant_common::Error::Internal("disk full".to_string()))
    }

    async fn find_by_id(&self, _id: Uuid) -> verdant_common::Result<Option<PlantAnalysis>> {
        Ok(None)
    }

    async fn find_by_user(&self, _user_id: &str) -> verdant_common::Result<Vec<PlantAnalysis>> {
        Ok(Vec::new())
    }

    async fn find_all(&self) -> verdant_common::Result<Vec<PlantAnalysis>> {
        Ok(Vec::new())
    }
}

pub async fn memory_store() -> Arc<SqliteAnalysisStore> {
    let pool = connect_in_memory().await.expect("in-memory database");
    Arc::new(SqliteAnalysisStore::new(pool))
}

// ---------------------------------------------------------------------------
// Asset store
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct RecordingAssetStore {
    pub deleted: Mutex<Vec<String>>,
    pub fail: bool,
}

impl RecordingAssetStore {
    pub fn failing() -> Self {
        Self {
            deleted: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }
}

#[async_trait]
impl AssetStore for RecordingAssetStore {
    async fn delete(&self, key: &str) -> Result<(), AssetStoreError> {
        self.deleted.lock().unwrap().push(key.to_string());
        if self.fail {
            return Err(AssetStoreError::ApiError(500, "storage down".to_string()));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Wiring
// ---------------------------------------------------------------------------

pub struct Harness {
    pub pipeline: AnalysisPipeline,
    pub fetcher: Arc<FakeFetcher>,
    pub inference: Arc<FakeInference>,
    pub store: Arc<dyn AnalysisStore>,
    pub assets: Arc<RecordingAssetStore>,
}

pub struct HarnessBuilder {
    fetcher: FakeFetcher,
    inference: FakeInference,
    catalog: Arc<dyn Catalog>,
    store: Option<Arc<dyn AnalysisStore>>,
    assets: RecordingAssetStore,
    settings: PipelineSettings,
}

impl HarnessBuilder {
    pub fn new(inference: FakeInference) -> Self {
        Self {
            fetcher: FakeFetcher::ok(),
            inference,
            catalog: Arc::new(MemoryCatalog::with_names(&[
                "Tomato Fertilizer",
                "Neem Oil",
                "Garden Gloves",
            ])),
            store: None,
            assets: RecordingAssetStore::default(),
            settings: PipelineSettings::default(),
        }
    }

    pub fn fetcher(mut self, fetcher: FakeFetcher) -> Self {
        self.fetcher = fetcher;
        self
    }

    pub fn catalog(mut self, catalog: impl Catalog + 'static) -> Self {
        self.catalog = Arc::new(catalog);
        self
    }

    pub fn store(mut self, store: Arc<dyn AnalysisStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn assets(mut self, assets: RecordingAssetStore) -> Self {
        self.assets = assets;
        self
    }

    pub fn settings(mut self, settings: PipelineSettings) -> Self {
        self.settings = settings;
        self
    }

    pub async fn build(self) -> Harness {
        let store: Arc<dyn AnalysisStore> = match self.store {
            Some(store) => store,
            None => memory_store().await as Arc<dyn AnalysisStore>,
        };
        let fetcher = Arc::new(self.fetcher);
        let inference = Arc::new(self.inference);
        let assets = Arc::new(self.assets);

        let pipeline = AnalysisPipeline::new(
            fetcher.clone(),
            inference.clone(),
            self.catalog,
            store.clone(),
            assets.clone(),
            self.settings,
        );

        Harness {
            pipeline,
            fetcher,
            inference,
            store,
            assets,
        }
    }
}
