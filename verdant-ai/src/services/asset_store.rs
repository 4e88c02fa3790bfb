//! Upload object store client
//!
//! Only deletion is needed here: uploads are created by the storefront, and
//! the pipeline removes them again when an analysis does not succeed.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_API_BASE: &str = "https://api.uploadthing.com";
const USER_AGENT: &str = concat!("Verdant/", env!("CARGO_PKG_VERSION"));

/// Asset store errors
#[derive(Debug, Error)]
pub enum AssetStoreError {
    #[error("Storage API key not configured")]
    MissingApiKey,

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Storage API error {0}: {1}")]
    ApiError(u16, String),
}

/// Object store holding uploaded images
#[async_trait]
pub trait AssetStore: Send + Sync {
    /// Delete the object stored under `key`; deleting a missing key succeeds
    async fn delete(&self, key: &str) -> Result<(), AssetStoreError>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeleteFilesResponse {
    #[serde(default)]
    deleted_count: Option<u64>,
}

/// UploadThing REST client (`POST /v6/deleteFiles`)
pub struct UploadThingClient {
    http_client: reqwest::Client,
    api_key: String,
    endpoint: String,
}

impl UploadThingClient {
    pub fn new(api_key: String, api_base: Option<&str>) -> Result<Self, AssetStoreError> {
        if api_key.trim().is_empty() {
            return Err(AssetStoreError::MissingApiKey);
        }

        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| AssetStoreError::NetworkError(e.to_string()))?;

        let base = api_base.unwrap_or(DEFAULT_API_BASE).trim().trim_end_matches('/');

        Ok(Self {
            http_client,
            api_key: api_key.trim().to_string(),
            endpoint: format!("{}/v6/deleteFiles", base),
        })
    }
}

#[async_trait]
impl AssetStore for UploadThingClient {
    async fn delete(&self, key: &str) -> Result<(), AssetStoreError> {
        let response = self
            .http_client
            .post(&self.endpoint)
            .header("x-uploadthing-api-key", &self.api_key)
            .json(&json!({ "fileKeys": [key] }))
            .send()
            .await
            .map_err(|e| AssetStoreError::NetworkError(e.to_string()))?;

        let status = response.status();

        // Already gone
        if status == reqwest::StatusCode::NOT_FOUND {
            tracing::debug!(storage_key = %key, "Upload already absent");
            return Ok(());
        }

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(AssetStoreError::ApiError(status.as_u16(), error_text));
        }

        let deleted = response
            .json::<DeleteFilesResponse>()
            .await
            .ok()
            .and_then(|r| r.deleted_count);

        tracing::debug!(storage_key = %key, deleted_count = ?deleted, "Upload deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_key_rejected() {
        assert!(matches!(
            UploadThingClient::new("  ".to_string(), None),
            Err(AssetStoreError::MissingApiKey)
        ));
    }

    #[test]
    fn test_endpoint_from_base() {
        let client = UploadThingClient::new("sk_test".to_string(), Some("http://127.0.0.1:9/")).unwrap();
        assert_eq!(client.endpoint, "http://127.0.0.1:9/v6/deleteFiles");

        let default = UploadThingClient::new("sk_test".to_string(), None).unwrap();
        assert_eq!(default.endpoint, "https://api.uploadthing.com/v6/deleteFiles");
    }
}
