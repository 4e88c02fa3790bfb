//! Image download for analysis
//!
//! Retrieves the uploaded image bytes and a normalized MIME type. No retry
//! at this layer: a failed download fails the whole request.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

const USER_AGENT: &str = concat!("Verdant/", env!("CARGO_PKG_VERSION"));
const DEFAULT_MIME_TYPE: &str = "image/jpeg";

/// Image fetch errors
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Image request timed out")]
    Timeout,

    #[error("Image server returned HTTP {0}")]
    HttpStatus(u16),
}

/// Downloaded image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedImage {
    pub bytes: Vec<u8>,
    /// Content-Type without parameters, e.g. "image/png"
    pub mime_type: String,
}

/// Source of image bytes
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedImage, FetchError>;
}

/// HTTP implementation backed by reqwest
pub struct HttpImageFetcher {
    http_client: reqwest::Client,
}

impl HttpImageFetcher {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::NetworkError(e.to_string()))?;

        Ok(Self { http_client })
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedImage, FetchError> {
        tracing::debug!(url = %url, "Fetching image");

        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus(status.as_u16()));
        }

        let mime_type = normalize_mime_type(
            response
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok()),
        );

        let bytes = response.bytes().await.map_err(map_transport_error)?.to_vec();

        tracing::debug!(
            url = %url,
            mime_type = %mime_type,
            size_bytes = bytes.len(),
            "Image fetched"
        );

        Ok(FetchedImage { bytes, mime_type })
    }
}

fn map_transport_error(e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout
    } else {
        FetchError::NetworkError(e.to_string())
    }
}

/// Strip parameters such as `; charset=...` from a Content-Type header
///
/// Missing or blank headers fall back to `image/jpeg`.
pub fn normalize_mime_type(content_type: Option<&str>) -> String {
    content_type
        .and_then(|value| value.split(';').next())
        .map(|value| value.trim().to_ascii_lowercase())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| DEFAULT_MIME_TYPE.to_string())
}
