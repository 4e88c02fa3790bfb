//! Gemini multimodal inference client
//!
//! Sends the uploaded image plus a fixed analysis prompt to Gemini and
//! returns the raw response text. Parsing belongs to the response validator.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
const USER_AGENT: &str = concat!("Verdant/", env!("CARGO_PKG_VERSION"));
const ERROR_BODY_LIMIT: usize = 512;

/// Inference client errors
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("Gemini API key not configured")]
    MissingApiKey,

    #[error("Gemini rejected the API key: {0}")]
    InvalidApiKey(String),

    #[error("Gemini quota or rate limit exceeded: {0}")]
    RateLimited(String),

    #[error("Gemini model '{model}' not available: {detail}")]
    ModelUnavailable { model: String, detail: String },

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Gemini request timed out")]
    Timeout,

    #[error("Gemini API error {0}: {1}")]
    ApiError(u16, String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Gemini returned no text")]
    EmptyResponse,
}

/// Multimodal model that turns an image into raw analysis text
#[async_trait]
pub trait InferenceClient: Send + Sync {
    async fn infer(
        &self,
        image_bytes: &[u8],
        mime_type: &str,
        catalog_names: &[String],
    ) -> Result<String, InferenceError>;
}

/// Explicit Gemini settings, resolved once at startup
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub api_base: String,
    pub request_timeout: Duration,
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: Some(api_key.into()),
            model: DEFAULT_MODEL.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            request_timeout: Duration::from_secs(60),
        }
    }
}

/// Gemini `generateContent` client
pub struct GeminiClient {
    http_client: reqwest::Client,
    api_key: String,
    model: String,
    endpoint: String,
}

impl GeminiClient {
    /// Build a client; a missing or blank key fails here, not on first use
    pub fn new(config: GeminiConfig) -> Result<Self, InferenceError> {
        let api_key = config
            .api_key
            .filter(|key| !key.trim().is_empty())
            .ok_or(InferenceError::MissingApiKey)?;

        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| InferenceError::NetworkError(e.to_string()))?;

        let endpoint = endpoint_for_model(&config.api_base, &config.model);

        Ok(Self {
            http_client,
            api_key: api_key.trim().to_string(),
            model: config.model,
            endpoint,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn classify_failure(&self, status: u16, body: String) -> InferenceError {
        let detail = truncate(&body, ERROR_BODY_LIMIT);
        match status {
            401 | 403 => InferenceError::InvalidApiKey(detail),
            400 if body.contains("API key") || body.contains("API_KEY") => {
                InferenceError::InvalidApiKey(detail)
            }
            429 => InferenceError::RateLimited(detail),
            404 | 503 => InferenceError::ModelUnavailable {
                model: self.model.clone(),
                detail,
            },
            _ if body.contains("RESOURCE_EXHAUSTED") => InferenceError::RateLimited(detail),
            _ => InferenceError::ApiError(status, detail),
        }
    }
}

#[async_trait]
impl InferenceClient for GeminiClient {
    async fn infer(
        &self,
        image_bytes: &[u8],
        mime_type: &str,
        catalog_names: &[String],
    ) -> Result<String, InferenceError> {
        let payload = build_request_body(image_bytes, mime_type, &build_prompt(catalog_names));

        tracing::debug!(
            model = %self.model,
            mime_type = %mime_type,
            image_bytes = image_bytes.len(),
            catalog_names = catalog_names.len(),
            "Sending Gemini generateContent request"
        );

        let response = self
            .http_client
            .post(&self.endpoint)
            .header("x-goog-api-key", &self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    InferenceError::Timeout
                } else {
                    InferenceError::NetworkError(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(self.classify_failure(status.as_u16(), error_text));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| InferenceError::ParseError(e.to_string()))?;

        let text = extract_text(&body).ok_or(InferenceError::EmptyResponse)?;

        tracing::info!(
            model = %self.model,
            response_chars = text.len(),
            "Gemini inference successful"
        );

        Ok(text)
    }
}

fn endpoint_for_model(api_base: &str, model: &str) -> String {
    let base = api_base.trim().trim_end_matches('/');
    let trimmed = model.trim();
    let model_path = if trimmed.starts_with("models/") {
        trimmed.to_string()
    } else {
        format!("models/{}", trimmed)
    };
    format!("{}/{}:generateContent", base, model_path)
}

/// Analysis prompt offered to the model
///
/// Deterministic: the same catalog names always produce the same prompt.
pub fn build_prompt(catalog_names: &[String]) -> String {
    let product_list = catalog_names.join(", ");
    format!(
        r###"Analyze this image. First determine if this is a plant image.

If this is NOT a plant image, respond with exactly: {{"isPlant": false}}

If this IS a plant image:
1. Identify the plant name.
2. Assess its health status (Healthy, Sick, Needs Water, etc.).
3. Provide detailed care steps as a markdown formatted string, grouped under "##" section headings with numbered steps in each section. Example format:
   "## Watering\n1. Water once a week\n2. Check soil moisture\n\n## Sunlight\n1. Place in indirect light\n\n## Feeding\n1. Fertilize monthly"
4. From the following list of available products, select up to 3 that would be most helpful for this plant's care. ONLY select products from this list and copy their names exactly. If none are relevant, return an empty array.
Available Products: [{product_list}]

Return the response as a single strictly valid JSON object with keys: "isPlant" (boolean), "plantName" (string), "status" (string), "careSteps" (markdown formatted string with headers and numbered steps), "productSuggestions" (array of exact product names from the provided list). Do not wrap the JSON in markdown code block formatting like ```json."###
    )
}

fn build_request_body(image_bytes: &[u8], mime_type: &str, prompt: &str) -> Value {
    json!({
        "contents": [{
            "role": "user",
            "parts": [
                { "text": prompt },
                {
                    "inline_data": {
                        "mime_type": mime_type,
                        "data": BASE64.encode(image_bytes),
                    }
                }
            ]
        }]
    })
}

/// Concatenate the text parts of the first candidate
fn extract_text(body: &Value) -> Option<String> {
    let parts = body
        .get("candidates")?
        .as_array()?
        .first()?
        .get("content")?
        .get("parts")?
        .as_array()?;

    let text: String = parts
        .iter()
        .filter_map(|part| part.get("text").and_then(Value::as_str))
        .collect();

    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}

fn truncate(value: &str, limit: usize) -> String {
    if value.len() <= limit {
        return value.to_string();
    }
    let mut end = limit;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &value[..end])
}
