//! Model output validation
//!
//! The JSON shape requested from the model is a soft contract. This module
//! turns whatever text came back into a typed [`InferenceResult`], filling
//! safe defaults for missing fields instead of discarding a paid inference.

use serde_json::{Map, Value};
use thiserror::Error;

pub const DEFAULT_PLANT_NAME: &str = "Unknown Plant";
pub const DEFAULT_STATUS: &str = "Unknown";
pub const DEFAULT_CARE_STEPS: &str = "No steps provided.";

/// Most product suggestions kept per analysis
pub const MAX_PRODUCT_SUGGESTIONS: usize = 3;

/// Validation failures
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Model output is not valid JSON: {0}")]
    Malformed(String),

    #[error("Model output is JSON but not an object")]
    NotAnObject,
}

/// Normalized model verdict
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InferenceResult {
    NotAPlant,
    Plant(PlantFindings),
}

/// Fields extracted from a plant response
///
/// Coming out of [`validate`], `product_suggestions` holds at most
/// [`MAX_PRODUCT_SUGGESTIONS`] names, all taken from the offered catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlantFindings {
    pub plant_name: String,
    pub status: String,
    pub care_steps: String,
    pub product_suggestions: Vec<String>,
}

impl PlantFindings {
    /// Keep only names offered in the prompt, first occurrence wins, at most three
    pub fn restrict_suggestions(&mut self, offered: &[String]) {
        let mut kept: Vec<String> = Vec::new();
        for name in self.product_suggestions.drain(..) {
            if kept.len() == MAX_PRODUCT_SUGGESTIONS {
                break;
            }
            if offered.iter().any(|o| *o == name) && !kept.contains(&name) {
                kept.push(name);
            }
        }
        self.product_suggestions = kept;
    }
}

/// Parse raw model text into an [`InferenceResult`]
///
/// Suggestions are restricted to `offered`, the catalog names the prompt listed.
pub fn validate(raw_text: &str, offered: &[String]) -> Result<InferenceResult, ValidationError> {
    let mut result = parse(raw_text)?;
    if let InferenceResult::Plant(findings) = &mut result {
        findings.restrict_suggestions(offered);
    }
    Ok(result)
}

/// Tolerant parse without any catalog restriction
fn parse(raw_text: &str) -> Result<InferenceResult, ValidationError> {
    let cleaned = strip_code_fences(raw_text);

    let value: Value =
        serde_json::from_str(&cleaned).map_err(|e| ValidationError::Malformed(e.to_string()))?;

    let object = value.as_object().ok_or(ValidationError::NotAnObject)?;

    if object.get("isPlant").and_then(Value::as_bool) == Some(false) {
        return Ok(InferenceResult::NotAPlant);
    }

    Ok(InferenceResult::Plant(PlantFindings {
        plant_name: string_or(object, "plantName", DEFAULT_PLANT_NAME),
        status: string_or(object, "status", DEFAULT_STATUS),
        care_steps: string_or(object, "careSteps", DEFAULT_CARE_STEPS),
        product_suggestions: string_list(object.get("productSuggestions")),
    }))
}

/// Remove ```json / ``` markers the model may add despite instructions
fn strip_code_fences(raw: &str) -> String {
    raw.replace("```json", "").replace("```", "").trim().to_string()
}

fn string_or(object: &Map<String, Value>, key: &str, fallback: &str) -> String {
    object
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(fallback)
        .to_string()
}

/// Coerce a suggestions value to trimmed, non-empty strings
fn string_list(value: Option<&Value>) -> Vec<String> {
    match value.and_then(Value::as_array) {
        Some(items) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        None => Vec::new(),
    }
}
