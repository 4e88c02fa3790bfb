//! Read-time product matching
//!
//! Suggestions are stored as plain product names. They are resolved against
//! the live catalog on every read, so a product removed from the catalog
//! simply drops out of the view. Matching is by exact name: renaming a
//! product after an analysis also drops it.

use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;
use verdant_common::Result;

use crate::db::{AnalysisStore, Catalog};
use crate::models::MatchedProduct;

/// Resolves stored suggestion names to current catalog products
#[derive(Clone)]
pub struct ProductMatcher {
    catalog: Arc<dyn Catalog>,
    store: Arc<dyn AnalysisStore>,
}

impl ProductMatcher {
    pub fn new(catalog: Arc<dyn Catalog>, store: Arc<dyn AnalysisStore>) -> Self {
        Self { catalog, store }
    }

    /// Catalog products for the given names, in catalog order
    ///
    /// Fewer results than names is expected, never an error.
    pub async fn match_names(&self, names: &[String]) -> Result<Vec<MatchedProduct>> {
        if names.is_empty() {
            return Ok(Vec::new());
        }

        let products = self.catalog.find_by_names(names).await?;

        if products.len() < names.len() {
            tracing::debug!(
                requested = names.len(),
                matched = products.len(),
                "Some suggested products are no longer in the catalog"
            );
        }

        Ok(products)
    }

    /// Matched products for a stored analysis; `None` if the analysis is unknown
    pub async fn match_analysis(&self, analysis_id: Uuid) -> Result<Option<Vec<MatchedProduct>>> {
        match self.store.find_by_id(analysis_id).await? {
            Some(analysis) => Ok(Some(self.match_names(&analysis.product_suggestions).await?)),
            None => Ok(None),
        }
    }
}

/// Re-sort matched products by the original suggestion order
pub fn order_by_suggestions(
    mut products: Vec<MatchedProduct>,
    suggestions: &[String],
) -> Vec<MatchedProduct> {
    products.sort_by_key(|p| {
        suggestions
            .iter()
            .position(|s| *s == p.name)
            .unwrap_or(usize::MAX)
    });
    products
}

/// Parse the stored suggestions column
///
/// Accepts a JSON array of strings, or a JSON string whose content is such an
/// array. Anything else yields an empty list.
pub fn parse_stored_suggestions(raw: &str) -> Vec<String> {
    match serde_json::from_str::<Value>(raw) {
        Ok(value) => suggestions_from_value(&value),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to parse product suggestions");
            Vec::new()
        }
    }
}

/// Same tolerant policy for an already-decoded value
pub fn suggestions_from_value(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        Value::String(text) => match serde_json::from_str::<Value>(text) {
            Ok(inner @ Value::Array(_)) => suggestions_from_value(&inner),
            _ => {
                tracing::warn!("Product suggestions text is not a JSON array");
                Vec::new()
            }
        },
        Value::Null => Vec::new(),
        _ => {
            tracing::warn!("Unexpected product suggestions shape");
            Vec::new()
        }
    }
}
