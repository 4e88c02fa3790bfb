//! Catalog product projection

use serde::{Deserialize, Serialize};

/// Catalog product whose name matched a stored suggestion
///
/// Recomputed on every read, never persisted alongside the analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchedProduct {
    pub id: String,
    pub name: String,
    pub slug: String,
    /// Image URLs, first one is the primary image
    pub images: Vec<String>,
    /// Decimal price as stored by the catalog, e.g. "12.99"
    pub price: String,
}
