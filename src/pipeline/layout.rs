//! Generic layout-analysis representation.
//!
//! The external OCR/layout engine is an opaque capability provider; whatever
//! wire format it speaks, its adapter reduces the result to this neutral
//! structure — recognized text, table grids, key-value pairs, plus counts and
//! a model identifier. Everything downstream (the layout-based extraction
//! pass and the reconciliation anchors) depends only on this shape, so the
//! engine can be swapped without touching the core.

use crate::record::LayoutSummary;
use serde::{Deserialize, Serialize};

/// One recognized key-value pair (e.g. `"Invoice Total:" → "$128.97"`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KeyValuePair {
    pub key: String,
    pub value: String,
}

/// One cell of a recognized table grid.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LayoutCell {
    pub row: usize,
    pub column: usize,
    pub text: String,
}

/// One recognized table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LayoutTable {
    pub row_count: usize,
    pub column_count: usize,
    pub cells: Vec<LayoutCell>,
}

/// The full layout-analysis payload for one document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutPayload {
    /// Identifier of the layout model that produced this payload.
    pub model_id: Option<String>,
    /// Concatenated recognized text in reading order.
    pub content: String,
    /// Number of pages recognized.
    pub pages: usize,
    /// Number of logical documents recognized (a scan may contain several).
    pub documents: usize,
    pub tables: Vec<LayoutTable>,
    pub key_values: Vec<KeyValuePair>,
}

impl LayoutPayload {
    /// Compact summary for the response envelope.
    pub fn summarize(&self) -> LayoutSummary {
        LayoutSummary {
            documents: self.documents,
            pages: self.pages,
            model_id: self.model_id.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summarize_reports_counts_and_model() {
        let payload = LayoutPayload {
            model_id: Some("prebuilt-layout".into()),
            pages: 2,
            documents: 1,
            ..Default::default()
        };
        let summary = payload.summarize();
        assert_eq!(summary.pages, 2);
        assert_eq!(summary.documents, 1);
        assert_eq!(summary.model_id.as_deref(), Some("prebuilt-layout"));
    }
}
