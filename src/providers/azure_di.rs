//! Azure Document Intelligence layout adapter.
//!
//! Speaks the async analyze REST flow: submit the document, follow the
//! `Operation-Location` header, poll until the operation settles, then reduce
//! the `analyzeResult` to the neutral [`LayoutPayload`]. The overall time
//! budget is owned by the calling stage (`layout_timeout_secs`), so the poll
//! loop here only bounds the interval between requests, not the total wait.

use crate::error::ProcessError;
use crate::pipeline::layout::{KeyValuePair, LayoutCell, LayoutPayload, LayoutTable};
use crate::providers::{require_env, LayoutProvider};
use async_trait::async_trait;
use base64::Engine;
use serde::Deserialize;
use tracing::debug;

const API_VERSION: &str = "2024-02-29-preview";
const POLL_INTERVAL_MS: u64 = 1000;

/// Layout provider backed by Azure Document Intelligence.
pub struct AzureLayoutProvider {
    endpoint: String,
    key: String,
    model: String,
    client: reqwest::Client,
}

impl AzureLayoutProvider {
    pub fn new(endpoint: impl Into<String>, key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            key: key.into(),
            model: model.into(),
            client: reqwest::Client::new(),
        }
    }

    /// Construct from `AZURE_DOCINTEL_ENDPOINT` / `AZURE_DOCINTEL_KEY`,
    /// with `AZURE_DOCINTEL_MODEL` defaulting to `prebuilt-layout` (the model
    /// that returns tables and key-value pairs, which reconciliation anchors
    /// on).
    pub fn from_env() -> Result<Self, ProcessError> {
        let endpoint = require_env("azure-docintel", "AZURE_DOCINTEL_ENDPOINT")?;
        let key = require_env("azure-docintel", "AZURE_DOCINTEL_KEY")?;
        let model = std::env::var("AZURE_DOCINTEL_MODEL")
            .ok()
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| "prebuilt-layout".to_string());
        Ok(Self::new(endpoint, key, model))
    }

    fn analyze_url(&self) -> String {
        format!(
            "{}/documentintelligence/documentModels/{}:analyze?api-version={}",
            self.endpoint, self.model, API_VERSION
        )
    }
}

#[async_trait]
impl LayoutProvider for AzureLayoutProvider {
    async fn analyze(&self, document: &[u8]) -> Result<LayoutPayload, ProcessError> {
        let body = serde_json::json!({
            "base64Source": base64::engine::general_purpose::STANDARD.encode(document),
        });

        let response = self
            .client
            .post(self.analyze_url())
            .header("Ocp-Apim-Subscription-Key", &self.key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProcessError::LayoutAnalysisFailed {
                detail: format!("submit: {e}"),
            })?;

        if !response.status().is_success() {
            return Err(ProcessError::LayoutAnalysisFailed {
                detail: format!("submit: HTTP {}", response.status()),
            });
        }

        let operation_url = response
            .headers()
            .get("operation-location")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| ProcessError::LayoutAnalysisFailed {
                detail: "submit: missing Operation-Location header".into(),
            })?;

        // Poll until the operation settles. The calling stage wraps this
        // whole future in its own timeout.
        loop {
            tokio::time::sleep(std::time::Duration::from_millis(POLL_INTERVAL_MS)).await;

            let poll: AnalyzeOperation = self
                .client
                .get(&operation_url)
                .header("Ocp-Apim-Subscription-Key", &self.key)
                .send()
                .await
                .map_err(|e| ProcessError::LayoutAnalysisFailed {
                    detail: format!("poll: {e}"),
                })?
                .json()
                .await
                .map_err(|e| ProcessError::LayoutAnalysisFailed {
                    detail: format!("poll decode: {e}"),
                })?;

            debug!(status = %poll.status, "layout analysis poll");
            match poll.status.as_str() {
                "succeeded" => {
                    let result = poll.analyze_result.ok_or_else(|| {
                        ProcessError::LayoutAnalysisFailed {
                            detail: "succeeded without analyzeResult".into(),
                        }
                    })?;
                    return Ok(result.into_payload());
                }
                "failed" => {
                    return Err(ProcessError::LayoutAnalysisFailed {
                        detail: poll
                            .error
                            .map(|e| e.message)
                            .unwrap_or_else(|| "operation failed".into()),
                    })
                }
                _ => continue,
            }
        }
    }
}

// ── Wire types ───────────────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeOperation {
    status: String,
    #[serde(default)]
    analyze_result: Option<AnalyzeResult>,
    #[serde(default)]
    error: Option<OperationError>,
}

#[derive(Deserialize)]
struct OperationError {
    message: String,
}

#[derive(Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct AnalyzeResult {
    model_id: Option<String>,
    content: String,
    pages: Vec<serde_json::Value>,
    documents: Vec<serde_json::Value>,
    tables: Vec<WireTable>,
    key_value_pairs: Vec<WireKeyValue>,
}

#[derive(Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct WireTable {
    row_count: usize,
    column_count: usize,
    cells: Vec<WireCell>,
}

#[derive(Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct WireCell {
    row_index: usize,
    column_index: usize,
    content: String,
}

#[derive(Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct WireKeyValue {
    key: Option<WireContent>,
    value: Option<WireContent>,
}

#[derive(Default, Deserialize)]
#[serde(default)]
struct WireContent {
    content: String,
}

impl AnalyzeResult {
    fn into_payload(self) -> LayoutPayload {
        LayoutPayload {
            model_id: self.model_id,
            content: self.content,
            pages: self.pages.len(),
            documents: self.documents.len(),
            tables: self
                .tables
                .into_iter()
                .map(|t| LayoutTable {
                    row_count: t.row_count,
                    column_count: t.column_count,
                    cells: t
                        .cells
                        .into_iter()
                        .map(|c| LayoutCell {
                            row: c.row_index,
                            column: c.column_index,
                            text: c.content,
                        })
                        .collect(),
                })
                .collect(),
            key_values: self
                .key_value_pairs
                .into_iter()
                .filter_map(|kv| {
                    let key = kv.key?.content;
                    let value = kv.value.map(|v| v.content).unwrap_or_default();
                    Some(KeyValuePair { key, value })
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_result_reduces_to_payload() {
        let raw = r#"{
            "modelId": "prebuilt-layout",
            "content": "INVOICE\nTotal: $20.00",
            "pages": [{}],
            "documents": [],
            "tables": [{
                "rowCount": 1, "columnCount": 2,
                "cells": [
                    {"rowIndex": 0, "columnIndex": 0, "content": "Total"},
                    {"rowIndex": 0, "columnIndex": 1, "content": "$20.00"}
                ]
            }],
            "keyValuePairs": [
                {"key": {"content": "Total:"}, "value": {"content": "$20.00"}},
                {"key": {"content": "Dangling:"}}
            ]
        }"#;
        let result: AnalyzeResult = serde_json::from_str(raw).unwrap();
        let payload = result.into_payload();
        assert_eq!(payload.pages, 1);
        assert_eq!(payload.documents, 0);
        assert_eq!(payload.tables.len(), 1);
        assert_eq!(payload.tables[0].cells[1].text, "$20.00");
        assert_eq!(payload.key_values.len(), 2);
        assert_eq!(payload.key_values[1].value, "");
    }

    #[test]
    fn endpoint_is_normalised() {
        let p = AzureLayoutProvider::new("https://di.example.com/", "k", "prebuilt-layout");
        assert!(p.analyze_url().starts_with("https://di.example.com/documentintelligence/"));
    }
}
