//! Gemini generative adapter for the extraction passes.
//!
//! Thin REST client for `models/{model}:generateContent`. Text parts carry
//! the prompt and serialized layout evidence; document parts are sent as
//! inline base64 data, which is what lets the document-based pass hand the
//! raw PDF to the model without any intermediate rendering.
//!
//! Errors come back untagged — the extraction stage attributes them to the
//! pass that made the call.

use crate::error::ProcessError;
use crate::providers::{require_env, ExtractionProvider, PromptPart};
use async_trait::async_trait;
use base64::Engine;
use serde::Deserialize;
use serde_json::json;

const DEFAULT_MODEL: &str = "gemini-2.5-pro";
const BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Extraction provider backed by the Gemini API.
pub struct GeminiProvider {
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl GeminiProvider {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            client: reqwest::Client::new(),
        }
    }

    /// Construct from `GEMINI_API_KEY`, with `GEMINI_MODEL_NAME` overriding
    /// the default model.
    pub fn from_env() -> Result<Self, ProcessError> {
        let api_key = require_env("gemini", "GEMINI_API_KEY")?;
        let model = std::env::var("GEMINI_MODEL_NAME")
            .ok()
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());
        Ok(Self::new(api_key, model))
    }

    fn request_body(parts: &[PromptPart]) -> serde_json::Value {
        let parts: Vec<serde_json::Value> = parts
            .iter()
            .map(|part| match part {
                PromptPart::Text(text) => json!({ "text": text }),
                PromptPart::Document { mime_type, data } => json!({
                    "inline_data": {
                        "mime_type": mime_type,
                        "data": base64::engine::general_purpose::STANDARD.encode(data),
                    }
                }),
            })
            .collect();
        json!({ "contents": [{ "parts": parts }] })
    }
}

#[async_trait]
impl ExtractionProvider for GeminiProvider {
    async fn generate(&self, parts: &[PromptPart]) -> Result<String, ProcessError> {
        let url = format!(
            "{BASE_URL}/models/{}:generateContent?key={}",
            self.model, self.api_key
        );

        let response = self
            .client
            .post(&url)
            .json(&Self::request_body(parts))
            .send()
            .await
            .map_err(|e| ProcessError::Internal(format!("generateContent: {e}")))?;

        if !response.status().is_success() {
            return Err(ProcessError::Internal(format!(
                "generateContent: HTTP {}",
                response.status()
            )));
        }

        let body: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| ProcessError::Internal(format!("generateContent decode: {e}")))?;

        let text: String = body
            .candidates
            .into_iter()
            .next()
            .map(|c| {
                c.content
                    .parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        if text.is_empty() {
            return Err(ProcessError::Internal(
                "generateContent: empty candidate text".into(),
            ));
        }
        Ok(text)
    }
}

// ── Wire types ───────────────────────────────────────────────────────────

#[derive(Default, Deserialize)]
#[serde(default)]
struct GenerateContentResponse {
    candidates: Vec<Candidate>,
}

#[derive(Default, Deserialize)]
#[serde(default)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Default, Deserialize)]
#[serde(default)]
struct CandidateContent {
    parts: Vec<CandidatePart>,
}

#[derive(Default, Deserialize)]
#[serde(default)]
struct CandidatePart {
    text: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_inlines_documents_as_base64() {
        let parts = [
            PromptPart::text("extract this"),
            PromptPart::pdf(b"%PDF-1.7 fake".to_vec()),
        ];
        let body = GeminiProvider::request_body(&parts);
        let wire_parts = &body["contents"][0]["parts"];
        assert_eq!(wire_parts[0]["text"], "extract this");
        assert_eq!(wire_parts[1]["inline_data"]["mime_type"], "application/pdf");
        let data = wire_parts[1]["inline_data"]["data"].as_str().unwrap();
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(data)
            .unwrap();
        assert_eq!(decoded, b"%PDF-1.7 fake");
    }

    #[test]
    fn candidate_text_concatenates_parts() {
        let raw = r#"{"candidates":[{"content":{"parts":[{"text":"{\"a\":"},{"text":"1}"}]}}]}"#;
        let body: GenerateContentResponse = serde_json::from_str(raw).unwrap();
        let text: String = body.candidates[0]
            .content
            .parts
            .iter()
            .filter_map(|p| p.text.clone())
            .collect();
        assert_eq!(text, r#"{"a":1}"#);
    }
}
