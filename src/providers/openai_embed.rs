//! Azure OpenAI embeddings adapter.
//!
//! Best-effort by design: the enrichment stage treats every failure here as
//! "no embedding for this line". Construction is likewise soft —
//! [`AzureEmbeddingProvider::maybe_from_env`] returns `None` when the
//! embedding endpoint or key is absent, which the pipeline reports as
//! enrichment disabled rather than an error.

use crate::error::ProcessError;
use crate::providers::EmbeddingProvider;
use async_trait::async_trait;
use serde::Deserialize;

const DEFAULT_API_VERSION: &str = "2024-12-01-preview";

/// Embedding provider backed by an Azure OpenAI deployment.
pub struct AzureEmbeddingProvider {
    endpoint: String,
    key: String,
    deployment: String,
    model: Option<String>,
    api_version: String,
    client: reqwest::Client,
}

impl AzureEmbeddingProvider {
    pub fn new(
        endpoint: impl Into<String>,
        key: impl Into<String>,
        deployment: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            key: key.into(),
            deployment: deployment.into(),
            model: None,
            api_version: DEFAULT_API_VERSION.to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Construct from the `AZURE_OPENAI_EMBEDDING_*` variables, or `None`
    /// when the endpoint, key, or deployment is missing.
    pub fn maybe_from_env() -> Option<Self> {
        let endpoint = std::env::var("AZURE_OPENAI_EMBEDDING_ENDPOINT").ok()?;
        let key = std::env::var("AZURE_OPENAI_EMBEDDING_KEY").ok()?;
        let deployment = std::env::var("AZURE_OPENAI_EMBEDDING_DEPLOYMENT_NAME").ok()?;
        if endpoint.is_empty() || key.is_empty() || deployment.is_empty() {
            return None;
        }
        let mut provider = Self::new(endpoint, key, deployment);
        provider.model = std::env::var("AZURE_OPENAI_EMBEDDING_MODEL_NAME")
            .ok()
            .filter(|m| !m.is_empty());
        if let Ok(v) = std::env::var("AZURE_OPENAI_EMBEDDING_API_VERSION") {
            if !v.is_empty() {
                provider.api_version = v;
            }
        }
        Some(provider)
    }

    fn embeddings_url(&self) -> String {
        format!(
            "{}/openai/deployments/{}/embeddings?api-version={}",
            self.endpoint, self.deployment, self.api_version
        )
    }
}

#[async_trait]
impl EmbeddingProvider for AzureEmbeddingProvider {
    fn deployment(&self) -> Option<String> {
        Some(self.deployment.clone())
    }

    fn model(&self) -> Option<String> {
        self.model.clone().or_else(|| Some(self.deployment.clone()))
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProcessError> {
        let response = self
            .client
            .post(self.embeddings_url())
            .header("api-key", &self.key)
            .json(&serde_json::json!({ "input": text }))
            .send()
            .await
            .map_err(|e| ProcessError::Internal(format!("embeddings: {e}")))?;

        if !response.status().is_success() {
            return Err(ProcessError::Internal(format!(
                "embeddings: HTTP {}",
                response.status()
            )));
        }

        let body: EmbeddingsResponse = response
            .json()
            .await
            .map_err(|e| ProcessError::Internal(format!("embeddings decode: {e}")))?;

        body.data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| ProcessError::Internal("embeddings: empty data".into()))
    }
}

#[derive(Default, Deserialize)]
#[serde(default)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Default, Deserialize)]
#[serde(default)]
struct EmbeddingDatum {
    embedding: Vec<f32>,
}
