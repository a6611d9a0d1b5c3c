//! Narrow capability interfaces for the external providers.
//!
//! Each cloud service the pipeline depends on — layout/OCR, generative
//! extraction, embeddings — is abstracted behind one small object-safe trait.
//! The extraction and reconciliation logic never sees an SDK type, which
//! keeps the core provider-agnostic and testable with stub implementations
//! returning canned values (see `tests/pipeline.rs`).
//!
//! Handles are process-wide: constructed once (here, from the environment, or
//! by the embedding caller directly), wrapped in `Arc`, and injected into
//! [`crate::config::ProcessingConfig`]. They are immutable and never
//! invalidated during the process lifetime.

pub mod azure_di;
pub mod gemini;
pub mod openai_embed;

use crate::error::ProcessError;
use crate::pipeline::layout::LayoutPayload;
use async_trait::async_trait;
use std::sync::Arc;

/// One part of a generative request. The layout pass sends text only; the
/// document pass sends a text prompt plus the raw document inline.
#[derive(Debug, Clone)]
pub enum PromptPart {
    Text(String),
    Document { mime_type: String, data: Vec<u8> },
}

impl PromptPart {
    pub fn text(s: impl Into<String>) -> Self {
        PromptPart::Text(s.into())
    }

    pub fn pdf(data: Vec<u8>) -> Self {
        PromptPart::Document {
            mime_type: "application/pdf".into(),
            data,
        }
    }
}

/// External document-layout/OCR engine.
#[async_trait]
pub trait LayoutProvider: Send + Sync {
    /// Analyze a document and return the generic layout payload.
    ///
    /// One attempt; the pipeline never retries a layout call.
    async fn analyze(&self, document: &[u8]) -> Result<LayoutPayload, ProcessError>;
}

/// External generative model used by both extraction passes.
#[async_trait]
pub trait ExtractionProvider: Send + Sync {
    /// Generate a textual completion for the given parts.
    ///
    /// The return value is raw model text — the caller owns normalization.
    async fn generate(&self, parts: &[PromptPart]) -> Result<String, ProcessError>;
}

/// External embedding service used by the enrichment stage.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Deployment identifier reported in the response envelope.
    fn deployment(&self) -> Option<String> {
        None
    }

    /// Model identifier reported in the response envelope.
    fn model(&self) -> Option<String> {
        None
    }

    /// Embed one text. Failures are non-fatal to the pipeline.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProcessError>;
}

/// Resolved provider handles for one process.
#[derive(Clone)]
pub struct ProviderSet {
    pub layout: Arc<dyn LayoutProvider>,
    pub extraction: Arc<dyn ExtractionProvider>,
    pub embedding: Option<Arc<dyn EmbeddingProvider>>,
}

/// Resolve all providers from the environment.
///
/// Layout and extraction are required; embeddings are best-effort and
/// resolved only when the embedding endpoint *and* key are both present —
/// partial embedding config means "enrichment off", not an error.
///
/// | Provider | Variables |
/// |----------|-----------|
/// | Layout   | `AZURE_DOCINTEL_ENDPOINT`, `AZURE_DOCINTEL_KEY`, optional `AZURE_DOCINTEL_MODEL` |
/// | Extraction | `GEMINI_API_KEY`, optional `GEMINI_MODEL_NAME` |
/// | Embeddings | `AZURE_OPENAI_EMBEDDING_ENDPOINT`, `AZURE_OPENAI_EMBEDDING_KEY`, `AZURE_OPENAI_EMBEDDING_DEPLOYMENT_NAME`, optional `AZURE_OPENAI_EMBEDDING_MODEL_NAME`, `AZURE_OPENAI_EMBEDDING_API_VERSION` |
pub fn resolve_from_env() -> Result<ProviderSet, ProcessError> {
    let layout = azure_di::AzureLayoutProvider::from_env()?;
    let extraction = gemini::GeminiProvider::from_env()?;
    let embedding = openai_embed::AzureEmbeddingProvider::maybe_from_env();

    Ok(ProviderSet {
        layout: Arc::new(layout),
        extraction: Arc::new(extraction),
        embedding: embedding.map(|p| Arc::new(p) as Arc<dyn EmbeddingProvider>),
    })
}

pub(crate) fn require_env(provider: &str, var: &str) -> Result<String, ProcessError> {
    match std::env::var(var) {
        Ok(v) if !v.is_empty() => Ok(v),
        _ => Err(ProcessError::ProviderNotConfigured {
            provider: provider.to_string(),
            hint: format!("Set {var} in the environment."),
        }),
    }
}
