//! Configuration for invoice processing.
//!
//! All pipeline behaviour is controlled through [`ProcessingConfig`], built
//! via its [`ProcessingConfigBuilder`]. Keeping every knob in one struct makes
//! it trivial to share the config across requests, log it, and diff two runs
//! to understand why their outputs differ.
//!
//! Provider handles live here too: they are process-wide, immutable,
//! constructed once, and injected into each stage by reference — never
//! ambient global state.

use crate::error::ProcessError;
use crate::providers::{EmbeddingProvider, ExtractionProvider, LayoutProvider};
use std::fmt;
use std::sync::Arc;

/// Configuration for one processing pipeline.
///
/// # Example
/// ```rust,no_run
/// use invoice2db::ProcessingConfig;
/// # fn providers() -> (std::sync::Arc<dyn invoice2db::LayoutProvider>, std::sync::Arc<dyn invoice2db::ExtractionProvider>) { unimplemented!() }
///
/// let (layout, extraction) = providers();
/// let config = ProcessingConfig::builder()
///     .layout_provider(layout)
///     .extraction_provider(extraction)
///     .totals_tolerance(0.05)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ProcessingConfig {
    /// Layout/OCR provider. Required.
    pub layout_provider: Option<Arc<dyn LayoutProvider>>,

    /// Generative extraction provider, shared by both passes. Required.
    pub extraction_provider: Option<Arc<dyn ExtractionProvider>>,

    /// Embedding provider. Optional — when absent, enrichment is skipped and
    /// the response reports `embedding.enabled = false`.
    pub embedding_provider: Option<Arc<dyn EmbeddingProvider>>,

    /// Document download timeout in seconds. Default: 60.
    pub download_timeout_secs: u64,

    /// Layout-analysis call timeout in seconds. Default: 120.
    pub layout_timeout_secs: u64,

    /// Timeout for the layout-based extraction pass in seconds. Default: 120.
    pub layout_extract_timeout_secs: u64,

    /// Timeout for the document-based extraction pass in seconds. Default: 180.
    ///
    /// Higher than the layout pass: the provider must read the raw document
    /// itself instead of pre-digested structure.
    pub document_extract_timeout_secs: u64,

    /// Per-line embedding call timeout in seconds. Default: 30.
    pub embedding_timeout_secs: u64,

    /// Absolute tolerance (in currency units) when comparing a recomputed
    /// line total against the stated one. Default: 0.01.
    ///
    /// One cent absorbs the rounding the vendor's own system applied when it
    /// printed the invoice; anything beyond it is a real mismatch.
    pub line_tolerance: f64,

    /// Absolute tolerance when comparing invoice-level totals. Default: 0.01.
    pub totals_tolerance: f64,

    /// A totals disagreement (between candidates, or between recomputed and
    /// stated values) larger than this is "major" and caps confidence at
    /// `low`. Default: 1.00.
    pub major_mismatch_threshold: f64,

    /// Maximum number of `fields_needing_review` entries still compatible
    /// with `medium` confidence. Default: 3.
    ///
    /// Confidence assignment is monotonic: every additional review field and
    /// every widening of the totals gap moves the level toward `low`, never
    /// away from it.
    pub max_minor_review_fields: usize,

    /// Maximum characters of embedding input sent per line. Default: 8000.
    pub embedding_input_cap: usize,

    /// Optional static shared-secret gate: header name and expected value.
    /// When set, a missing or mismatched header rejects the request before
    /// any collaborator is invoked.
    pub expected_header: Option<(String, String)>,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            layout_provider: None,
            extraction_provider: None,
            embedding_provider: None,
            download_timeout_secs: 60,
            layout_timeout_secs: 120,
            layout_extract_timeout_secs: 120,
            document_extract_timeout_secs: 180,
            embedding_timeout_secs: 30,
            line_tolerance: 0.01,
            totals_tolerance: 0.01,
            major_mismatch_threshold: 1.00,
            max_minor_review_fields: 3,
            embedding_input_cap: 8000,
            expected_header: None,
        }
    }
}

impl fmt::Debug for ProcessingConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessingConfig")
            .field(
                "layout_provider",
                &self.layout_provider.as_ref().map(|_| "<dyn LayoutProvider>"),
            )
            .field(
                "extraction_provider",
                &self
                    .extraction_provider
                    .as_ref()
                    .map(|_| "<dyn ExtractionProvider>"),
            )
            .field(
                "embedding_provider",
                &self
                    .embedding_provider
                    .as_ref()
                    .map(|_| "<dyn EmbeddingProvider>"),
            )
            .field("download_timeout_secs", &self.download_timeout_secs)
            .field("layout_timeout_secs", &self.layout_timeout_secs)
            .field("line_tolerance", &self.line_tolerance)
            .field("totals_tolerance", &self.totals_tolerance)
            .field("major_mismatch_threshold", &self.major_mismatch_threshold)
            .field("max_minor_review_fields", &self.max_minor_review_fields)
            .field("expected_header", &self.expected_header.as_ref().map(|(n, _)| n))
            .finish()
    }
}

impl ProcessingConfig {
    /// Create a new builder.
    pub fn builder() -> ProcessingConfigBuilder {
        ProcessingConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ProcessingConfig`].
pub struct ProcessingConfigBuilder {
    config: ProcessingConfig,
}

impl ProcessingConfigBuilder {
    pub fn layout_provider(mut self, p: Arc<dyn LayoutProvider>) -> Self {
        self.config.layout_provider = Some(p);
        self
    }

    pub fn extraction_provider(mut self, p: Arc<dyn ExtractionProvider>) -> Self {
        self.config.extraction_provider = Some(p);
        self
    }

    pub fn embedding_provider(mut self, p: Arc<dyn EmbeddingProvider>) -> Self {
        self.config.embedding_provider = Some(p);
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs.max(1);
        self
    }

    pub fn layout_timeout_secs(mut self, secs: u64) -> Self {
        self.config.layout_timeout_secs = secs.max(1);
        self
    }

    pub fn layout_extract_timeout_secs(mut self, secs: u64) -> Self {
        self.config.layout_extract_timeout_secs = secs.max(1);
        self
    }

    pub fn document_extract_timeout_secs(mut self, secs: u64) -> Self {
        self.config.document_extract_timeout_secs = secs.max(1);
        self
    }

    pub fn embedding_timeout_secs(mut self, secs: u64) -> Self {
        self.config.embedding_timeout_secs = secs.max(1);
        self
    }

    pub fn line_tolerance(mut self, tol: f64) -> Self {
        self.config.line_tolerance = tol;
        self
    }

    pub fn totals_tolerance(mut self, tol: f64) -> Self {
        self.config.totals_tolerance = tol;
        self
    }

    pub fn major_mismatch_threshold(mut self, t: f64) -> Self {
        self.config.major_mismatch_threshold = t;
        self
    }

    pub fn max_minor_review_fields(mut self, n: usize) -> Self {
        self.config.max_minor_review_fields = n;
        self
    }

    pub fn embedding_input_cap(mut self, n: usize) -> Self {
        self.config.embedding_input_cap = n.max(1);
        self
    }

    pub fn expected_header(
        mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.config.expected_header = Some((name.into(), value.into()));
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ProcessingConfig, ProcessError> {
        let c = &self.config;
        if c.line_tolerance < 0.0 || c.totals_tolerance < 0.0 {
            return Err(ProcessError::InvalidConfig(
                "Tolerances must be non-negative".into(),
            ));
        }
        if c.major_mismatch_threshold < c.totals_tolerance {
            return Err(ProcessError::InvalidConfig(format!(
                "major_mismatch_threshold ({}) must be ≥ totals_tolerance ({})",
                c.major_mismatch_threshold, c.totals_tolerance
            )));
        }
        Ok(self.config)
    }
}
