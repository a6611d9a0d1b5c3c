//! # invoice2db
//!
//! Turn a scanned/PDF vendor invoice into a structured, categorized,
//! database-ready record.
//!
//! ## Why this crate?
//!
//! Single-shot invoice extraction is brittle: one model call over one input
//! representation hallucinates part numbers, drops lines, and invents totals.
//! Instead this crate runs a layout/OCR engine first, then **two independent
//! generative extraction passes** — one over the layout structure, one over
//! the raw document — and deterministically reconciles the candidates against
//! the layout engine's own totals. Disagreements are arbitrated by anchors
//! and arithmetic, flagged for review, and graded with an explicit confidence
//! level instead of silently trusted.
//!
//! ## Pipeline Overview
//!
//! ```text
//! document URL
//!  │
//!  ├─ 1. Fetch      download + PDF magic-byte validation
//!  ├─ 2. Layout     OCR text, tables, key-values (opaque provider)
//!  ├─ 3. Extract    pass A (layout JSON) ∥ pass B (raw bytes), joined
//!  ├─ 4. Reconcile  anchor + arithmetic arbitration, warnings, confidence
//!  ├─ 5. Enrich     best-effort per-line embeddings (failure-isolated)
//!  └─ 6. Project    repair-order / line-item rows ready for persistence
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use invoice2db::{process, providers, ProcessRequest, ProcessingConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Providers resolved from AZURE_DOCINTEL_* / GEMINI_* env vars
//!     let set = providers::resolve_from_env()?;
//!     let mut builder = ProcessingConfig::builder()
//!         .layout_provider(set.layout)
//!         .extraction_provider(set.extraction);
//!     if let Some(embedding) = set.embedding {
//!         builder = builder.embedding_provider(embedding);
//!     }
//!     let config = builder.build()?;
//!
//!     let request = ProcessRequest {
//!         document_url: "https://example.com/invoice.pdf".into(),
//!         ..Default::default()
//!     };
//!     let output = process(&request, &config).await?;
//!     println!("confidence: {:?}", output.final_result.confidence);
//!     for warning in &output.final_result.warnings {
//!         eprintln!("warning: {warning}");
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature  | Default | Description |
//! |----------|---------|-------------|
//! | `server` | on      | Enables the `invoice2db` binary and the axum HTTP surface |
//!
//! Disable `server` when using only the library:
//! ```toml
//! invoice2db = { version = "0.3", default-features = false }
//! ```
//!
//! ## Providers
//!
//! The three external capabilities — layout/OCR, generative extraction,
//! embeddings — are narrow traits ([`LayoutProvider`], [`ExtractionProvider`],
//! [`EmbeddingProvider`]). The bundled adapters speak Azure Document
//! Intelligence, Gemini, and Azure OpenAI; tests inject stubs returning
//! canned payloads, so the whole pipeline runs without network access.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod pipeline;
pub mod process;
pub mod project;
pub mod prompts;
pub mod providers;
pub mod record;
pub mod taxonomy;

#[cfg(feature = "server")]
pub mod server;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ProcessingConfig, ProcessingConfigBuilder};
pub use error::{ExtractionPass, ProcessError};
pub use pipeline::layout::LayoutPayload;
pub use process::{process, ProcessRequest};
pub use providers::{EmbeddingProvider, ExtractionProvider, LayoutProvider, PromptPart};
pub use record::{
    Confidence, InvoiceHeader, InvoiceRecord, InvoiceTotals, LineItem, ProcessingOutput,
    ReconciliationResult,
};
pub use taxonomy::CATEGORIES;
