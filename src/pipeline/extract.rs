//! The two independent extraction passes.
//!
//! Pass A reads the serialized layout payload (pre-extracted tables and
//! key-values make it the better-informed candidate); pass B reads the raw
//! document bytes and is prompted to prefer null over a guess. Neither pass
//! sees the other's output — that independence is the precondition the
//! reconciliation stage depends on, so nothing here cross-validates.
//!
//! Each call carries its own fixed timeout and gets exactly one attempt; a
//! timeout or provider error is terminal for the request.

use crate::config::ProcessingConfig;
use crate::error::{ExtractionPass, ProcessError};
use crate::pipeline::layout::LayoutPayload;
use crate::pipeline::normalize;
use crate::prompts;
use crate::providers::{ExtractionProvider, PromptPart};
use crate::record::InvoiceRecord;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{timeout, Duration};
use tracing::debug;

/// Pass A: extract a candidate record from the layout-analysis payload.
pub async fn extract_from_layout(
    provider: &Arc<dyn ExtractionProvider>,
    payload: &LayoutPayload,
    config: &ProcessingConfig,
) -> Result<InvoiceRecord, ProcessError> {
    let evidence = serde_json::to_string(payload)
        .map_err(|e| ProcessError::Internal(format!("layout payload serialize: {e}")))?;
    let parts = [
        PromptPart::text(prompts::layout_extraction_prompt()),
        PromptPart::text(evidence),
    ];
    run_pass(
        provider,
        &parts,
        ExtractionPass::Layout,
        config.layout_extract_timeout_secs,
    )
    .await
}

/// Pass B: extract a candidate record from the raw document bytes.
pub async fn extract_from_document(
    provider: &Arc<dyn ExtractionProvider>,
    document: &[u8],
    config: &ProcessingConfig,
) -> Result<InvoiceRecord, ProcessError> {
    let parts = [
        PromptPart::text(prompts::document_extraction_prompt()),
        PromptPart::pdf(document.to_vec()),
    ];
    run_pass(
        provider,
        &parts,
        ExtractionPass::Document,
        config.document_extract_timeout_secs,
    )
    .await
}

/// Issue one generative call and normalize its output, attributing every
/// failure to `pass`.
async fn run_pass(
    provider: &Arc<dyn ExtractionProvider>,
    parts: &[PromptPart],
    pass: ExtractionPass,
    timeout_secs: u64,
) -> Result<InvoiceRecord, ProcessError> {
    let started = Instant::now();

    let raw = timeout(Duration::from_secs(timeout_secs), provider.generate(parts))
        .await
        .map_err(|_| ProcessError::ExtractionTimeout {
            pass,
            secs: timeout_secs,
        })?
        .map_err(|e| match e {
            // Configuration problems keep their identity; anything else is
            // an extraction failure attributed to this pass.
            e @ ProcessError::ProviderNotConfigured { .. } => e,
            other => ProcessError::ExtractionFailed {
                pass,
                detail: other.to_string(),
            },
        })?;

    debug!(
        %pass,
        chars = raw.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "extraction pass complete"
    );

    normalize::parse_record(&raw, pass)
}
