//! The end-to-end processing entry point.
//!
//! One call = one document = one execution context. The stages run in a
//! fixed order; the only internal parallelism is the two extraction passes,
//! which are mutually independent (neither reads the other's output) and are
//! therefore issued concurrently and joined before reconciliation begins.
//!
//! Everything lives in memory for the duration of the call and is dropped
//! when the response is returned — no persistence, no shared mutable state
//! across invocations beyond the injected provider handles.

use crate::config::ProcessingConfig;
use crate::error::ProcessError;
use crate::pipeline::{enrich, extract, fetch, reconcile};
use crate::project;
use crate::record::{ProcessingOutput, ProcessingStats, SourceInfo};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tokio::time::{timeout, Duration};
use tracing::info;

/// One processing request: a document reference plus optional hints.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessRequest {
    /// Location of the document to process. Required.
    pub document_url: String,
    pub shop_id: Option<String>,
    pub invoice_id: Option<String>,
    pub po_number: Option<String>,
    pub vendor_hint: Option<String>,
}

impl ProcessRequest {
    /// Validate required fields. Runs before any collaborator is invoked.
    pub fn validate(&self) -> Result<(), ProcessError> {
        if self.document_url.trim().is_empty() {
            return Err(ProcessError::InvalidRequest {
                detail: "document_url is required".into(),
            });
        }
        Ok(())
    }

    fn source_info(&self) -> SourceInfo {
        SourceInfo {
            document_url: self.document_url.clone(),
            invoice_hint: self.invoice_id.clone().or_else(|| self.po_number.clone()),
            vendor_hint: self.vendor_hint.clone(),
            shop_id: self.shop_id.clone(),
        }
    }
}

/// Process one invoice document end to end.
///
/// # Errors
/// Any stage failure is terminal for the request — there is exactly one
/// attempt per stage. See [`ProcessError`] for the taxonomy; embedding
/// failures are the one exception and never surface here.
pub async fn process(
    request: &ProcessRequest,
    config: &ProcessingConfig,
) -> Result<ProcessingOutput, ProcessError> {
    let total_start = Instant::now();
    request.validate()?;

    let layout_provider =
        config
            .layout_provider
            .as_ref()
            .ok_or_else(|| ProcessError::ProviderNotConfigured {
                provider: "layout".into(),
                hint: "Inject a LayoutProvider into ProcessingConfig.".into(),
            })?;
    let extraction_provider =
        config
            .extraction_provider
            .as_ref()
            .ok_or_else(|| ProcessError::ProviderNotConfigured {
                provider: "extraction".into(),
                hint: "Inject an ExtractionProvider into ProcessingConfig.".into(),
            })?;

    info!("Processing invoice: {}", request.document_url);

    // ── Step 1: Fetch the document ───────────────────────────────────────
    let fetch_start = Instant::now();
    let document = fetch::fetch_document(&request.document_url, config.download_timeout_secs).await?;
    let fetch_ms = fetch_start.elapsed().as_millis() as u64;

    // ── Step 2: Layout analysis ──────────────────────────────────────────
    let layout_start = Instant::now();
    let layout = timeout(
        Duration::from_secs(config.layout_timeout_secs),
        layout_provider.analyze(&document),
    )
    .await
    .map_err(|_| ProcessError::LayoutAnalysisFailed {
        detail: format!("timed out after {}s", config.layout_timeout_secs),
    })??;
    let layout_ms = layout_start.elapsed().as_millis() as u64;
    info!(
        pages = layout.pages,
        tables = layout.tables.len(),
        key_values = layout.key_values.len(),
        "layout analysis complete"
    );

    // ── Step 3: Both extraction passes, concurrently ─────────────────────
    let extract_start = Instant::now();
    let (pass_a, pass_b) = futures::try_join!(
        extract::extract_from_layout(extraction_provider, &layout, config),
        extract::extract_from_document(extraction_provider, &document, config),
    )?;
    let extract_ms = extract_start.elapsed().as_millis() as u64;
    info!(
        a_lines = pass_a.line_items.len(),
        b_lines = pass_b.line_items.len(),
        "extraction passes complete"
    );

    // ── Step 4: Reconcile ────────────────────────────────────────────────
    let reconcile_start = Instant::now();
    let mut final_result = reconcile::reconcile(&pass_a, &pass_b, &layout, config)?;
    let reconcile_ms = reconcile_start.elapsed().as_millis() as u64;

    // ── Step 5: Best-effort embeddings ───────────────────────────────────
    let enrich_start = Instant::now();
    let embedding = enrich::enrich_lines(
        config.embedding_provider.as_ref(),
        &mut final_result.record.line_items,
        config,
    )
    .await;
    let enrich_ms = enrich_start.elapsed().as_millis() as u64;

    // ── Step 6: Project into the database-ready shape ────────────────────
    let db_ready = project::to_db_shape(
        &request.document_url,
        &final_result.record,
        request.shop_id.as_deref(),
    );

    let stats = ProcessingStats {
        fetch_ms,
        layout_ms,
        extract_ms,
        reconcile_ms,
        enrich_ms,
        total_ms: total_start.elapsed().as_millis() as u64,
    };
    info!(
        confidence = ?final_result.confidence,
        warnings = final_result.warnings.len(),
        total_ms = stats.total_ms,
        "processing complete"
    );

    Ok(ProcessingOutput {
        layout: layout.summarize(),
        final_result,
        pass_a,
        pass_b,
        source: request.source_info(),
        embedding,
        db_ready,
        stats,
    })
}
