//! Invoice data model and response envelope.
//!
//! Every field a generative pass may fail to find is `Option` — `null` in the
//! wire schema means "unsupported by input evidence", never an empty-string or
//! zero sentinel. The whole tree is `Serialize + Deserialize` because the same
//! shape travels in three directions: out to the extraction prompt (as the
//! schema the model must emit), in from the normalizer (strict parse of model
//! output), and out again in the HTTP response.
//!
//! Candidates produced by the two passes are never mutated in place;
//! reconciliation builds a fresh [`InvoiceRecord`].

use serde::{Deserialize, Serialize};

/// Header-level fields of a vendor invoice.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InvoiceHeader {
    pub vendor_name: Option<String>,
    pub invoice_number: Option<String>,
    pub invoice_date: Option<String>,
    pub po_number: Option<String>,
    pub customer_account: Option<String>,
    pub store_branch: Option<String>,
    pub salesperson: Option<String>,
    pub payment_terms: Option<String>,
    pub currency: Option<String>,
}

/// Invoice-level totals.
///
/// Soft invariant, checked (not enforced) during reconciliation:
/// `grand_total ≈ subtotal + tax + shipping + fees − discounts`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InvoiceTotals {
    pub subtotal: Option<f64>,
    pub tax: Option<f64>,
    pub tax_rate: Option<f64>,
    pub shipping: Option<f64>,
    pub core_charges: Option<f64>,
    pub discounts: Option<f64>,
    pub fees: Option<f64>,
    pub grand_total: Option<f64>,
    pub amount_paid: Option<f64>,
    pub balance_due: Option<f64>,
}

/// One invoice line.
///
/// `categories` holds labels drawn exclusively from the fixed taxonomy
/// (see [`crate::taxonomy`]) — never free text. `embedding` is attached
/// post-hoc by the enrichment stage and is absent in extraction output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LineItem {
    pub line_number: Option<i64>,
    pub part_number: Option<String>,
    pub description: Option<String>,
    pub brand: Option<String>,
    pub quantity: Option<f64>,
    pub unit_price: Option<f64>,
    pub line_discount: Option<f64>,
    pub core_charge: Option<f64>,
    pub line_total: Option<f64>,
    pub taxability: Option<String>,
    pub tax_rate: Option<f64>,
    pub uom: Option<String>,
    pub categories: Vec<String>,
    pub is_core: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

/// A complete candidate or reconciled invoice record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InvoiceRecord {
    pub header: InvoiceHeader,
    pub totals: InvoiceTotals,
    pub line_items: Vec<LineItem>,
}

/// Overall confidence in the reconciled record.
///
/// Assignment is deterministic and monotonic in the disagreement signals; the
/// exact thresholds live in [`crate::config::ProcessingConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

/// Output of the reconciliation stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconciliationResult {
    /// The single best-supported record.
    #[serde(rename = "data")]
    pub record: InvoiceRecord,
    /// Human-readable mismatch notes (field path, expected vs. actual).
    pub warnings: Vec<String>,
    pub confidence: Confidence,
    /// Field paths (e.g. `totals.grand_total`, `line_items[2].unit_price`)
    /// where the candidates disagreed and no anchor resolved the conflict.
    pub fields_needing_review: Vec<String>,
}

// ── Response envelope ────────────────────────────────────────────────────

/// Compact summary of the layout-analysis payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutSummary {
    pub documents: usize,
    pub pages: usize,
    pub model_id: Option<String>,
}

/// Echo of the caller-supplied document reference and hints.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceInfo {
    pub document_url: String,
    pub invoice_hint: Option<String>,
    pub vendor_hint: Option<String>,
    pub shop_id: Option<String>,
}

/// What the enrichment stage did (or skipped).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmbeddingSummary {
    /// True when at least one line was enriched.
    pub enabled: bool,
    /// Number of lines that received an embedding.
    pub count: usize,
    /// Provider deployment identifier, when configured.
    pub deployment: Option<String>,
    /// Provider model identifier, when configured.
    pub model: Option<String>,
}

/// Wall-clock accounting per pipeline stage, in milliseconds.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessingStats {
    pub fetch_ms: u64,
    pub layout_ms: u64,
    /// Both passes run concurrently; this is the joined wall-clock time.
    pub extract_ms: u64,
    pub reconcile_ms: u64,
    pub enrich_ms: u64,
    pub total_ms: u64,
}

/// The full successful response: reconciled record, both raw candidates,
/// layout summary, source echo, enrichment summary, and the
/// persistence-ready projection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingOutput {
    #[serde(rename = "final")]
    pub final_result: ReconciliationResult,
    pub pass_a: InvoiceRecord,
    pub pass_b: InvoiceRecord,
    pub layout: LayoutSummary,
    pub source: SourceInfo,
    pub embedding: EmbeddingSummary,
    pub db_ready: crate::project::DbReady,
    pub stats: ProcessingStats,
}
