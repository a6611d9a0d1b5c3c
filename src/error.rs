//! Error types for the invoice2db library.
//!
//! A single structured enum, [`ProcessError`], covers every failure class in
//! the pipeline. Each variant carries a machine-checkable kind rather than a
//! pre-formatted message, so callers (and tests) branch on the variant instead
//! of parsing text, and the HTTP layer can map kinds to status classes:
//!
//! * **Caller-fault** (bad request): [`ProcessError::InvalidRequest`],
//!   [`ProcessError::DocumentFetchFailed`], [`ProcessError::DocumentFetchTimeout`],
//!   [`ProcessError::NotAPdf`] — the supplied document reference or body is at
//!   fault.
//! * **Auth**: [`ProcessError::Unauthorized`] — shared-secret header mismatch.
//! * **Pipeline** (server-error class): layout analysis, either extraction
//!   pass, normalization, reconciliation. Extraction-stage failures are tagged
//!   with the [`ExtractionPass`] that produced them so logs identify the stage.
//!
//! Embedding-enrichment failures are deliberately *absent* here: they are
//! non-fatal, degrade to "no embedding for this line", and never abort the
//! request.

use thiserror::Error;

/// Which of the two independent extraction passes produced a failure.
///
/// The passes are mutually blind; tagging errors by pass is the only way to
/// tell from a log line whether the layout-based or the document-based call
/// misbehaved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ExtractionPass {
    /// Pass A: extraction over the serialized layout-analysis payload.
    Layout,
    /// Pass B: extraction over the raw document bytes.
    Document,
}

impl std::fmt::Display for ExtractionPass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtractionPass::Layout => write!(f, "layout"),
            ExtractionPass::Document => write!(f, "document"),
        }
    }
}

/// All errors returned by the invoice2db library.
#[derive(Debug, Error)]
pub enum ProcessError {
    // ── Request errors ────────────────────────────────────────────────────
    /// The request body is missing a required field or otherwise invalid.
    #[error("Invalid request: {detail}")]
    InvalidRequest { detail: String },

    /// The shared-secret header was configured but absent or mismatched.
    #[error("Unauthorized")]
    Unauthorized,

    // ── Document errors ───────────────────────────────────────────────────
    /// The caller-supplied document location could not be fetched.
    #[error("Failed to fetch document '{url}': {reason}")]
    DocumentFetchFailed { url: String, reason: String },

    /// Document download exceeded the configured timeout.
    #[error("Document download timed out after {secs}s for '{url}'")]
    DocumentFetchTimeout { url: String, secs: u64 },

    /// The fetched bytes are not a PDF.
    #[error("Fetched document is not a valid PDF (first bytes: {magic:?})")]
    NotAPdf { magic: [u8; 4] },

    // ── Pipeline errors ───────────────────────────────────────────────────
    /// The layout/OCR provider failed. One attempt only; not retried.
    #[error("Layout analysis failed: {detail}")]
    LayoutAnalysisFailed { detail: String },

    /// A generative extraction call failed, tagged by pass.
    #[error("Extraction failed ({pass} pass): {detail}")]
    ExtractionFailed {
        pass: ExtractionPass,
        detail: String,
    },

    /// An extraction call timed out, tagged by pass.
    #[error("Extraction timed out after {secs}s ({pass} pass)")]
    ExtractionTimeout { pass: ExtractionPass, secs: u64 },

    /// The normalizer could not parse a pass's output as the record schema.
    ///
    /// Never silently swallowed — propagates so the producing stage can be
    /// identified in logs and in the response.
    #[error("Malformed extraction output ({pass} pass): {detail}")]
    MalformedExtraction {
        pass: ExtractionPass,
        detail: String,
    },

    /// Reconciliation could not produce a record (both candidates empty).
    #[error("Reconciliation failed: {detail}")]
    ReconciliationFailed { detail: String },

    // ── Provider / config errors ──────────────────────────────────────────
    /// A required provider is not configured (missing endpoint or key).
    #[error("Provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ProcessError {
    /// Whether the fault lies with the caller (bad-request class) rather than
    /// the pipeline (server-error class).
    ///
    /// Document-fetch failures are caller-fault: the location (or its
    /// permissions) was supplied by the caller.
    pub fn is_caller_fault(&self) -> bool {
        matches!(
            self,
            ProcessError::InvalidRequest { .. }
                | ProcessError::DocumentFetchFailed { .. }
                | ProcessError::DocumentFetchTimeout { .. }
                | ProcessError::NotAPdf { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extraction_error_names_the_pass() {
        let e = ProcessError::ExtractionFailed {
            pass: ExtractionPass::Document,
            detail: "HTTP 503".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("document pass"), "got: {msg}");

        let e = ProcessError::MalformedExtraction {
            pass: ExtractionPass::Layout,
            detail: "expected value at line 1".into(),
        };
        assert!(e.to_string().contains("layout pass"));
    }

    #[test]
    fn fetch_errors_are_caller_fault() {
        assert!(ProcessError::DocumentFetchFailed {
            url: "https://example.com/inv.pdf".into(),
            reason: "HTTP 403".into(),
        }
        .is_caller_fault());
        assert!(ProcessError::InvalidRequest {
            detail: "document_url is required".into()
        }
        .is_caller_fault());
        assert!(!ProcessError::LayoutAnalysisFailed {
            detail: "boom".into()
        }
        .is_caller_fault());
        assert!(!ProcessError::Unauthorized.is_caller_fault());
    }

    #[test]
    fn fetch_timeout_display() {
        let e = ProcessError::DocumentFetchTimeout {
            url: "https://example.com/inv.pdf".into(),
            secs: 60,
        };
        assert!(e.to_string().contains("60s"));
    }
}
