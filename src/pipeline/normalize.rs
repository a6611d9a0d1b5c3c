//! Output normalizer: parse textual model output into a structured record.
//!
//! ## Why is normalization necessary?
//!
//! Both extraction prompts end with "Return ONLY JSON", and models still
//! routinely wrap the payload in ` ```json … ``` ` fences or append trailing
//! whitespace. The normalizer strips that non-content wrapping, then parses
//! **strictly**: after stripping, the content either deserializes as the full
//! record schema or the call fails with
//! [`ProcessError::MalformedExtraction`] tagged by the producing pass. There
//! is no partial/best-effort value — a half-parsed invoice is worse than a
//! loud failure, because downstream reconciliation would arbitrate against
//! garbage.
//!
//! Pure transformation; no side effects.

use crate::error::{ExtractionPass, ProcessError};
use crate::record::InvoiceRecord;
use once_cell::sync::Lazy;
use regex::Regex;

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```[A-Za-z]*[ \t]*\n(.*?)\n?```\s*$").unwrap());

/// Strip one outer fenced code block (with or without a language tag).
///
/// Idempotent and lossless for the content: input without an outer fence
/// passes through unchanged, and a second application is a no-op.
pub fn strip_fences(input: &str) -> &str {
    match RE_OUTER_FENCES.captures(input.trim()) {
        Some(caps) => caps.get(1).map(|m| m.as_str()).unwrap_or(""),
        None => input.trim(),
    }
}

/// Parse raw model output into an [`InvoiceRecord`].
///
/// `pass` tags the failure so error reports identify which extraction stage
/// produced the unparsable output.
pub fn parse_record(raw: &str, pass: ExtractionPass) -> Result<InvoiceRecord, ProcessError> {
    let content = strip_fences(raw);
    serde_json::from_str(content).map_err(|e| ProcessError::MalformedExtraction {
        pass,
        detail: e.to_string(),
    })
}
