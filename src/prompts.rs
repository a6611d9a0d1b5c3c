//! Prompts for the two generative extraction passes.
//!
//! Centralising every prompt here serves two purposes:
//!
//! 1. **Single source of truth** — the record schema the model must emit is
//!    written exactly once and shared by both passes, so the two candidates
//!    are always shape-compatible for reconciliation.
//!
//! 2. **Testability** — unit tests can inspect prompts directly without a
//!    live provider, catching schema drift early.

use crate::taxonomy::CATEGORIES;

/// The JSON shape both passes must emit. Mirrors [`crate::record::InvoiceRecord`].
pub const RECORD_SCHEMA: &str = r#"{
  "header": {
    "vendor_name": ..., "invoice_number": ..., "invoice_date": ...,
    "po_number": ..., "customer_account": ..., "store_branch": ...,
    "salesperson": ..., "payment_terms": ..., "currency": ...
  },
  "totals": {
    "subtotal": ..., "tax": ..., "tax_rate": ..., "shipping": ...,
    "core_charges": ..., "discounts": ..., "fees": ..., "grand_total": ...,
    "amount_paid": ..., "balance_due": ...
  },
  "line_items": [
    {
      "line_number": ..., "part_number": ..., "description": ..., "brand": ...,
      "quantity": ..., "unit_price": ..., "line_discount": ..., "core_charge": ...,
      "line_total": ..., "taxability": ..., "tax_rate": ..., "uom": ...,
      "categories": [], "is_core": ...
    }
  ]
}"#;

/// Prompt for pass A: extraction over the serialized layout-analysis payload.
pub fn layout_extraction_prompt() -> String {
    format!(
        "You are an expert at auto parts invoice extraction. \
         Input is document layout-analysis JSON (text + tables + key-value pairs).\n\
         Return ONLY JSON with this schema:\n{RECORD_SCHEMA}\n\
         Rules: normalize numbers, dates, currency; leave missing fields null; \
         avoid hallucinating; include only content supported by the input.\n\
         {}",
        categories_clause()
    )
}

/// Prompt for pass B: extraction over the raw document bytes.
///
/// This pass lacks pre-extracted table structure, so it is instructed to be
/// conservative: null beats a guessed value.
pub fn document_extraction_prompt() -> String {
    format!(
        "You are an expert at auto parts invoice extraction. \
         Input is the raw PDF document.\n\
         Return ONLY JSON with this schema:\n{RECORD_SCHEMA}\n\
         Be conservative: if a value is uncertain, return null rather than \
         guessing.\n\
         {}",
        categories_clause()
    )
}

/// The closed-taxonomy constraint appended to both prompts.
fn categories_clause() -> String {
    format!(
        "For each line item pick zero or more categories from this list, \
         verbatim, no free-form labels: {}",
        CATEGORIES.join(", ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn both_prompts_carry_schema_and_taxonomy() {
        for prompt in [layout_extraction_prompt(), document_extraction_prompt()] {
            assert!(prompt.contains("\"grand_total\""));
            assert!(prompt.contains("\"categories\""));
            assert!(prompt.contains("Brakes"));
            assert!(prompt.contains("Accessories"));
            assert!(prompt.contains("Return ONLY JSON"));
        }
    }

    #[test]
    fn document_prompt_demands_conservatism() {
        assert!(document_extraction_prompt().contains("conservative"));
        assert!(!layout_extraction_prompt().contains("conservative"));
    }
}
