//! Reconciliation: arbitrate two candidate records against the layout anchors.
//!
//! This is the stage the rest of the pipeline exists to feed. Given the two
//! independently produced candidates and the layout payload, it emits one
//! authoritative record plus the evidence trail (warnings, review paths,
//! confidence). Candidates are read-only; the result is always a fresh
//! record.
//!
//! ## Arbitration order
//!
//! For every field present in either candidate:
//!
//! 1. **Agreement wins.** Equal values (within tolerance for amounts) are
//!    kept as-is.
//! 2. **Single source wins.** A value only one pass found is accepted.
//! 3. **Anchors break ties.** Numeric disagreements resolve toward the
//!    amount mined from the layout key-values; string disagreements resolve
//!    toward the value that literally appears in the recognized text.
//! 4. **Arithmetic breaks remaining numeric ties.** The candidate closer to
//!    the recomputed value (line sums, totals identity) wins.
//! 5. **The layout pass is the default.** It saw pre-extracted table
//!    structure; the document pass is prompted to be conservative.
//!
//! Every disagreement that needed step 3 or beyond is recorded in
//! `fields_needing_review`. Recomputed-vs-stated mismatches beyond tolerance
//! become warnings with field path and both values — actionable, but never
//! blocking.
//!
//! ## Confidence
//!
//! Deterministic and monotonic in two signals: the number of review fields
//! and the largest observed totals gap (candidate disagreement or
//! recomputation mismatch). Thresholds live in
//! [`ProcessingConfig`](crate::config::ProcessingConfig):
//! `high` = no review fields and gap ≤ `totals_tolerance`;
//! `medium` = review fields ≤ `max_minor_review_fields` and gap ≤
//! `major_mismatch_threshold`; `low` otherwise. Adding a review field or
//! widening a gap can only lower the level.

use crate::config::ProcessingConfig;
use crate::error::ProcessError;
use crate::pipeline::layout::LayoutPayload;
use crate::project::clean_part_number;
use crate::record::{
    Confidence, InvoiceHeader, InvoiceRecord, InvoiceTotals, LineItem, ReconciliationResult,
};
use crate::taxonomy;
use tracing::debug;

/// Reconcile the two candidates into one authoritative record.
///
/// Errors only on degenerate input: both candidates entirely empty.
pub fn reconcile(
    pass_a: &InvoiceRecord,
    pass_b: &InvoiceRecord,
    layout: &LayoutPayload,
    config: &ProcessingConfig,
) -> Result<ReconciliationResult, ProcessError> {
    if *pass_a == InvoiceRecord::default() && *pass_b == InvoiceRecord::default() {
        return Err(ProcessError::ReconciliationFailed {
            detail: "both extraction passes returned empty records".into(),
        });
    }

    let mut rec = Reconciler {
        config,
        anchors: AnchorTotals::from_layout(layout),
        layout_text_lower: layout.content.to_lowercase(),
        warnings: Vec::new(),
        review: Vec::new(),
        max_gap: 0.0,
    };

    let header = rec.merge_header(&pass_a.header, &pass_b.header);
    let line_items = rec.merge_lines(&pass_a.line_items, &pass_b.line_items);
    let totals = rec.merge_totals(&pass_a.totals, &pass_b.totals, &line_items);

    let confidence = rec.confidence();
    debug!(
        review_fields = rec.review.len(),
        warnings = rec.warnings.len(),
        max_gap = rec.max_gap,
        ?confidence,
        "reconciliation complete"
    );

    Ok(ReconciliationResult {
        record: InvoiceRecord {
            header,
            totals,
            line_items,
        },
        warnings: rec.warnings,
        confidence,
        fields_needing_review: rec.review,
    })
}

// ── Anchor totals ────────────────────────────────────────────────────────

/// Amounts mined from the layout key-values, used to break ties.
#[derive(Debug, Default, Clone, Copy)]
pub struct AnchorTotals {
    pub subtotal: Option<f64>,
    pub tax: Option<f64>,
    pub shipping: Option<f64>,
    pub grand_total: Option<f64>,
}

impl AnchorTotals {
    /// Classify each recognized key-value pair by keyword and parse its
    /// amount. First match per field wins — layout engines emit key-values
    /// in reading order, and the labelled totals block is printed once.
    pub fn from_layout(layout: &LayoutPayload) -> Self {
        let mut anchors = Self::default();
        for kv in &layout.key_values {
            let key = kv.key.to_lowercase();
            let Some(amount) = parse_money(&kv.value) else {
                continue;
            };
            if anchors.subtotal.is_none() && (key.contains("subtotal") || key.contains("sub total"))
            {
                anchors.subtotal = Some(amount);
            } else if anchors.shipping.is_none()
                && (key.contains("shipping") || key.contains("freight"))
            {
                anchors.shipping = Some(amount);
            } else if anchors.tax.is_none() && key.contains("tax") && !key.contains("rate") {
                anchors.tax = Some(amount);
            } else if anchors.grand_total.is_none() && is_grand_total_key(&key) {
                anchors.grand_total = Some(amount);
            }
        }
        anchors
    }
}

fn is_grand_total_key(key: &str) -> bool {
    if key.contains("sub") {
        return false;
    }
    key.contains("grand total")
        || key.contains("invoice total")
        || key.contains("total due")
        || key.contains("amount due")
        || key.contains("balance due")
        || key.trim_end_matches(':').trim().ends_with("total")
}

/// Parse a printed money string ("$1,234.56", "1 234,00" is *not* handled —
/// US-format invoices only) into a float. Returns `None` when nothing
/// numeric survives.
pub fn parse_money(text: &str) -> Option<f64> {
    let cleaned: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    if cleaned.is_empty() || cleaned == "-" {
        return None;
    }
    cleaned.parse().ok()
}

// ── The arbiter ──────────────────────────────────────────────────────────

struct Reconciler<'a> {
    config: &'a ProcessingConfig,
    anchors: AnchorTotals,
    layout_text_lower: String,
    warnings: Vec<String>,
    review: Vec<String>,
    /// Largest totals gap observed (candidate disagreement or recompute
    /// mismatch) — one of the two confidence signals.
    max_gap: f64,
}

impl Reconciler<'_> {
    fn note_gap(&mut self, gap: f64) {
        if gap > self.max_gap {
            self.max_gap = gap;
        }
    }

    /// Arbitrate one optional string field.
    fn pick_string(
        &mut self,
        a: &Option<String>,
        b: &Option<String>,
        path: &str,
    ) -> Option<String> {
        match (a.as_deref(), b.as_deref()) {
            (None, None) => None,
            (Some(x), None) => Some(x.to_string()),
            (None, Some(y)) => Some(y.to_string()),
            (Some(x), Some(y)) if x.trim().eq_ignore_ascii_case(y.trim()) => Some(x.to_string()),
            (Some(x), Some(y)) => {
                let x_anchored = self.layout_text_lower.contains(&x.to_lowercase());
                let y_anchored = self.layout_text_lower.contains(&y.to_lowercase());
                self.review.push(path.to_string());
                match (x_anchored, y_anchored) {
                    (false, true) => Some(y.to_string()),
                    // Tie or only-A anchored: the layout pass wins.
                    _ => Some(x.to_string()),
                }
            }
        }
    }

    /// Arbitrate one optional amount field.
    ///
    /// `anchor` is the layout key-value amount for this field (when mined);
    /// `recomputed` is the arithmetic expectation (when derivable).
    fn pick_amount(
        &mut self,
        a: Option<f64>,
        b: Option<f64>,
        anchor: Option<f64>,
        recomputed: Option<f64>,
        path: &str,
    ) -> Option<f64> {
        let tol = self.config.totals_tolerance;
        match (a, b) {
            (None, None) => None,
            (Some(x), None) | (None, Some(x)) => Some(x),
            (Some(x), Some(y)) if (x - y).abs() <= tol => Some(x),
            (Some(x), Some(y)) => {
                self.note_gap((x - y).abs());
                self.review.push(path.to_string());
                let arbiter = anchor.or(recomputed);
                match arbiter {
                    Some(target) if (y - target).abs() < (x - target).abs() => Some(y),
                    Some(_) => Some(x),
                    None => Some(x),
                }
            }
        }
    }

    // ── Header ────────────────────────────────────────────────────────────

    fn merge_header(&mut self, a: &InvoiceHeader, b: &InvoiceHeader) -> InvoiceHeader {
        InvoiceHeader {
            vendor_name: self.pick_string(&a.vendor_name, &b.vendor_name, "header.vendor_name"),
            invoice_number: self.pick_string(
                &a.invoice_number,
                &b.invoice_number,
                "header.invoice_number",
            ),
            invoice_date: self.pick_string(&a.invoice_date, &b.invoice_date, "header.invoice_date"),
            po_number: self.pick_string(&a.po_number, &b.po_number, "header.po_number"),
            customer_account: self.pick_string(
                &a.customer_account,
                &b.customer_account,
                "header.customer_account",
            ),
            store_branch: self.pick_string(&a.store_branch, &b.store_branch, "header.store_branch"),
            salesperson: self.pick_string(&a.salesperson, &b.salesperson, "header.salesperson"),
            payment_terms: self.pick_string(
                &a.payment_terms,
                &b.payment_terms,
                "header.payment_terms",
            ),
            currency: self.pick_string(&a.currency, &b.currency, "header.currency"),
        }
    }

    // ── Line items ────────────────────────────────────────────────────────

    fn merge_lines(&mut self, a: &[LineItem], b: &[LineItem]) -> Vec<LineItem> {
        let pairs = pair_lines(a, b);
        let mut merged = Vec::with_capacity(pairs.len());
        for (idx, (line_a, line_b)) in pairs.into_iter().enumerate() {
            merged.push(self.merge_line(line_a, line_b, idx));
        }
        merged
    }

    fn merge_line(&mut self, a: Option<&LineItem>, b: Option<&LineItem>, idx: usize) -> LineItem {
        let empty = LineItem::default();
        let (a, b, unpaired) = match (a, b) {
            (Some(a), Some(b)) => (a, b, false),
            (Some(a), None) => (a, &empty, false),
            // A line only the document pass found: keep it, but a human
            // should confirm it is not a hallucinated row.
            (None, Some(b)) => (&empty, b, true),
            (None, None) => unreachable!("pair_lines never yields an empty pair"),
        };
        if unpaired {
            self.review.push(format!("line_items[{idx}]"));
        }

        let path = |field: &str| format!("line_items[{idx}].{field}");

        let quantity = self.pick_amount(a.quantity, b.quantity, None, None, &path("quantity"));
        let unit_price =
            self.pick_amount(a.unit_price, b.unit_price, None, None, &path("unit_price"));
        let line_discount = self.pick_amount(
            a.line_discount,
            b.line_discount,
            None,
            None,
            &path("line_discount"),
        );
        let core_charge = self.pick_amount(
            a.core_charge,
            b.core_charge,
            None,
            None,
            &path("core_charge"),
        );

        // line_total ≈ quantity × unit_price − line_discount + core_charge
        let recomputed = match (quantity, unit_price) {
            (Some(q), Some(p)) => {
                Some(q * p - line_discount.unwrap_or(0.0) + core_charge.unwrap_or(0.0))
            }
            _ => None,
        };

        let stated = self.pick_amount(
            a.line_total,
            b.line_total,
            None,
            recomputed,
            &path("line_total"),
        );
        let line_total = match (stated, recomputed) {
            (Some(s), Some(r)) => {
                if (s - r).abs() > self.config.line_tolerance {
                    self.note_gap((s - r).abs());
                    self.warnings.push(format!(
                        "{}: stated {s:.2}, recomputed {r:.2}",
                        path("line_total")
                    ));
                }
                Some(s)
            }
            (Some(s), None) => Some(s),
            // No stated value from either pass: fill with arithmetic.
            (None, r) => r,
        };

        let is_core = match (a.is_core, b.is_core) {
            (Some(x), Some(y)) if x == y => Some(x),
            (Some(_), Some(_)) => {
                // Candidates disagree; a present core charge settles it.
                self.review.push(path("is_core"));
                Some(core_charge.unwrap_or(0.0) > 0.0)
            }
            (Some(x), None) | (None, Some(x)) => Some(x),
            (None, None) => None,
        };

        LineItem {
            line_number: a.line_number.or(b.line_number),
            part_number: self.pick_string(&a.part_number, &b.part_number, &path("part_number")),
            description: self.pick_string(&a.description, &b.description, &path("description")),
            brand: self.pick_string(&a.brand, &b.brand, &path("brand")),
            quantity,
            unit_price,
            line_discount,
            core_charge,
            line_total,
            taxability: self.pick_string(&a.taxability, &b.taxability, &path("taxability")),
            tax_rate: self.pick_amount(a.tax_rate, b.tax_rate, None, None, &path("tax_rate")),
            uom: self.pick_string(&a.uom, &b.uom, &path("uom")),
            categories: taxonomy::merge_categories(&a.categories, &b.categories),
            is_core,
            embedding: None,
        }
    }

    // ── Totals ────────────────────────────────────────────────────────────

    fn merge_totals(
        &mut self,
        a: &InvoiceTotals,
        b: &InvoiceTotals,
        lines: &[LineItem],
    ) -> InvoiceTotals {
        let line_sum: f64 = lines.iter().filter_map(|l| l.line_total).sum();
        let has_line_sum = lines.iter().any(|l| l.line_total.is_some());
        let line_sum = has_line_sum.then_some(line_sum);

        let anchors = self.anchors;
        let subtotal = self.pick_amount(
            a.subtotal,
            b.subtotal,
            anchors.subtotal,
            line_sum,
            "totals.subtotal",
        );
        let tax = self.pick_amount(a.tax, b.tax, anchors.tax, None, "totals.tax");
        let tax_rate = self.pick_amount(a.tax_rate, b.tax_rate, None, None, "totals.tax_rate");
        let shipping = self.pick_amount(
            a.shipping,
            b.shipping,
            anchors.shipping,
            None,
            "totals.shipping",
        );
        let core_charges = self.pick_amount(
            a.core_charges,
            b.core_charges,
            None,
            None,
            "totals.core_charges",
        );
        let discounts =
            self.pick_amount(a.discounts, b.discounts, None, None, "totals.discounts");
        let fees = self.pick_amount(a.fees, b.fees, None, None, "totals.fees");

        // grand_total ≈ subtotal + tax + shipping + fees − discounts, with
        // the line sum standing in when no subtotal was stated.
        let recomputed_grand = subtotal.or(line_sum).map(|base| {
            base + tax.unwrap_or(0.0) + shipping.unwrap_or(0.0) + fees.unwrap_or(0.0)
                - discounts.unwrap_or(0.0)
        });

        let grand_total = self.pick_amount(
            a.grand_total,
            b.grand_total,
            anchors.grand_total,
            recomputed_grand,
            "totals.grand_total",
        );

        if let (Some(stated), Some(recomputed)) = (grand_total, recomputed_grand) {
            if (stated - recomputed).abs() > self.config.totals_tolerance {
                self.note_gap((stated - recomputed).abs());
                self.warnings.push(format!(
                    "totals.grand_total: stated {stated:.2}, recomputed {recomputed:.2}"
                ));
            }
        }

        let amount_paid = self.pick_amount(
            a.amount_paid,
            b.amount_paid,
            None,
            None,
            "totals.amount_paid",
        );
        let balance_due = self.pick_amount(
            a.balance_due,
            b.balance_due,
            None,
            None,
            "totals.balance_due",
        );

        InvoiceTotals {
            subtotal,
            tax,
            tax_rate,
            shipping,
            core_charges,
            discounts,
            fees,
            grand_total,
            amount_paid,
            balance_due,
        }
    }

    // ── Confidence ────────────────────────────────────────────────────────

    fn confidence(&self) -> Confidence {
        let c = self.config;
        if self.review.is_empty() && self.max_gap <= c.totals_tolerance {
            Confidence::High
        } else if self.review.len() <= c.max_minor_review_fields
            && self.max_gap <= c.major_mismatch_threshold
        {
            Confidence::Medium
        } else {
            Confidence::Low
        }
    }
}

// ── Line pairing ─────────────────────────────────────────────────────────

/// Pair lines across the two candidates: normalized part number first, then
/// positional for whatever remains. Order follows pass A (extraction order is
/// not guaranteed stable across passes); B-only lines are appended.
fn pair_lines<'a>(
    a: &'a [LineItem],
    b: &'a [LineItem],
) -> Vec<(Option<&'a LineItem>, Option<&'a LineItem>)> {
    let mut b_used = vec![false; b.len()];
    let mut pairs: Vec<(Option<&LineItem>, Option<&LineItem>)> = Vec::with_capacity(a.len());

    for line_a in a {
        let key_a = line_a.part_number.as_deref().and_then(clean_part_number);
        let matched = key_a.and_then(|key| {
            (0..b.len()).find(|&j| {
                !b_used[j]
                    && b[j].part_number.as_deref().and_then(clean_part_number).as_deref()
                        == Some(key.as_str())
            })
        });
        match matched {
            Some(j) => {
                b_used[j] = true;
                pairs.push((Some(line_a), Some(&b[j])));
            }
            None => pairs.push((Some(line_a), None)),
        }
    }

    // Positional fallback: fill A-only slots with leftover B lines in order.
    let mut leftover: std::collections::VecDeque<usize> = b_used
        .iter()
        .enumerate()
        .filter(|(_, used)| !**used)
        .map(|(j, _)| j)
        .collect();
    for pair in pairs.iter_mut() {
        if pair.1.is_none() {
            if let Some(j) = leftover.pop_front() {
                pair.1 = Some(&b[j]);
            }
        }
    }
    for j in leftover {
        pairs.push((None, Some(&b[j])));
    }
    pairs
}
