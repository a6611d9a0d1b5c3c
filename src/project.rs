//! Persistence-ready projection.
//!
//! Pure field mapping from the reconciled record into the shape a repair-shop
//! database expects — no extraction or reconciliation logic lives here. The
//! only derivations are string normalizations: a cleaned part-number key, a
//! 3-character line code from the brand, and the first taxonomy category as
//! the line's primary category.

use crate::record::{InvoiceRecord, LineItem};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static RE_NON_ALNUM: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^A-Za-z0-9]").unwrap());

/// Normalize a part number to its alphanumeric uppercase key
/// (`"brk-123"` → `"BRK123"`). Idempotent; `None` when nothing survives.
pub fn clean_part_number(part_number: &str) -> Option<String> {
    let cleaned = RE_NON_ALNUM.replace_all(part_number, "").to_uppercase();
    (!cleaned.is_empty()).then_some(cleaned)
}

/// Derive a line code from the first 3 normalized characters of the brand.
pub fn line_code_from_brand(brand: &str) -> Option<String> {
    let cleaned = RE_NON_ALNUM.replace_all(brand, "").to_uppercase();
    if cleaned.is_empty() {
        return None;
    }
    Some(cleaned.chars().take(3).collect())
}

/// The first category, which reconciliation guarantees is a taxonomy member.
pub fn primary_category(categories: &[String]) -> Option<String> {
    categories.first().cloned()
}

/// Repair-order head row.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RepairOrder {
    pub shop_id: Option<String>,
    /// Invoice number, falling back to the PO number.
    pub ro_number: Option<String>,
    pub vendor_name: Option<String>,
    pub invoice_date: Option<String>,
    pub total_spend: Option<f64>,
    pub status: String,
    pub file_path: String,
    pub vehicle_year: Option<i32>,
    pub vehicle_make: Option<String>,
    pub vehicle_model: Option<String>,
    pub vehicle_vin: Option<String>,
}

/// One persistence-ready line row.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DbLineItem {
    /// Set after the repair order row is inserted.
    pub ro_id: Option<i64>,
    pub shop_id: Option<String>,
    pub part_number: Option<String>,
    pub clean_part_number: Option<String>,
    pub line_code: Option<String>,
    pub description: Option<String>,
    pub quantity: Option<f64>,
    pub unit_cost: Option<f64>,
    pub is_core: Option<bool>,
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    // Extras carried in case the client persists them separately.
    pub core_charge: Option<f64>,
    pub line_discount: Option<f64>,
    pub line_total: Option<f64>,
    pub tax_rate: Option<f64>,
    pub taxability: Option<String>,
    pub uom: Option<String>,
    pub brand: Option<String>,
}

/// The database-ready projection of one reconciled invoice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbReady {
    pub repair_order: RepairOrder,
    pub line_items: Vec<DbLineItem>,
}

/// Map a reconciled record into its database-ready shape.
pub fn to_db_shape(
    source_url: &str,
    record: &InvoiceRecord,
    shop_id: Option<&str>,
) -> DbReady {
    let header = &record.header;
    let repair_order = RepairOrder {
        shop_id: shop_id.map(str::to_string),
        ro_number: header
            .invoice_number
            .clone()
            .or_else(|| header.po_number.clone()),
        vendor_name: header.vendor_name.clone(),
        invoice_date: header.invoice_date.clone(),
        total_spend: record.totals.grand_total,
        status: "processing".to_string(),
        file_path: source_url.to_string(),
        vehicle_year: None,
        vehicle_make: None,
        vehicle_model: None,
        vehicle_vin: None,
    };

    let line_items = record
        .line_items
        .iter()
        .map(|line| map_line(line, shop_id))
        .collect();

    DbReady {
        repair_order,
        line_items,
    }
}

fn map_line(line: &LineItem, shop_id: Option<&str>) -> DbLineItem {
    DbLineItem {
        ro_id: None,
        shop_id: shop_id.map(str::to_string),
        part_number: line.part_number.clone(),
        clean_part_number: line.part_number.as_deref().and_then(clean_part_number),
        line_code: line.brand.as_deref().and_then(line_code_from_brand),
        description: line.description.clone(),
        quantity: line.quantity,
        unit_cost: line.unit_price,
        is_core: line.is_core,
        category: primary_category(&line.categories),
        embedding: line.embedding.clone(),
        core_charge: line.core_charge,
        line_discount: line.line_discount,
        line_total: line.line_total,
        tax_rate: line.tax_rate,
        taxability: line.taxability.clone(),
        uom: line.uom.clone(),
        brand: line.brand.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::InvoiceHeader;

    #[test]
    fn clean_part_number_strips_and_uppercases() {
        assert_eq!(clean_part_number("brk-123").as_deref(), Some("BRK123"));
        assert_eq!(clean_part_number(" AC/DELCO #41-110 ").as_deref(), Some("ACDELCO41110"));
        assert_eq!(clean_part_number("---"), None);
        assert_eq!(clean_part_number(""), None);
    }

    #[test]
    fn clean_part_number_is_idempotent() {
        let once = clean_part_number("BRK-123").unwrap();
        assert_eq!(clean_part_number(&once).as_deref(), Some(once.as_str()));
    }

    #[test]
    fn line_code_takes_first_three_brand_chars() {
        assert_eq!(line_code_from_brand("ACME Parts").as_deref(), Some("ACM"));
        assert_eq!(line_code_from_brand("3M").as_deref(), Some("3M"));
        assert_eq!(line_code_from_brand("  ").is_none(), true);
    }

    #[test]
    fn ro_number_falls_back_to_po() {
        let record = InvoiceRecord {
            header: InvoiceHeader {
                po_number: Some("PO-77".into()),
                ..Default::default()
            },
            ..Default::default()
        };
        let db = to_db_shape("https://example.com/inv.pdf", &record, Some("shop-1"));
        assert_eq!(db.repair_order.ro_number.as_deref(), Some("PO-77"));
        assert_eq!(db.repair_order.status, "processing");
        assert_eq!(db.repair_order.file_path, "https://example.com/inv.pdf");
    }

    #[test]
    fn lines_map_with_derived_fields() {
        let record = InvoiceRecord {
            line_items: vec![LineItem {
                part_number: Some("abc-123".into()),
                brand: Some("ACME Parts".into()),
                unit_price: Some(10.0),
                categories: vec!["Brakes".into(), "Accessories".into()],
                ..Default::default()
            }],
            ..Default::default()
        };
        let db = to_db_shape("u", &record, None);
        let line = &db.line_items[0];
        assert_eq!(line.clean_part_number.as_deref(), Some("ABC123"));
        assert_eq!(line.line_code.as_deref(), Some("ACM"));
        assert_eq!(line.category.as_deref(), Some("Brakes"));
        assert_eq!(line.unit_cost, Some(10.0));
        assert!(line.ro_id.is_none());
    }
}
