//! Fixed category taxonomy for line-item classification.
//!
//! A closed set: every extraction stage is constrained to select zero or more
//! of these labels per line, and reconciliation drops anything outside the
//! set rather than erroring. Keeping the list as a const slice (not config)
//! is intentional — downstream category columns are schema'd against exactly
//! these strings.

/// The closed set of line-item category labels.
pub const CATEGORIES: [&str; 14] = [
    "Brakes",
    "Suspension & Steering",
    "Engine Components",
    "Ignition & Electrical",
    "Filters",
    "Fluids & Chemicals",
    "Heating & Cooling",
    "Exhaust",
    "Fuel System",
    "Drivetrain",
    "Body & Lighting",
    "Tires & Wheels",
    "Tools & Shop Supplies",
    "Accessories",
];

/// Exact-match membership test.
pub fn is_member(label: &str) -> bool {
    CATEGORIES.contains(&label)
}

/// Merge two candidate category lists into one ordered, deduplicated list
/// containing only taxonomy members.
///
/// Order is first-seen: everything valid from `a` in order, then anything
/// valid from `b` not already present. Unknown labels are dropped, not
/// errored — provider output is the least-trustworthy input in the system.
pub fn merge_categories(a: &[String], b: &[String]) -> Vec<String> {
    let mut merged: Vec<String> = Vec::with_capacity(a.len() + b.len());
    for label in a.iter().chain(b.iter()) {
        if is_member(label) && !merged.iter().any(|m| m == label) {
            merged.push(label.clone());
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn membership_is_exact() {
        assert!(is_member("Brakes"));
        assert!(is_member("Tools & Shop Supplies"));
        assert!(!is_member("brakes")); // case matters
        assert!(!is_member("Upholstery"));
    }

    #[test]
    fn merge_unions_and_dedups_in_order() {
        let a = vec!["Brakes".to_string(), "Filters".to_string()];
        let b = vec!["Filters".to_string(), "Exhaust".to_string()];
        assert_eq!(merge_categories(&a, &b), vec!["Brakes", "Filters", "Exhaust"]);
    }

    #[test]
    fn merge_drops_unknown_labels() {
        let a = vec!["Upholstery".to_string(), "Brakes".to_string()];
        let b = vec!["Seat Covers".to_string()];
        assert_eq!(merge_categories(&a, &b), vec!["Brakes"]);
    }

    #[test]
    fn merge_of_empty_lists_is_empty() {
        assert!(merge_categories(&[], &[]).is_empty());
    }
}
