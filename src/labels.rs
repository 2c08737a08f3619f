//! Static code tables for event type and status labels
//!
//! Numeric codes are looked up in the numeric tables; alphabetic codes the portal
//! sometimes sends instead are looked up case-insensitively in the symbolic tables.
//! Anything unmapped renders as its literal value; an absent code renders as `N/A`.

/// Label shown when a record carries no code at all
pub const NOT_AVAILABLE: &str = "N/A";

const EVENT_TYPES: &[(u32, &str)] = &[
    (1, "Sampling"),
    (2, "Demo/Sampling"),
    (3, "Cooking Demo"),
    (4, "Product Demo"),
    (5, "Educational"),
    (6, "Seasonal"),
    (7, "Holiday"),
    (8, "Back to School"),
    (9, "Health & Wellness"),
    (10, "New Product Launch"),
    (45, "Food Demo/Sampling"),
    (46, "Beverage Demo"),
    (47, "Product Demonstration"),
    (48, "Special Event"),
    (49, "Promotional Event"),
    (50, "Tasting Event"),
];

const EVENT_TYPE_SYMBOLS: &[(&str, &str)] = &[
    ("DEMO", "Demonstration"),
    ("SAMP", "Sampling"),
    ("COOK", "Cooking Demo"),
    ("SPEC", "Special Event"),
    ("PROM", "Promotion"),
    ("DISP", "Display"),
    ("TAST", "Tasting"),
    ("EDUC", "Educational"),
    ("SEAS", "Seasonal"),
    ("NEW", "New Product"),
    ("HOLI", "Holiday"),
    ("BACK", "Back to School"),
    ("GRIL", "Grilling"),
    ("HEAL", "Health & Wellness"),
];

const EVENT_STATUSES: &[(u32, &str)] = &[
    (1, "Pending"),
    (2, "Active/Scheduled"),
    (3, "In Progress"),
    (4, "Completed"),
    (5, "Cancelled"),
    (6, "On Hold"),
    (7, "Under Review"),
    (8, "Approved"),
    (9, "Rejected"),
    (10, "Suspended"),
];

const EVENT_STATUS_SYMBOLS: &[(&str, &str)] = &[
    ("ACTV", "Active"),
    ("COMP", "Completed"),
    ("CANC", "Cancelled"),
    ("PEND", "Pending"),
    ("HOLD", "On Hold"),
    ("PREP", "In Preparation"),
    ("SCHED", "Scheduled"),
    ("INPR", "In Progress"),
    ("SUSP", "Suspended"),
    ("CLOS", "Closed"),
    ("APPR", "Approved"),
    ("REJE", "Rejected"),
    ("SUBM", "Submitted"),
    ("REVI", "Under Review"),
];

/// Event type codes that exist in the numeric table, in ascending order
pub fn known_event_types() -> impl Iterator<Item = u32> {
    EVENT_TYPES.iter().map(|(code, _)| *code)
}

/// Label for an event type given its numeric code or, failing that, its raw text
pub fn event_type_label(numeric: Option<u32>, raw: Option<&str>) -> String {
    label(numeric, raw, EVENT_TYPES, EVENT_TYPE_SYMBOLS)
}

/// Label for an event status given its numeric code or, failing that, its raw text
pub fn event_status_label(numeric: Option<u32>, raw: Option<&str>) -> String {
    label(numeric, raw, EVENT_STATUSES, EVENT_STATUS_SYMBOLS)
}

fn label(
    numeric: Option<u32>,
    raw: Option<&str>,
    by_number: &[(u32, &'static str)],
    by_symbol: &[(&str, &'static str)],
) -> String {
    if let Some(code) = numeric {
        return by_number
            .iter()
            .find(|(k, _)| *k == code)
            .map(|(_, v)| (*v).to_string())
            .unwrap_or_else(|| code.to_string());
    }

    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        Some(text) => by_symbol
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(text))
            .map(|(_, v)| (*v).to_string())
            .unwrap_or_else(|| text.to_string()),
        None => NOT_AVAILABLE.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_codes_translate() {
        assert_eq!(event_type_label(Some(45), None), "Food Demo/Sampling");
        assert_eq!(event_status_label(Some(2), None), "Active/Scheduled");
        assert_eq!(event_status_label(Some(10), None), "Suspended");
    }

    #[test]
    fn unmapped_numeric_code_renders_literal_value() {
        assert_eq!(event_type_label(Some(9999), None), "9999");
        assert_eq!(event_status_label(Some(0), None), "0");
    }

    #[test]
    fn symbolic_codes_are_case_insensitive() {
        assert_eq!(event_type_label(None, Some("demo")), "Demonstration");
        assert_eq!(event_type_label(None, Some(" GRIL ")), "Grilling");
        assert_eq!(event_status_label(None, Some("Sched")), "Scheduled");
    }

    #[test]
    fn unknown_symbol_renders_as_given() {
        assert_eq!(event_type_label(None, Some("ZZZ")), "ZZZ");
    }

    #[test]
    fn absent_code_renders_not_available() {
        assert_eq!(event_type_label(None, None), NOT_AVAILABLE);
        assert_eq!(event_status_label(None, Some("  ")), NOT_AVAILABLE);
    }

    #[test]
    fn known_types_include_browse_range() {
        let types: Vec<u32> = known_event_types().collect();
        assert!(types.contains(&1));
        assert!(types.contains(&45));
        assert!(types.windows(2).all(|w| w[0] < w[1]));
    }
}
