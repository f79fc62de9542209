//! Instruction text sent with every page image.
//!
//! Callers can replace the rules block via
//! [`crate::config::ExtractionConfig::system_prompt`]; the page-position
//! preamble is always prepended so the model knows where it is in the document.

/// Default extraction rules for an invoice / packing-list table page.
pub const DEFAULT_EXTRACTION_RULES: &str = r#"This page contains a table with product information. Maintain consistent column interpretation across all pages.

Important Rules:
1. The table structure is FIXED across all pages - every row must have the same column structure
2. Each row represents a product entry with specific details
3. Headers may or may not be repeated on each page - ignore headers if present and focus on data rows
4. Empty cells should be preserved to maintain table structure

Extract ONLY the following fields from each row, maintaining exact column order:
1. Commodity Name: The product description/name (required)
2. Qty: The quantity value (default to 1 if not found)
3. UOM: Unit of Measure (default to 'BOX' if not found)

Return ONLY a JSON array of objects with these exact fields: 'Commodity Name', 'Qty', 'UOM'.
Each object must have all three fields, even if using default values.
Do not include any commentary, headers, or additional information.

Example format:
[
    {"Commodity Name": "Product A", "Qty": 10, "UOM": "BOX"},
    {"Commodity Name": "Product B", "Qty": 1, "UOM": "BOX"}
]"#;

/// Build the full instruction for one page.
pub fn page_prompt(page_num: usize, total_pages: usize, rules: Option<&str>) -> String {
    format!(
        "You are processing page {page_num} of {total_pages} from a packing list or invoice document.\n{}",
        rules.unwrap_or(DEFAULT_EXTRACTION_RULES)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_mentions_position_and_columns() {
        let p = page_prompt(2, 7, None);
        assert!(p.starts_with("You are processing page 2 of 7"));
        for col in crate::item::COLUMNS {
            assert!(p.contains(col), "prompt should name column {col}");
        }
        assert!(p.contains("default to 1"));
        assert!(p.contains("'BOX'"));
    }

    #[test]
    fn custom_rules_replace_default_block() {
        let p = page_prompt(1, 1, Some("Only JSON please."));
        assert!(p.ends_with("Only JSON please."));
        assert!(!p.contains("Important Rules"));
    }
}
