use std::borrow::Cow;

use comfy_table::{Table, presets::ASCII_BORDERS_ONLY_CONDENSED};

use super::Listing;

/// Maximum width for free-text columns
const MAX_TEXT_COLUMN_WIDTH: usize = 80;

/// Columns that should have width limits in table mode
const WIDE_COLUMNS: &[&str] = &["error"];

/// Truncate a string to max_len chars, adding "..." if truncated
fn truncate_value(s: &str, max_len: usize) -> Cow<'_, str> {
    if s.chars().count() <= max_len {
        Cow::Borrowed(s)
    } else {
        let truncated: String = s.chars().take(max_len.saturating_sub(3)).collect();
        Cow::Owned(format!("{}...", truncated))
    }
}

pub struct TableFormatter;

impl TableFormatter {
    pub fn format(listing: &Listing, no_headers: bool) -> String {
        if listing.rows.is_empty() {
            return "(0 clusters)".to_string();
        }

        let mut table = Table::new();
        table.load_preset(ASCII_BORDERS_ONLY_CONDENSED);

        let truncate: Vec<bool> = listing
            .columns
            .iter()
            .map(|col| WIDE_COLUMNS.contains(&col.as_str()))
            .collect();

        if !no_headers {
            table.set_header(&listing.columns);
        }

        for row in &listing.rows {
            let cells: Vec<Cow<'_, str>> = row
                .iter()
                .enumerate()
                .map(|(idx, val)| {
                    if truncate.get(idx).copied().unwrap_or(false) {
                        truncate_value(val, MAX_TEXT_COLUMN_WIDTH)
                    } else {
                        Cow::Borrowed(val.as_str())
                    }
                })
                .collect();
            table.add_row(cells);
        }

        format!("{}\n({} clusters)", table, listing.rows.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_value_short() {
        let result = truncate_value("hello", 10);
        assert_eq!(result, "hello");
        assert!(matches!(result, Cow::Borrowed(_)));
    }

    #[test]
    fn test_truncate_value_too_long() {
        let result = truncate_value("this is a very long string that needs truncation", 20);
        assert!(result.ends_with("..."));
        assert_eq!(result.chars().count(), 20);
        assert!(matches!(result, Cow::Owned(_)));
    }

    #[test]
    fn test_truncate_value_unicode() {
        let result = truncate_value("集群连接失败集群连接失败集群连接失败", 8);
        assert!(result.chars().count() <= 8);
        assert!(result.ends_with("..."));
    }

    #[test]
    fn test_error_column_truncated() {
        let mut listing = Listing::new(&["cluster", "error"]);
        listing.push(vec!["c1".to_string(), "x".repeat(120)]);
        let output = TableFormatter::format(&listing, false);
        assert!(!output.contains(&"x".repeat(120)));
        assert!(output.contains("..."));
        assert!(output.ends_with("(1 clusters)"));
    }

    #[test]
    fn test_other_columns_untouched() {
        let mut listing = Listing::new(&["cluster", "api_server"]);
        listing.push(vec!["c1".to_string(), "h".repeat(120)]);
        let output = TableFormatter::format(&listing, false);
        assert!(output.contains(&"h".repeat(120)));
    }

    #[test]
    fn test_empty_listing() {
        let listing = Listing::new(&["cluster"]);
        assert_eq!(TableFormatter::format(&listing, false), "(0 clusters)");
    }
}
