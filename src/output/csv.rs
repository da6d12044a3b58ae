use super::Listing;

pub struct CsvFormatter;

impl CsvFormatter {
    pub fn format(listing: &Listing, no_headers: bool) -> String {
        let mut lines = Vec::new();

        if !no_headers {
            lines.push(listing.columns.join(","));
        }

        for row in &listing.rows {
            let escaped: Vec<String> = row.iter().map(|val| escape(val)).collect();
            lines.push(escaped.join(","));
        }

        lines.join("\n")
    }
}

fn escape(val: &str) -> String {
    if val.contains(',') || val.contains('"') || val.contains('\n') {
        format!("\"{}\"", val.replace('"', "\"\""))
    } else {
        val.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_csv_quotes_commas() {
        let mut listing = Listing::new(&["cluster", "area"]);
        listing.push(vec!["c1".to_string(), "bj,north".to_string()]);
        let out = CsvFormatter::format(&listing, false);
        assert_eq!(out, "cluster,area\nc1,\"bj,north\"");
    }

    #[test]
    fn test_csv_no_headers() {
        let mut listing = Listing::new(&["cluster"]);
        listing.push(vec!["c1".to_string()]);
        assert_eq!(CsvFormatter::format(&listing, true), "c1");
    }
}
