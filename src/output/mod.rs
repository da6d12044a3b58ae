// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Rendering of cluster listings and resolution results

mod csv;
mod json;
mod table;
mod yaml;

pub use csv::CsvFormatter;
pub use json::JsonFormatter;
pub use table::TableFormatter;
pub use yaml::YamlFormatter;

use crate::cli::OutputFormat;
use paas_router::cluster::{ClusterRecord, api_server_url};

#[derive(Debug, Clone)]
pub struct Listing {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Listing {
    pub fn new(columns: &[&str]) -> Self {
        Self {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn push(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    pub fn format(&self, format: &OutputFormat, no_headers: bool) -> String {
        match format {
            OutputFormat::Table => TableFormatter::format(self, no_headers),
            OutputFormat::Json => JsonFormatter::format(self),
            OutputFormat::Csv => CsvFormatter::format(self, no_headers),
            OutputFormat::Yaml => YamlFormatter::format(self),
        }
    }

    /// One JSON object per row, keyed by column name
    pub fn to_json_rows(&self) -> Vec<serde_json::Map<String, serde_json::Value>> {
        self.rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .zip(row)
                    .map(|(col, val)| (col.clone(), serde_json::Value::String(val.clone())))
                    .collect()
            })
            .collect()
    }
}

/// Registry records, with the derived API server URL
pub fn clusters_listing<'a>(records: impl IntoIterator<Item = &'a ClusterRecord>) -> Listing {
    let mut listing = Listing::new(&["cluster", "area", "host", "port", "api_server"]);
    for record in records {
        listing.push(vec![
            record.id.clone(),
            record.area.clone(),
            record.load_balancer_host.clone(),
            record.load_balancer_port.clone(),
            api_server_url(record),
        ]);
    }
    listing
}
