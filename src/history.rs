//! Upload history: payload model and table rendering.

use crate::progress::format_bytes;
use crate::wire::{lenient_u64, php_map};
use chrono::DateTime;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};

const DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S +0000";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct History {
    #[serde(default, deserialize_with = "php_map")]
    pub items: BTreeMap<String, HistoryItem>,
    #[serde(default, deserialize_with = "php_map")]
    pub multipaste_items: BTreeMap<String, MultipasteItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HistoryItem {
    pub id: String,
    pub filename: String,
    #[serde(default)]
    pub mimetype: String,
    #[serde(deserialize_with = "lenient_u64")]
    pub date: u64,
    #[serde(default)]
    pub hash: String,
    #[serde(deserialize_with = "lenient_u64")]
    pub filesize: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MultipasteItem {
    pub url_id: String,
    #[serde(deserialize_with = "lenient_u64")]
    pub date: u64,
    #[serde(default, deserialize_with = "php_map")]
    pub items: BTreeMap<String, serde_json::Value>,
}

/// One printable history row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub id: String,
    pub filename: String,
    pub mimetype: String,
    pub date: u64,
    pub hash: String,
    pub size: u64,
}

impl History {
    /// Uploads and multipastes merged and sorted by date.
    pub fn rows(&self) -> Vec<Row> {
        let mut rows: Vec<Row> = self
            .items
            .values()
            .map(|item| Row {
                id: item.id.clone(),
                filename: item.filename.clone(),
                mimetype: item.mimetype.clone(),
                date: item.date,
                hash: item.hash.clone(),
                size: item.filesize,
            })
            .collect();

        for multipaste in self.multipaste_items.values() {
            let size = multipaste
                .items
                .keys()
                .filter_map(|id| self.items.get(id))
                .map(|item| item.filesize)
                .sum();
            rows.push(Row {
                id: multipaste.url_id.clone(),
                filename: format!("{} file(s)", multipaste.items.len()),
                mimetype: String::new(),
                date: multipaste.date,
                hash: String::new(),
                size,
            });
        }

        rows.sort_by_key(|row| row.date);
        rows
    }

    /// Size of all uploads, counting identical content once.
    pub fn distinct_size(&self) -> u64 {
        let unique: HashMap<&str, u64> = self
            .items
            .values()
            .map(|item| (item.hash.as_str(), item.filesize))
            .collect();
        unique.values().sum()
    }

    /// Full report: table followed by totals.
    pub fn render(&self) -> String {
        let mut table = vec![["ID", "Filename", "Mimetype", "Date", "Hash", "Size"].map(String::from)];
        table.extend(self.rows().into_iter().map(|row| {
            [
                row.id,
                row.filename,
                row.mimetype,
                format_date(row.date),
                row.hash,
                format_bytes(row.size as f64),
            ]
        }));

        let mut out = render_table(&table);
        out.push_str("\n\n");
        out.push_str(&format!(
            "Total sum of your distinct uploads: {}\n",
            format_bytes(self.distinct_size() as f64)
        ));
        out.push_str(&format!(
            "Total number of uploads (excluding multipastes): {}\n",
            self.items.len()
        ));
        out.push_str(&format!(
            "Total number of multipastes: {}\n",
            self.multipaste_items.len()
        ));
        out
    }
}

fn format_date(timestamp: u64) -> String {
    i64::try_from(timestamp)
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .map(|date| date.format(DATE_FORMAT).to_string())
        .unwrap_or_else(|| timestamp.to_string())
}

fn render_table<const N: usize>(rows: &[[String; N]]) -> String {
    let mut widths = [0usize; N];
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    for row in rows {
        let cells: Vec<String> = row
            .iter()
            .zip(widths)
            .map(|(cell, width)| format!("{:width$}", cell, width = width))
            .collect();
        out.push_str("| ");
        out.push_str(&cells.join(" | "));
        out.push_str(" |\n");
    }
    out
}
