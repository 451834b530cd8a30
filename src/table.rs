//! Tabular projection of the flat entry list.
//!
//! One row per entry with columns `entry, idx, idx_text, page, notes`,
//! optionally preceded by constant `pubkey` and `version` columns.
//! Tables written here can be read back with [`read_delimited`].

use crate::builder::IndexEntry;
use crate::error::{IndexError, Result};
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};

/// A single table row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRow {
    pub pubkey: Option<String>,
    pub version: Option<String>,
    /// Entry label.
    pub entry: String,
    /// Numeric path joined by `.`.
    pub idx: String,
    /// Label path joined by the index delimiter.
    pub idx_text: String,
    /// Raw page specification.
    pub page: Option<String>,
    pub notes: Option<String>,
}

/// Renders entries as rows.
#[derive(Debug, Clone)]
pub struct TableProjector {
    index_delimiter: String,
    pubkey: Option<String>,
    version: Option<String>,
}

impl Default for TableProjector {
    fn default() -> Self {
        Self::new("|")
    }
}

impl TableProjector {
    /// Create a projector joining label paths with `index_delimiter`.
    pub fn new(index_delimiter: impl Into<String>) -> Self {
        Self {
            index_delimiter: index_delimiter.into(),
            pubkey: None,
            version: None,
        }
    }

    /// Add a constant `pubkey` column.
    pub fn with_pubkey(mut self, pubkey: Option<String>) -> Self {
        self.pubkey = pubkey;
        self
    }

    /// Add a constant `version` column.
    pub fn with_version(mut self, version: Option<String>) -> Self {
        self.version = version;
        self
    }

    /// Column names in output order.
    pub fn headers(&self) -> Vec<&'static str> {
        let mut headers = Vec::with_capacity(7);
        if self.pubkey.is_some() {
            headers.push("pubkey");
        }
        if self.version.is_some() {
            headers.push("version");
        }
        headers.extend(["entry", "idx", "idx_text", "page", "notes"]);
        headers
    }

    /// Project every entry to a row.
    pub fn project(&self, entries: &[IndexEntry]) -> Vec<TableRow> {
        entries
            .iter()
            .map(|entry| TableRow {
                pubkey: self.pubkey.clone(),
                version: self.version.clone(),
                entry: entry.text.clone(),
                idx: entry.idx(),
                idx_text: entry.idx_text(&self.index_delimiter),
                page: entry.pages.clone(),
                notes: entry.note.clone(),
            })
            .collect()
    }

    /// Write a header row and `rows` as delimited text.
    pub fn write_delimited<W: Write>(
        &self,
        rows: &[TableRow],
        writer: W,
        delimiter: u8,
    ) -> Result<()> {
        let mut csv_writer = csv::WriterBuilder::new()
            .delimiter(delimiter)
            .from_writer(writer);

        csv_writer.write_record(self.headers())?;
        for row in rows {
            let mut record: Vec<&str> = Vec::with_capacity(7);
            if self.pubkey.is_some() {
                record.push(row.pubkey.as_deref().unwrap_or_default());
            }
            if self.version.is_some() {
                record.push(row.version.as_deref().unwrap_or_default());
            }
            record.extend([
                row.entry.as_str(),
                row.idx.as_str(),
                row.idx_text.as_str(),
                row.page.as_deref().unwrap_or_default(),
                row.notes.as_deref().unwrap_or_default(),
            ]);
            csv_writer.write_record(&record)?;
        }

        csv_writer
            .flush()
            .map_err(|e| IndexError::Serialization(e.to_string()))?;
        Ok(())
    }
}

/// Read rows from delimited text with a header row.
///
/// Columns are matched by header name, so the `pubkey` and `version`
/// columns may be absent; empty fields read as `None`.
pub fn read_delimited<R: Read>(reader: R, delimiter: u8) -> Result<Vec<TableRow>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .from_reader(reader);

    let rows = csv_reader
        .deserialize()
        .collect::<std::result::Result<Vec<TableRow>, csv::Error>>()?;
    Ok(rows)
}
