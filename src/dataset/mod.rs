//! In-memory post datasets.
//!
//! A [`Dataset`] is the parsed CSV table bound to a session. It is
//! immutable once loaded and shared behind an `Arc`.

pub mod loader;

pub use loader::{DatasetLoader, LoadError};

use serde::{Deserialize, Serialize};

/// Number of rows shown in a preview.
pub const PREVIEW_ROWS: usize = 5;

/// A parsed CSV table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dataset {
    /// File name the data came from.
    source: String,
    /// Content fingerprint, used as the dataset identity.
    fingerprint: u64,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

/// Metadata and leading rows for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetPreview {
    pub file_name: String,
    pub row_count: usize,
    pub column_count: usize,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Dataset {
    pub(crate) fn new(
        source: String,
        fingerprint: u64,
        headers: Vec<String>,
        rows: Vec<Vec<String>>,
    ) -> Self {
        Self {
            source,
            fingerprint,
            headers,
            rows,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn fingerprint(&self) -> u64 {
        self.fingerprint
    }

    pub fn columns(&self) -> &[String] {
        &self.headers
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.headers.len()
    }

    /// Preview with the first `n` rows.
    pub fn preview(&self, n: usize) -> DatasetPreview {
        DatasetPreview {
            file_name: self.source.clone(),
            row_count: self.row_count(),
            column_count: self.column_count(),
            columns: self.headers.clone(),
            rows: self.rows.iter().take(n).cloned().collect(),
        }
    }

    /// Render the table back to CSV for an agent prompt.
    ///
    /// At most `max_rows` data rows are written. When rows are dropped a
    /// trailing note says how many were omitted.
    pub fn to_csv_context(&self, max_rows: usize) -> Result<String, csv::Error> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(&self.headers)?;
        for row in self.rows.iter().take(max_rows) {
            writer.write_record(row)?;
        }

        let bytes = writer
            .into_inner()
            .map_err(|e| csv::Error::from(e.into_error()))?;
        let mut text = String::from_utf8_lossy(&bytes).into_owned();

        if self.rows.len() > max_rows {
            text.push_str(&format!(
                "... ({} more rows omitted)\n",
                self.rows.len() - max_rows
            ));
        }

        Ok(text)
    }
}
