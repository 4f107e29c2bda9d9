//! CSV bulk loader.
//!
//! Feeds a CSV file into an existing table's heap and index manager:
//! header validation against the schema, per-row conversion through the
//! column types, and row-level error accumulation (the load continues past
//! bad rows; up to [`MAX_SURFACED_ERRORS`] messages are reported back).
//!
//! The table must already exist — `CREATE TABLE ... FROM FILE` creates it
//! first and then delegates here.

#[cfg(test)]
mod tests;

use std::io;
use std::path::Path;

use thiserror::Error;
use tracing::{debug, warn};

use crate::catalog::Table;
use crate::heap::{HeapError, RecordFile};
use crate::index::manager::IndexManager;
use crate::schema::{Record, value_from_text};

/// Row errors surfaced to the caller; the rest are only counted.
pub const MAX_SURFACED_ERRORS: usize = 10;

/// Errors that abort a CSV load outright (row-level conversion failures
/// do not — they are accumulated in the report).
#[derive(Debug, Error)]
pub enum CsvError {
    /// The file could not be opened or read.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Malformed CSV structure.
    #[error("CSV error: {0}")]
    Malformed(#[from] csv::Error),

    /// A column of the table is missing from the CSV header.
    #[error("CSV header is missing table columns: {0}")]
    MissingColumns(String),

    /// Heap failure while appending rows.
    #[error("heap error: {0}")]
    Heap(#[from] HeapError),
}

/// Summary of one bulk load.
#[derive(Debug)]
pub struct CsvLoadReport {
    /// Data rows seen in the file.
    pub total_rows: usize,
    /// Rows inserted into the heap and indices.
    pub inserted_count: usize,
    /// Rows that failed conversion or insertion.
    pub error_count: usize,
    /// First [`MAX_SURFACED_ERRORS`] row-level error messages.
    pub errors: Vec<String>,
}

/// Load `csv_path` into the table's heap and indices.
pub fn load_csv(
    csv_path: impl AsRef<Path>,
    table: &Table,
    heap: &mut RecordFile,
    indices: &mut IndexManager,
) -> Result<CsvLoadReport, CsvError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(csv_path.as_ref())?;

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let missing: Vec<&str> = table
        .columns
        .iter()
        .map(|c| c.name.as_str())
        .filter(|name| !headers.iter().any(|h| h == name))
        .collect();
    if !missing.is_empty() {
        return Err(CsvError::MissingColumns(missing.join(", ")));
    }
    for extra in headers
        .iter()
        .filter(|h| !table.columns.iter().any(|c| &c.name == *h))
    {
        warn!(column = %extra, "CSV column has no table counterpart, ignoring");
    }

    let mut report = CsvLoadReport {
        total_rows: 0,
        inserted_count: 0,
        error_count: 0,
        errors: Vec::new(),
    };

    for (row_index, row) in reader.records().enumerate() {
        // Header is line 1; data starts on line 2.
        let line = row_index + 2;
        report.total_rows += 1;

        let row = match row {
            Ok(row) => row,
            Err(e) => {
                record_row_error(&mut report, format!("line {line}: {e}"));
                continue;
            }
        };

        match row_to_record(&row, &headers, table) {
            Ok(record) => match heap.insert(&record) {
                Ok(slot) => {
                    indices.insert(&record, slot);
                    report.inserted_count += 1;
                    if report.inserted_count % 1000 == 0 {
                        debug!(rows = report.inserted_count, "CSV load progress");
                    }
                }
                Err(e) => record_row_error(&mut report, format!("line {line}: {e}")),
            },
            Err(message) => record_row_error(&mut report, format!("line {line}: {message}")),
        }
    }

    indices.save_all();
    debug!(
        table = %table.name,
        inserted = report.inserted_count,
        failed = report.error_count,
        "CSV load finished"
    );
    Ok(report)
}

fn record_row_error(report: &mut CsvLoadReport, message: String) {
    report.error_count += 1;
    if report.errors.len() < MAX_SURFACED_ERRORS {
        report.errors.push(message);
    }
}

fn row_to_record(
    row: &csv::StringRecord,
    headers: &[String],
    table: &Table,
) -> Result<Record, String> {
    let mut record = Record::new();
    for column in &table.columns {
        let position = headers
            .iter()
            .position(|h| h == &column.name)
            .ok_or_else(|| format!("column '{}' missing from header", column.name))?;
        let raw = row
            .get(position)
            .ok_or_else(|| format!("row is short, no field for '{}'", column.name))?;
        let value = value_from_text(raw, column.data_type, column.size)
            .map_err(|e| format!("column '{}': {e}", column.name))?;
        record.insert(column.name.clone(), value);
    }
    Ok(record)
}
