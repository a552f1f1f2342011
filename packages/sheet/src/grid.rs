//! Raw spreadsheet grid loading.
//!
//! A [`RawGrid`] is the row-major cell matrix exactly as exported from the
//! field teams' spreadsheets: a category header row, a reserved row, a
//! question header row, then data rows. Validation happens at construction,
//! so a held grid always has all three headers and at least one data row.

use std::path::Path;

use crate::SheetError;

/// Row index of the category header.
pub const CATEGORY_ROW: usize = 0;
/// Row index reserved for future subcategory headers, currently ignored.
pub const RESERVED_ROW: usize = 1;
/// Row index of the question header.
pub const QUESTION_ROW: usize = 2;
/// Index of the first data row.
pub const FIRST_DATA_ROW: usize = 3;

/// A raw, row-major spreadsheet grid.
///
/// Rows may be ragged; downstream mapping pads with empty strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawGrid {
    rows: Vec<Vec<String>>,
}

impl RawGrid {
    /// Builds a grid from in-memory rows.
    ///
    /// # Errors
    ///
    /// Returns [`SheetError::TooFewRows`] when the grid has fewer than four
    /// rows (three headers plus at least one data row).
    pub fn from_rows(rows: Vec<Vec<String>>) -> Result<Self, SheetError> {
        if rows.len() <= FIRST_DATA_ROW {
            return Err(SheetError::TooFewRows { found: rows.len() });
        }
        Ok(Self { rows })
    }

    /// Reads a grid from CSV text.
    ///
    /// No row is interpreted as a CSV header and records may have varying
    /// lengths.
    ///
    /// # Errors
    ///
    /// Returns [`SheetError::Csv`] on malformed CSV, or
    /// [`SheetError::TooFewRows`] when fewer than four rows result.
    pub fn from_csv_str(content: &str, delimiter: u8) -> Result<Self, SheetError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .delimiter(delimiter)
            .from_reader(content.as_bytes());

        let mut rows = Vec::new();
        for result in reader.records() {
            let record = result?;
            rows.push(record.iter().map(str::to_string).collect());
        }
        Self::from_rows(rows)
    }

    /// Reads a grid from a CSV file.
    ///
    /// # Errors
    ///
    /// Returns [`SheetError::Io`] when the file cannot be read, plus
    /// everything [`Self::from_csv_str`] returns.
    pub fn from_csv_path(path: &Path, delimiter: u8) -> Result<Self, SheetError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_csv_str(&content, delimiter)
    }

    /// The category header row.
    #[must_use]
    pub fn category_row(&self) -> &[String] {
        &self.rows[CATEGORY_ROW]
    }

    /// The question header row.
    #[must_use]
    pub fn question_row(&self) -> &[String] {
        &self.rows[QUESTION_ROW]
    }

    /// All data rows (row 3 onward).
    #[must_use]
    pub fn data_rows(&self) -> &[Vec<String>] {
        &self.rows[FIRST_DATA_ROW..]
    }

    /// Total row count, headers included.
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}
