#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Spreadsheet grid parsing and survey record normalization.
//!
//! Field teams export their questionnaires as multi-header grids: a
//! category row, a reserved row, a question row, then one data row per
//! surveyed household. This crate turns such a grid into
//! [`SurveyRecord`]s. The only fatal condition is a structurally malformed
//! grid; every row- and cell-level problem recovers locally.

pub mod grid;
pub mod mapping;
pub mod record;

use survey_map_survey_models::SurveyRecord;

pub use grid::RawGrid;
pub use mapping::{ColumnMapping, SpecialColumn, detect_special, map_columns};
pub use record::build_record;

/// Errors that can occur while loading a spreadsheet grid.
#[derive(Debug, thiserror::Error)]
pub enum SheetError {
    /// Grid is missing the three header rows plus at least one data row.
    #[error("Grid too small: found {found} rows, need at least 4")]
    TooFewRows {
        /// Number of rows actually present.
        found: usize,
    },

    /// CSV parsing failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// I/O error (file read).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Parses every data row of a grid into normalized records.
///
/// Rows that carry no usable information are dropped and counted in a
/// warning; everything else is best-effort per cell. Output order follows
/// grid order, and output length is at most the data-row count.
#[must_use]
pub fn parse_grid(grid: &RawGrid) -> Vec<SurveyRecord> {
    let mappings = map_columns(grid.category_row(), grid.question_row());
    let data_rows = grid.data_rows();

    let mut records = Vec::with_capacity(data_rows.len());
    for (row_number, cells) in data_rows.iter().enumerate() {
        if let Some(record) = build_record(cells, &mappings, row_number) {
            records.push(record);
        }
    }

    let dropped = data_rows.len() - records.len();
    if dropped > 0 {
        log::warn!(
            "Dropped {dropped} of {} data rows with no usable information",
            data_rows.len()
        );
    }
    log::info!(
        "Parsed {} records from {} data rows across {} columns",
        records.len(),
        data_rows.len(),
        mappings.len()
    );

    records
}
