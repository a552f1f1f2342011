#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Wire types owned by the remote Store.
//!
//! These structs mirror the Store's RPC payloads field-for-field, so the
//! snake_case names here are the Store's names, not ours. Numeric fields in
//! the aggregate view stitch heterogeneous legacy columns and may arrive as
//! numbers, numeric strings, or null.

use serde::{Deserialize, Serialize};

/// Authoritative migration progress, re-queried from the Store after every
/// applied batch.
///
/// `next_offset` is the only valid resume point. The Store may have
/// partially applied a prior batch, so a client-held counter is never
/// trusted.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MigrationProgress {
    /// Total source rows the migration must process.
    pub total_persons_to_process: u64,
    /// Rows already applied to the destination.
    pub processed_persons: u64,
    /// Store-computed completion percentage.
    pub progress_percentage: f64,
    /// Offset the next batch call must use.
    pub next_offset: u64,
    /// Store's estimate of batches left at its configured batch size.
    pub estimated_remaining_batches: u64,
}

impl MigrationProgress {
    /// Whether every source row has been processed.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.next_offset >= self.total_persons_to_process
    }
}

/// One row of Store-computed statistics per neighborhood.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateStat {
    /// Neighborhood name as stored.
    pub barrio: String,
    /// District name, when the view could resolve one.
    #[serde(default)]
    pub localidad: Option<String>,
    /// Representative longitude for the neighborhood.
    #[serde(default, deserialize_with = "lenient_f64")]
    pub coordx: Option<f64>,
    /// Representative latitude for the neighborhood.
    #[serde(default, deserialize_with = "lenient_f64")]
    pub coordy: Option<f64>,
    /// Surveys counted in this neighborhood.
    #[serde(default)]
    pub total_encuestas: u64,
    /// Surveys matching the active category filter.
    #[serde(default)]
    pub matches_count: u64,
    /// `matches_count` as a percentage of `total_encuestas`.
    #[serde(default)]
    pub match_percentage: f64,
    /// Store-side intensity signal in `[0, 100]`.
    #[serde(default)]
    pub intensity_score: f64,
}

impl AggregateStat {
    /// Whether this stat can be plotted: both coordinates present and
    /// neither zero (the view emits `0` for unlocated neighborhoods).
    #[must_use]
    pub const fn has_plottable_coordinates(&self) -> bool {
        matches!((self.coordx, self.coordy), (Some(x), Some(y)) if x != 0.0 && y != 0.0)
    }
}

/// Deserializes a coordinate that may be a number, a numeric string (comma
/// decimals tolerated), or null. Unparseable values become `None` rather
/// than failing the row.
fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Number(number) => number.as_f64(),
        serde_json::Value::String(text) => text.trim().replace(',', ".").parse().ok(),
        _ => None,
    })
}
