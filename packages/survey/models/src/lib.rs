#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Survey category taxonomy and the canonical normalized record format.
//!
//! Every spreadsheet import produces [`SurveyRecord`] values keyed by the
//! shared [`Category`] taxonomy. Records are persisted to the Store in
//! exactly this shape, so the serde names here are wire names.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Label assigned to columns whose category header is missing or excluded.
pub const UNCATEGORIZED_LABEL: &str = "OTROS";

/// Category-row sentinel marking a column that must not be imported.
pub const EXCLUDE_SENTINEL: &str = "NO INCLUIR";

/// The fixed set of survey categories shared by every questionnaire
/// revision.
///
/// Labels are the exact uppercase Spanish headers the field teams use, so
/// parsing and display round-trip through the same strings.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum KnownCategory {
    /// Demographic block, routed into [`SurveyRecord::sociodemographic`].
    Sociodemografico,
    /// Health access and coverage questions.
    Salud,
    /// Education access questions.
    Educacion,
    /// Housing condition questions.
    Vivienda,
    /// Utility coverage questions (water, power, gas, internet).
    #[serde(rename = "SERVICIOS PUBLICOS")]
    #[strum(serialize = "SERVICIOS PUBLICOS")]
    ServiciosPublicos,
    /// Safety perception and incident questions.
    Seguridad,
    /// Mobility and transport questions.
    Movilidad,
    /// Environmental condition questions.
    #[serde(rename = "MEDIO AMBIENTE")]
    #[strum(serialize = "MEDIO AMBIENTE")]
    MedioAmbiente,
    /// Recreation and sports access questions.
    #[serde(rename = "RECREACION Y DEPORTE")]
    #[strum(serialize = "RECREACION Y DEPORTE")]
    RecreacionYDeporte,
    /// Civic participation questions.
    #[serde(rename = "PARTICIPACION CIUDADANA")]
    #[strum(serialize = "PARTICIPACION CIUDADANA")]
    ParticipacionCiudadana,
    /// Household economy and employment questions.
    Economia,
}

impl KnownCategory {
    /// Returns all variants of this enum.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Sociodemografico,
            Self::Salud,
            Self::Educacion,
            Self::Vivienda,
            Self::ServiciosPublicos,
            Self::Seguridad,
            Self::Movilidad,
            Self::MedioAmbiente,
            Self::RecreacionYDeporte,
            Self::ParticipacionCiudadana,
            Self::Economia,
        ]
    }

    /// Whether this is the demographic category whose answers live in the
    /// flat `sociodemographic` block instead of `responses`.
    #[must_use]
    pub const fn is_demographic(self) -> bool {
        matches!(self, Self::Sociodemografico)
    }
}

/// A resolved category header.
///
/// Spreadsheet category rows are free text. Resolution is total: every raw
/// cell lands in exactly one of these variants, so downstream grouping can
/// match exhaustively instead of comparing strings.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Category {
    /// One of the fixed categories in [`KnownCategory`].
    Known(KnownCategory),
    /// A non-empty header outside the known set, kept verbatim after
    /// cleaning.
    Custom(String),
    /// Missing, excluded, or explicitly uncategorized header.
    Uncategorized,
}

impl Category {
    /// Resolves a raw category-row cell.
    ///
    /// The cell is trimmed and uppercased. Known labels map to
    /// [`Category::Known`]; the `NO INCLUIR` sentinel, the literal `OTROS`,
    /// and empty cells map to [`Category::Uncategorized`]; anything else is
    /// kept as [`Category::Custom`]. Total, never fails.
    #[must_use]
    pub fn resolve(raw: &str) -> Self {
        let cleaned = raw.trim().to_uppercase();
        if cleaned.is_empty() || cleaned == EXCLUDE_SENTINEL || cleaned == UNCATEGORIZED_LABEL {
            return Self::Uncategorized;
        }
        KnownCategory::from_str(&cleaned).map_or(Self::Custom(cleaned), Self::Known)
    }

    /// The canonical string label, as used for Store map keys.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Known(known) => known.as_ref(),
            Self::Custom(label) => label,
            Self::Uncategorized => UNCATEGORIZED_LABEL,
        }
    }

    /// Whether values under this category belong in the flat
    /// `sociodemographic` block.
    #[must_use]
    pub const fn is_demographic(&self) -> bool {
        matches!(self, Self::Known(KnownCategory::Sociodemografico))
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for Category {
    fn from(raw: String) -> Self {
        Self::resolve(&raw)
    }
}

impl From<Category> for String {
    fn from(category: Category) -> Self {
        category.as_str().to_string()
    }
}

/// Nullable coordinate pair exactly as parsed from the sheet.
///
/// These are raw values. Bounding-box validation and correction happen at
/// the map boundary, not at parse time, so the Store keeps what the sheet
/// said.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Coordinates {
    /// Longitude cell value. `None` when the cell was missing or
    /// unparseable.
    pub x: Option<f64>,
    /// Latitude cell value. `None` when the cell was missing or
    /// unparseable.
    pub y: Option<f64>,
}

impl Coordinates {
    /// Whether both axes are present.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.x.is_some() && self.y.is_some()
    }
}

/// Where the surveyed household is.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    /// District (localidad) name as written in the sheet.
    pub localidad: Option<String>,
    /// Neighborhood (barrio) name as written in the sheet.
    pub barrio: Option<String>,
    /// Street address, free text.
    pub address: Option<String>,
    /// Raw coordinate pair.
    pub coordinates: Coordinates,
}

/// Row provenance and derived classification data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordMetadata {
    /// Socioeconomic stratum (1-6) as written in the sheet, kept as text.
    pub stratum: Option<String>,
    /// Surveyor observations, free text.
    pub observations: Option<String>,
    /// Category labels that received at least one answer in this row.
    pub category_distribution: BTreeSet<String>,
    /// When this record was built from the sheet.
    pub processing_date: DateTime<Utc>,
    /// Zero-based data-row index within the source grid.
    pub row_number: usize,
}

/// One surveyed household, normalized from a single data row.
///
/// Created once by the record builder, immutable afterwards, persisted to
/// the Store in batches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SurveyRecord {
    /// Generated id, unique per row (`sv-{millis}-{row}`).
    pub id: String,
    /// Demographic question→answer pairs (the `SOCIODEMOGRAFICO` block).
    pub sociodemographic: BTreeMap<String, String>,
    /// Location block.
    pub location: Location,
    /// Answers grouped category→question→answer for every non-demographic
    /// category.
    pub responses: BTreeMap<Category, BTreeMap<String, String>>,
    /// Row provenance and derived classification data.
    pub metadata: RecordMetadata,
}

impl SurveyRecord {
    /// Whether this record carries no usable information and must be
    /// discarded.
    ///
    /// A record is empty when it has no demographic answers, no categorized
    /// answers, and neither a `localidad` nor a `barrio`. Coordinates alone
    /// do not make a row worth keeping.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sociodemographic.is_empty()
            && self.responses.is_empty()
            && self.location.localidad.is_none()
            && self.location.barrio.is_none()
    }

    /// Category labels observed in this row: every `responses` key plus the
    /// demographic category when the demographic block is populated.
    #[must_use]
    pub fn observed_categories(&self) -> BTreeSet<String> {
        let mut observed: BTreeSet<String> = self
            .responses
            .keys()
            .map(|category| category.as_str().to_string())
            .collect();
        if !self.sociodemographic.is_empty() {
            observed.insert(KnownCategory::Sociodemografico.as_ref().to_string());
        }
        observed
    }
}
