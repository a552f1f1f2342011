#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Per-barrio heatmap and choropleth feature construction.
//!
//! Merges the Store's aggregate statistics with the bundled barrio
//! polygon mesh into one feature set the map can render two ways: every
//! plottable stat yields a point feature, and stats whose barrio exists
//! in the mesh additionally yield a polygon feature flagged `isPolygon`.
//! Intensities are normalized against the maxima of the run, so the
//! hottest barrio of any fetch renders at full strength.

pub mod mesh;

use geojson::{Geometry, Value};
use serde::{Deserialize, Serialize};
use survey_map_geo::BoundingBox;
use survey_map_store_models::AggregateStat;

use crate::mesh::BarrioMesh;

/// Errors raised while preparing heatmap features.
#[derive(Debug, thiserror::Error)]
pub enum HeatmapError {
    /// The mesh content had an unexpected shape.
    #[error("Mesh error: {message}")]
    Mesh {
        /// What was wrong with it.
        message: String,
    },

    /// The mesh content was not valid `GeoJSON`.
    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),
}

/// Properties attached to every emitted feature.
///
/// Keys are part of the map-layer contract and serialize verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeatmapProperties {
    /// Barrio name as reported by the Store.
    pub barrio: String,
    /// District the barrio belongs to, when the Store knows it.
    pub localidad: Option<String>,
    /// Surveys aggregated in this barrio.
    pub total: u64,
    /// Surveys matching the active category filter.
    pub matches: u64,
    /// Match percentage as computed by the Store.
    pub percentage: f64,
    /// Combined intensity in `[0, 100]`: the mean of the max-scaled
    /// intensity and match-count signals.
    pub intensity_score: f64,
    /// `intensity_score / 100`, the heatmap layer's point weight.
    pub weight: f64,
    /// Share of the run's largest barrio total, in `[0, 1]`.
    pub magnitude: f64,
    /// `true` on the choropleth twin of a point feature.
    #[serde(rename = "isPolygon")]
    pub is_polygon: bool,
}

/// One renderable feature: a point, or a barrio polygon carrying the same
/// properties.
#[derive(Debug, Clone)]
pub struct HeatmapFeature {
    /// Point (heatmap) or `MultiPolygon` (choropleth) geometry.
    pub geometry: Geometry,
    /// Normalized display properties.
    pub properties: HeatmapProperties,
}

impl HeatmapFeature {
    /// Renders this feature as a `GeoJSON` `Feature`.
    #[must_use]
    pub fn to_geojson(&self) -> geojson::Feature {
        let properties = match serde_json::to_value(&self.properties) {
            Ok(serde_json::Value::Object(map)) => Some(map),
            _ => None,
        };
        geojson::Feature {
            bbox: None,
            geometry: Some(self.geometry.clone()),
            id: None,
            properties,
            foreign_members: None,
        }
    }
}

/// Per-run maxima the signals are scaled against.
struct Maxima {
    intensity: f64,
    matches: u64,
    total: u64,
}

impl Maxima {
    fn of(stats: &[&AggregateStat]) -> Self {
        let mut maxima = Self {
            intensity: 0.0,
            matches: 0,
            total: 0,
        };
        for stat in stats {
            if stat.intensity_score > maxima.intensity {
                maxima.intensity = stat.intensity_score;
            }
            maxima.matches = maxima.matches.max(stat.matches_count);
            maxima.total = maxima.total.max(stat.total_encuestas);
        }
        maxima
    }

    /// Mean of the two max-scaled signals, capped at 100. A run whose
    /// maxima are zero scores zero everywhere.
    fn combined_intensity(&self, stat: &AggregateStat) -> f64 {
        let norm_intensity = if self.intensity > 0.0 {
            stat.intensity_score / self.intensity * 100.0
        } else {
            0.0
        };
        #[allow(clippy::cast_precision_loss)]
        let norm_matches = if self.matches > 0 {
            stat.matches_count as f64 / self.matches as f64 * 100.0
        } else {
            0.0
        };
        ((norm_intensity + norm_matches) / 2.0).min(100.0)
    }

    #[allow(clippy::cast_precision_loss)]
    fn magnitude(&self, stat: &AggregateStat) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        stat.total_encuestas as f64 / self.total as f64
    }
}

/// Builds the renderable feature set for one batch of aggregate stats.
///
/// Stats without plottable coordinates are dropped. Every kept stat
/// yields a point feature with coordinates repaired against `bbox`; when
/// the mesh has a same-named barrio (case-insensitive), a polygon feature
/// with identical properties follows it. Unmatched names still render as
/// points; the mesh covers the city unevenly.
#[must_use]
pub fn build_features(
    stats: &[AggregateStat],
    mesh: &BarrioMesh,
    bbox: &BoundingBox,
) -> Vec<HeatmapFeature> {
    let plottable: Vec<&AggregateStat> = stats
        .iter()
        .filter(|stat| stat.has_plottable_coordinates())
        .collect();
    let skipped = stats.len() - plottable.len();
    if skipped > 0 {
        log::info!("Skipping {skipped} aggregate rows without plottable coordinates");
    }

    let maxima = Maxima::of(&plottable);
    let mut features = Vec::with_capacity(plottable.len() * 2);
    let mut polygon_matches: usize = 0;

    for stat in plottable {
        let (Some(x), Some(y)) = (stat.coordx, stat.coordy) else {
            continue;
        };
        let point = survey_map_geo::normalize_pair(x, y, bbox);

        let intensity = maxima.combined_intensity(stat);
        let properties = HeatmapProperties {
            barrio: stat.barrio.clone(),
            localidad: stat.localidad.clone(),
            total: stat.total_encuestas,
            matches: stat.matches_count,
            percentage: stat.match_percentage,
            intensity_score: intensity,
            weight: intensity / 100.0,
            magnitude: maxima.magnitude(stat),
            is_polygon: false,
        };

        features.push(HeatmapFeature {
            geometry: Geometry::new(Value::Point(vec![point.longitude, point.latitude])),
            properties: properties.clone(),
        });

        if let Some(barrio) = mesh.find(&stat.barrio) {
            polygon_matches += 1;
            features.push(HeatmapFeature {
                geometry: Geometry::new(Value::from(&barrio.geometry)),
                properties: HeatmapProperties {
                    is_polygon: true,
                    ..properties
                },
            });
        }
    }

    log::info!(
        "Built {} features ({polygon_matches} barrios matched a mesh polygon)",
        features.len()
    );

    features
}

/// Renders features as a `GeoJSON` `FeatureCollection`.
#[must_use]
pub fn to_feature_collection(features: &[HeatmapFeature]) -> geojson::FeatureCollection {
    geojson::FeatureCollection {
        bbox: None,
        features: features.iter().map(HeatmapFeature::to_geojson).collect(),
        foreign_members: None,
    }
}
