#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Coordinate validation and correction against a city bounding box.
//!
//! Survey sheets carry hand-typed coordinates: missing cells, transposed
//! axes, values far outside the city. Everything here is total, so a raw
//! pair always normalizes to a usable [`GeoPoint`], never an error.

use serde::{Deserialize, Serialize};

/// Below this magnitude a value looks like a low-latitude city's latitude.
const LOOKS_LIKE_LATITUDE_MAX: f64 = 20.0;

/// Above this magnitude a value looks like a western-hemisphere longitude.
const LOOKS_LIKE_LONGITUDE_MIN: f64 = 70.0;

/// Geographic bounding box in WGS84 degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Minimum longitude.
    pub west: f64,
    /// Maximum longitude.
    pub east: f64,
    /// Minimum latitude.
    pub south: f64,
    /// Maximum latitude.
    pub north: f64,
}

/// The Barranquilla metropolitan bounding box every imported coordinate is
/// validated against.
pub const BARRANQUILLA: BoundingBox = BoundingBox {
    west: -74.95,
    east: -74.72,
    south: 10.85,
    north: 11.12,
};

impl BoundingBox {
    /// Returns the center of this box.
    #[must_use]
    pub const fn centroid(&self) -> GeoPoint {
        GeoPoint {
            longitude: (self.west + self.east) / 2.0,
            latitude: (self.south + self.north) / 2.0,
        }
    }

    /// Whether the point lies within this box (inclusive edges).
    #[must_use]
    pub const fn contains(&self, point: GeoPoint) -> bool {
        point.longitude >= self.west
            && point.longitude <= self.east
            && point.latitude >= self.south
            && point.latitude <= self.north
    }
}

/// A validated `(longitude, latitude)` pair, guaranteed in-box by
/// construction through [`normalize_pair`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    /// Longitude (WGS84).
    pub longitude: f64,
    /// Latitude (WGS84).
    pub latitude: f64,
}

/// Repairs a raw `(x, y)` pair into a point inside `bbox`.
///
/// `NaN` on either axis yields the box centroid. A small-magnitude `x` next
/// to a large-magnitude `y`, or a positive/negative pair in the wrong
/// order, is treated as a transposed row and swapped before validating.
/// After the swap check, values outside plausible Earth coordinates
/// (|lon| > 180 or |lat| > 90) yield the centroid wholesale; merely
/// out-of-box values clamp per axis.
///
/// The transposition check is a magnitude heuristic tuned for a
/// low-latitude, western-hemisphere city; coordinates near its thresholds
/// can be misread.
#[must_use]
pub fn normalize_pair(x: f64, y: f64, bbox: &BoundingBox) -> GeoPoint {
    if x.is_nan() || y.is_nan() {
        return bbox.centroid();
    }

    let (lon, lat) = if (x.abs() < LOOKS_LIKE_LATITUDE_MAX && y.abs() > LOOKS_LIKE_LONGITUDE_MIN)
        || (x > 0.0 && y < 0.0)
    {
        (y, x)
    } else {
        (x, y)
    };

    if lon.abs() > 180.0 || lat.abs() > 90.0 {
        return bbox.centroid();
    }

    GeoPoint {
        longitude: lon.clamp(bbox.west, bbox.east),
        latitude: lat.clamp(bbox.south, bbox.north),
    }
}
