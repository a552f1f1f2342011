//! Static polygon mesh of Barranquilla's barrios.
//!
//! The mesh is a `GeoJSON` `FeatureCollection` of named barrio boundaries
//! bundled into the crate at compile time. Lookup is by barrio name,
//! case-insensitive on the trimmed form, because the Store's aggregates
//! and the cadastral mesh come from different sources that disagree on
//! casing and padding.

use std::collections::BTreeMap;

use geo::{Centroid, MultiPolygon};
use geojson::{FeatureCollection, GeoJson};
use survey_map_geo::{BARRANQUILLA, GeoPoint};

use crate::HeatmapError;

/// Barranquilla barrio boundaries, embedded at compile time.
const BUNDLED_MESH: &str = include_str!("../assets/barrios_barranquilla.geojson");

/// One barrio boundary with its cadastral attributes.
#[derive(Debug)]
pub struct BarrioPolygon {
    /// Source feature id.
    pub id: Option<u64>,
    /// Barrio name as written in the source data.
    pub nombre: String,
    /// District (localidad) the barrio belongs to.
    pub localidad: Option<String>,
    /// Cadastral urban-piece code.
    pub pieza_urba: Option<String>,
    /// Boundary geometry. Single polygons are wrapped so every entry is a
    /// `MultiPolygon`.
    pub geometry: MultiPolygon<f64>,
    /// Geometric centroid.
    pub centroid: GeoPoint,
}

/// All barrio polygons, indexed for case-insensitive name lookup.
#[derive(Debug)]
pub struct BarrioMesh {
    polygons: Vec<BarrioPolygon>,
    by_name: BTreeMap<String, usize>,
}

impl BarrioMesh {
    /// Loads the bundled Barranquilla mesh.
    ///
    /// # Errors
    ///
    /// Returns [`HeatmapError`] when the bundled asset cannot be parsed as
    /// a `FeatureCollection`.
    pub fn bundled() -> Result<Self, HeatmapError> {
        Self::from_geojson_str(BUNDLED_MESH)
    }

    /// Parses a mesh out of `GeoJSON` text.
    ///
    /// Features with a missing/blank `nombre` property or an unusable
    /// geometry are skipped with a warning; one bad cadastral row must not
    /// take the whole mesh down.
    ///
    /// # Errors
    ///
    /// Returns [`HeatmapError`] when the text is not a valid `GeoJSON`
    /// `FeatureCollection`.
    pub fn from_geojson_str(content: &str) -> Result<Self, HeatmapError> {
        let geojson: GeoJson = content.parse()?;
        let GeoJson::FeatureCollection(collection) = geojson else {
            return Err(HeatmapError::Mesh {
                message: "mesh is not a FeatureCollection".to_string(),
            });
        };
        Ok(Self::from_features(collection))
    }

    fn from_features(collection: FeatureCollection) -> Self {
        let mut polygons = Vec::new();
        let mut by_name = BTreeMap::new();

        for feature in collection.features {
            let Some(nombre) = feature
                .property("nombre")
                .and_then(serde_json::Value::as_str)
                .map(str::trim)
                .filter(|nombre| !nombre.is_empty())
                .map(str::to_string)
            else {
                log::warn!("Skipping mesh feature without a nombre property");
                continue;
            };

            let id = feature
                .property("id")
                .and_then(serde_json::Value::as_u64);
            let localidad = string_property(&feature, "localidad");
            let pieza_urba = string_property(&feature, "pieza_urba");

            let Some(geometry) = feature.geometry.and_then(to_multi_polygon) else {
                log::warn!("Skipping mesh feature {nombre}: unusable geometry");
                continue;
            };

            let Some(centroid) = geometry.centroid() else {
                log::warn!("Skipping mesh feature {nombre}: degenerate geometry");
                continue;
            };

            by_name.insert(name_key(&nombre), polygons.len());
            polygons.push(BarrioPolygon {
                id,
                nombre,
                localidad,
                pieza_urba,
                geometry,
                centroid: GeoPoint {
                    longitude: centroid.x(),
                    latitude: centroid.y(),
                },
            });
        }

        let outside = polygons
            .iter()
            .filter(|polygon| !BARRANQUILLA.contains(polygon.centroid))
            .count();
        if outside > 0 {
            log::warn!("{outside} mesh polygons center outside the city bounding box");
        }
        log::info!("Loaded {} barrio polygons", polygons.len());

        Self { polygons, by_name }
    }

    /// Number of polygons in the mesh.
    #[must_use]
    pub fn len(&self) -> usize {
        self.polygons.len()
    }

    /// Whether the mesh has no polygons.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.polygons.is_empty()
    }

    /// Finds a barrio by name, case-insensitively on the trimmed form.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<&BarrioPolygon> {
        self.by_name
            .get(&name_key(name))
            .and_then(|&index| self.polygons.get(index))
    }

    /// Iterates over every polygon in mesh order.
    pub fn iter(&self) -> impl Iterator<Item = &BarrioPolygon> {
        self.polygons.iter()
    }
}

fn name_key(name: &str) -> String {
    name.trim().to_uppercase()
}

fn string_property(feature: &geojson::Feature, key: &str) -> Option<String> {
    feature
        .property(key)
        .and_then(serde_json::Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// Accepts both `Polygon` and `MultiPolygon` mesh geometries.
fn to_multi_polygon(geometry: geojson::Geometry) -> Option<MultiPolygon<f64>> {
    let geo_geometry: geo::Geometry<f64> = geometry.try_into().ok()?;
    match geo_geometry {
        geo::Geometry::MultiPolygon(multi) => Some(multi),
        geo::Geometry::Polygon(polygon) => Some(MultiPolygon(vec![polygon])),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundled_mesh_loads_with_centroids_in_box() {
        let mesh = BarrioMesh::bundled().unwrap();

        assert!(!mesh.is_empty());
        assert!(
            mesh.iter()
                .all(|polygon| BARRANQUILLA.contains(polygon.centroid))
        );
    }

    #[test]
    fn lookup_is_case_insensitive_and_trimmed() {
        let mesh = BarrioMesh::bundled().unwrap();

        let barrio = mesh.find("  el prado ").unwrap();
        assert_eq!(barrio.nombre, "EL PRADO");
        assert_eq!(barrio.localidad.as_deref(), Some("NORTE-CENTRO HISTORICO"));
        assert!(mesh.find("NO EXISTE").is_none());
    }

    #[test]
    fn unusable_features_are_skipped() {
        let content = r#"{
            "type": "FeatureCollection",
            "features": [
                {
                    "type": "Feature",
                    "properties": { "id": 1, "nombre": "REBOLO" },
                    "geometry": { "type": "Polygon", "coordinates": [[[-74.78, 10.97], [-74.77, 10.97], [-74.77, 10.98], [-74.78, 10.98], [-74.78, 10.97]]] }
                },
                {
                    "type": "Feature",
                    "properties": { "id": 2, "nombre": "  " },
                    "geometry": { "type": "Polygon", "coordinates": [[[-74.78, 10.97], [-74.77, 10.97], [-74.77, 10.98], [-74.78, 10.98], [-74.78, 10.97]]] }
                },
                {
                    "type": "Feature",
                    "properties": { "id": 3, "nombre": "SIN GEOMETRIA" },
                    "geometry": null
                },
                {
                    "type": "Feature",
                    "properties": { "id": 4, "nombre": "PUNTO" },
                    "geometry": { "type": "Point", "coordinates": [-74.78, 10.97] }
                }
            ]
        }"#;

        let mesh = BarrioMesh::from_geojson_str(content).unwrap();

        assert_eq!(mesh.len(), 1);
        assert!(mesh.find("rebolo").is_some());
    }

    #[test]
    fn multi_polygon_features_parse() {
        let mesh = BarrioMesh::bundled().unwrap();

        let las_flores = mesh.find("LAS FLORES").unwrap();
        assert_eq!(las_flores.geometry.0.len(), 2);
    }

    #[test]
    fn non_collection_text_is_rejected() {
        let err = BarrioMesh::from_geojson_str(
            r#"{ "type": "Point", "coordinates": [-74.78, 10.97] }"#,
        )
        .unwrap_err();
        assert!(matches!(err, HeatmapError::Mesh { .. }));
    }
}
