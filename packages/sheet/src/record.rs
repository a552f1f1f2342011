//! Builds one normalized record from one data row.
//!
//! Every cell is processed independently and best-effort: a malformed cell
//! never aborts its row, and a row is only dropped when nothing usable came
//! out of it.

use std::collections::{BTreeMap, BTreeSet};

use chrono::Utc;
use survey_map_survey_models::{Location, RecordMetadata, SurveyRecord};

use crate::mapping::{ColumnMapping, SpecialColumn};

/// Builds a [`SurveyRecord`] from one data row.
///
/// Empty cells are skipped. Special columns route into the location and
/// metadata blocks; a coordinate cell that fails numeric parsing leaves
/// that axis empty rather than failing the row. Demographic answers land in
/// `sociodemographic`, everything else in `responses[category][question]`.
/// Returns `None` when the finished record carries no usable information.
#[must_use]
pub fn build_record(
    cells: &[String],
    mappings: &[ColumnMapping],
    row_number: usize,
) -> Option<SurveyRecord> {
    let mut record = SurveyRecord {
        id: generate_id(row_number),
        sociodemographic: BTreeMap::new(),
        location: Location::default(),
        responses: BTreeMap::new(),
        metadata: RecordMetadata {
            stratum: None,
            observations: None,
            category_distribution: BTreeSet::new(),
            processing_date: Utc::now(),
            row_number,
        },
    };

    for mapping in mappings {
        let Some(cell) = cells.get(mapping.index) else {
            continue;
        };
        let value = cell.trim();
        if value.is_empty() {
            continue;
        }

        if let Some(special) = mapping.special {
            match special {
                SpecialColumn::CoordX => {
                    record.location.coordinates.x = parse_coordinate(value);
                }
                SpecialColumn::CoordY => {
                    record.location.coordinates.y = parse_coordinate(value);
                }
                SpecialColumn::Localidad => {
                    record.location.localidad = Some(value.to_string());
                }
                SpecialColumn::Barrio => {
                    record.location.barrio = Some(value.to_string());
                }
                SpecialColumn::Address => {
                    record.location.address = Some(value.to_string());
                }
                SpecialColumn::Stratum => {
                    record.metadata.stratum = Some(value.to_string());
                }
                SpecialColumn::Observations => {
                    record.metadata.observations = Some(value.to_string());
                }
            }
            continue;
        }

        if mapping.category.is_demographic() {
            record
                .sociodemographic
                .insert(mapping.question.clone(), value.to_string());
        } else {
            record
                .responses
                .entry(mapping.category.clone())
                .or_default()
                .insert(mapping.question.clone(), value.to_string());
        }
    }

    if record.is_empty() {
        return None;
    }
    record.metadata.category_distribution = record.observed_categories();
    Some(record)
}

/// Parses a coordinate cell, tolerating a comma decimal separator.
fn parse_coordinate(cell: &str) -> Option<f64> {
    cell.trim().replace(',', ".").parse().ok()
}

/// Record ids embed generation time and row index: `sv-{millis}-{row}`.
fn generate_id(row_number: usize) -> String {
    format!("sv-{}-{row_number}", Utc::now().timestamp_millis())
}

#[cfg(test)]
mod tests {
    use survey_map_survey_models::{Category, KnownCategory};

    use super::*;
    use crate::mapping::map_columns;

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(ToString::to_string).collect()
    }

    fn five_column_mappings() -> Vec<ColumnMapping> {
        map_columns(
            &row(&["SALUD", "", "SALUD", "COORDX", "COORDY"]),
            &row(&["q1", "", "q2", "", ""]),
        )
    }

    #[test]
    fn builds_the_five_column_scenario() {
        let cells = row(&["a", "skip", "b", "-74.81", "10.97"]);
        let record = build_record(&cells, &five_column_mappings(), 0).unwrap();

        let salud = record
            .responses
            .get(&Category::Known(KnownCategory::Salud))
            .unwrap();
        assert_eq!(salud.len(), 2);
        assert_eq!(salud.get("q1").map(String::as_str), Some("a"));
        assert_eq!(salud.get("q2").map(String::as_str), Some("b"));

        let coords = record.location.coordinates;
        assert!((coords.x.unwrap() + 74.81).abs() < f64::EPSILON);
        assert!((coords.y.unwrap() - 10.97).abs() < f64::EPSILON);

        assert!(record.metadata.category_distribution.contains("SALUD"));
        assert!(record.id.starts_with("sv-"));
    }

    #[test]
    fn unlabeled_column_lands_under_the_fallback_category() {
        let cells = row(&["a", "skip", "b", "-74.81", "10.97"]);
        let record = build_record(&cells, &five_column_mappings(), 0).unwrap();
        let otros = record.responses.get(&Category::Uncategorized).unwrap();
        assert_eq!(otros.get("").map(String::as_str), Some("skip"));
    }

    #[test]
    fn empty_row_is_dropped() {
        let cells = row(&["", "  ", "", "", ""]);
        assert!(build_record(&cells, &five_column_mappings(), 1).is_none());
    }

    #[test]
    fn coordinates_alone_do_not_keep_a_row() {
        let cells = row(&["", "", "", "-74.81", "10.97"]);
        assert!(build_record(&cells, &five_column_mappings(), 2).is_none());
    }

    #[test]
    fn unparseable_coordinate_leaves_axis_empty() {
        let mappings = map_columns(
            &row(&["SALUD", "COORDX", "COORDY"]),
            &row(&["q1", "", ""]),
        );
        let cells = row(&["a", "n/a", "10,97"]);
        let record = build_record(&cells, &mappings, 0).unwrap();
        assert_eq!(record.location.coordinates.x, None);
        assert!((record.location.coordinates.y.unwrap() - 10.97).abs() < f64::EPSILON);
    }

    #[test]
    fn demographic_answers_route_to_the_flat_block() {
        let mappings = map_columns(
            &row(&["SOCIODEMOGRAFICO", "SOCIODEMOGRAFICO", "ESTRATO"]),
            &row(&["Edad", "Sexo", ""]),
        );
        let cells = row(&["34", "F", "3"]);
        let record = build_record(&cells, &mappings, 0).unwrap();

        assert_eq!(record.sociodemographic.len(), 2);
        assert_eq!(
            record.sociodemographic.get("Edad").map(String::as_str),
            Some("34")
        );
        assert!(record.responses.is_empty());
        assert_eq!(record.metadata.stratum.as_deref(), Some("3"));
        assert!(
            record
                .metadata
                .category_distribution
                .contains("SOCIODEMOGRAFICO")
        );
    }

    #[test]
    fn location_fields_route_directly() {
        let mappings = map_columns(
            &row(&["", "", "", ""]),
            &row(&["Barrio", "Localidad", "Dirección", "Observaciones"]),
        );
        let cells = row(&["El Prado", "Norte", "Cra 54 #59-135", "casa esquinera"]);
        let record = build_record(&cells, &mappings, 4).unwrap();

        assert_eq!(record.location.barrio.as_deref(), Some("El Prado"));
        assert_eq!(record.location.localidad.as_deref(), Some("Norte"));
        assert_eq!(record.location.address.as_deref(), Some("Cra 54 #59-135"));
        assert_eq!(
            record.metadata.observations.as_deref(),
            Some("casa esquinera")
        );
        assert_eq!(record.metadata.row_number, 4);
    }

    #[test]
    fn rebuilding_a_row_yields_field_equal_records() {
        let cells = row(&["a", "skip", "b", "-74.81", "10.97"]);
        let mappings = five_column_mappings();
        let first = build_record(&cells, &mappings, 7).unwrap();
        let second = build_record(&cells, &mappings, 7).unwrap();

        assert_eq!(first.sociodemographic, second.sociodemographic);
        assert_eq!(first.responses, second.responses);
        assert_eq!(first.location, second.location);
        assert_eq!(
            first.metadata.category_distribution,
            second.metadata.category_distribution
        );
        assert_eq!(first.metadata.row_number, second.metadata.row_number);
    }

    #[test]
    fn short_rows_only_fill_present_cells() {
        let cells = row(&["a"]);
        let record = build_record(&cells, &five_column_mappings(), 0).unwrap();
        assert_eq!(record.responses.len(), 1);
        assert!(!record.location.coordinates.is_complete());
    }
}
