//! Column mapping: header rows into per-column routing decisions.
//!
//! Category headers are free text typed by field teams, so resolution is
//! keyword-based and case-insensitive. Special columns (coordinates,
//! location fields, stratum, observations) are classified here and excluded
//! from category/question grouping downstream.

use survey_map_survey_models::Category;

/// A column routed outside the category/question response groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecialColumn {
    /// Longitude (x) coordinate.
    CoordX,
    /// Latitude (y) coordinate.
    CoordY,
    /// District name.
    Localidad,
    /// Neighborhood name.
    Barrio,
    /// Street address.
    Address,
    /// Socioeconomic stratum.
    Stratum,
    /// Surveyor observations.
    Observations,
}

/// One column's resolved routing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMapping {
    /// Zero-based column index.
    pub index: usize,
    /// Resolved category for this column.
    pub category: Category,
    /// Trimmed question text (case preserved).
    pub question: String,
    /// The category-row cell verbatim, before any cleaning.
    pub original_header: String,
    /// Special routing, when the column matched the keyword table.
    pub special: Option<SpecialColumn>,
}

/// Builds one mapping entry per column present in either header row.
///
/// The result length is the longer of the two rows; ragged rows are padded
/// with empty strings. Missing headers are not an error: absent cells map
/// to empty-string questions under whatever category was resolved. Pure and
/// total.
#[must_use]
pub fn map_columns(categories: &[String], questions: &[String]) -> Vec<ColumnMapping> {
    let width = categories.len().max(questions.len());
    (0..width)
        .map(|index| {
            let raw_category = categories.get(index).map_or("", String::as_str);
            let question = questions
                .get(index)
                .map_or("", String::as_str)
                .trim()
                .to_string();
            ColumnMapping {
                index,
                category: Category::resolve(raw_category),
                special: detect_special(&question, raw_category),
                question,
                original_header: raw_category.to_string(),
            }
        })
        .collect()
}

/// Classifies a column against the special-column keyword table.
///
/// The question text is checked first; the raw category header is the
/// fallback, since coordinate columns often carry their keyword in the
/// category row over an empty question cell. Case-insensitive.
#[must_use]
pub fn detect_special(question: &str, original_header: &str) -> Option<SpecialColumn> {
    classify(question).or_else(|| classify(original_header))
}

fn classify(text: &str) -> Option<SpecialColumn> {
    let upper = text.to_uppercase();
    if contains_any(&upper, &["COORDX", "COORD_X", "LONGITUD"]) {
        return Some(SpecialColumn::CoordX);
    }
    if contains_any(&upper, &["COORDY", "COORD_Y", "LATITUD"]) {
        return Some(SpecialColumn::CoordY);
    }
    if upper.contains("LOCALIDAD") {
        return Some(SpecialColumn::Localidad);
    }
    if upper.contains("BARRIO") {
        return Some(SpecialColumn::Barrio);
    }
    if contains_any(&upper, &["DIRECCION", "DIRECCIÓN"]) {
        return Some(SpecialColumn::Address);
    }
    if upper.contains("ESTRATO") {
        return Some(SpecialColumn::Stratum);
    }
    if contains_any(&upper, &["OBSERVACION", "OBSERVACIÓN"]) {
        return Some(SpecialColumn::Observations);
    }
    None
}

/// Checks if `haystack` contains any of the given `needles`.
fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| haystack.contains(needle))
}

#[cfg(test)]
mod tests {
    use survey_map_survey_models::KnownCategory;

    use super::*;

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn maps_the_five_column_header() {
        let categories = row(&["SALUD", "", "SALUD", "COORDX", "COORDY"]);
        let questions = row(&["q1", "", "q2"]);
        let mappings = map_columns(&categories, &questions);

        assert_eq!(mappings.len(), 5);
        assert_eq!(
            mappings[0].category,
            Category::Known(KnownCategory::Salud)
        );
        assert_eq!(mappings[0].question, "q1");
        assert_eq!(mappings[0].special, None);

        assert_eq!(mappings[1].category, Category::Uncategorized);
        assert_eq!(mappings[1].question, "");

        assert_eq!(mappings[2].question, "q2");

        assert_eq!(mappings[3].special, Some(SpecialColumn::CoordX));
        assert_eq!(mappings[4].special, Some(SpecialColumn::CoordY));
        assert_eq!(mappings[4].original_header, "COORDY");
    }

    #[test]
    fn length_is_the_longer_header_row() {
        let categories = row(&["SALUD"]);
        let questions = row(&["q1", "q2", "q3"]);
        let mappings = map_columns(&categories, &questions);
        assert_eq!(mappings.len(), 3);
        assert_eq!(mappings[2].category, Category::Uncategorized);
        assert_eq!(mappings[2].question, "q3");
    }

    #[test]
    fn sentinel_never_survives_resolution() {
        let categories = row(&["NO INCLUIR", "no incluir "]);
        let questions = row(&["q1", "q2"]);
        for mapping in map_columns(&categories, &questions) {
            assert_eq!(mapping.category, Category::Uncategorized);
            assert_eq!(mapping.category.as_str(), "OTROS");
        }
    }

    #[test]
    fn free_form_category_is_kept_cleaned() {
        let categories = row(&["  Cultura "]);
        let questions = row(&["Asiste a eventos?"]);
        let mappings = map_columns(&categories, &questions);
        assert_eq!(
            mappings[0].category,
            Category::Custom("CULTURA".to_string())
        );
        assert_eq!(mappings[0].original_header, "  Cultura ");
    }

    #[test]
    fn classifies_special_keywords() {
        assert_eq!(detect_special("Longitud", ""), Some(SpecialColumn::CoordX));
        assert_eq!(detect_special("latitud", ""), Some(SpecialColumn::CoordY));
        assert_eq!(detect_special("", "COORDX"), Some(SpecialColumn::CoordX));
        assert_eq!(
            detect_special("Localidad de residencia", ""),
            Some(SpecialColumn::Localidad)
        );
        assert_eq!(detect_special("Barrio", ""), Some(SpecialColumn::Barrio));
        assert_eq!(
            detect_special("Dirección", ""),
            Some(SpecialColumn::Address)
        );
        assert_eq!(
            detect_special("Estrato socioeconómico", ""),
            Some(SpecialColumn::Stratum)
        );
        assert_eq!(
            detect_special("OBSERVACIONES", ""),
            Some(SpecialColumn::Observations)
        );
        assert_eq!(detect_special("Tiene acueducto?", "SALUD"), None);
    }

    #[test]
    fn question_text_wins_over_header() {
        let special = detect_special("Longitud", "COORDY");
        assert_eq!(special, Some(SpecialColumn::CoordX));
    }
}
