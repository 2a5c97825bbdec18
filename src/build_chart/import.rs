//! Height/weight build charts from spreadsheet CSV exports.
//!
//! Expected shape:
//! ```text
//! height,preferred_plus,preferred,standard_plus,standard
//! 4'10",119,132,145,174
//! 5-10,170,185,200,225
//! ```
//! Every value is the class's maximum weight; bad rows are reported and skipped.

use super::{BuildChartRow, BuildRatingClass, RatingRange, RatingRanges, BASE_RATING_CLASSES};
use crate::error::{EngineError, Result};
use csv::ReaderBuilder;

/// Rows accepted from a CSV import plus per-row problems
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BuildTableImport {
    pub rows: Vec<BuildChartRow>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

/// `5'10"`, `5'10`, `5-10` or bare inches (48..=96) to total inches
pub fn parse_height_string(value: &str) -> Option<u32> {
    let cleaned = value.trim();

    let feet_inches = cleaned
        .strip_suffix('"')
        .unwrap_or(cleaned)
        .split_once('\'')
        .or_else(|| cleaned.split_once('-'));
    if let Some((feet, inches)) = feet_inches {
        let feet: u32 = feet.parse().ok()?;
        let inches: u32 = inches.parse().ok()?;
        return (inches < 12).then_some(feet * 12 + inches);
    }

    cleaned.parse::<u32>().ok().filter(|i| (48..=96).contains(i))
}

/// `70` -> `5'10"`
pub fn format_height(total_inches: u32) -> String {
    format!("{}'{}\"", total_inches / 12, total_inches % 12)
}

fn parse_weight(value: &str) -> Option<f64> {
    let cleaned = value.trim();
    if cleaned.is_empty() || cleaned == "-" || cleaned == "\u{2014}" {
        return None;
    }
    cleaned.parse::<u32>().ok().filter(|w| *w <= 999).map(f64::from)
}

fn normalize_header(header: &str) -> String {
    let lowered: String = header
        .trim()
        .to_ascii_lowercase()
        .chars()
        .filter(|c| *c != '\'' && *c != '"')
        .map(|c| if c.is_whitespace() || c == '-' { '_' } else { c })
        .collect();

    match lowered.as_str() {
        "pref+" | "pref_plus" | "preferredplus" => "preferred_plus".to_string(),
        "std+" | "std_plus" | "standardplus" => "standard_plus".to_string(),
        _ => lowered,
    }
}

/// Parse a height/weight chart. Fails when the file has no height column, no
/// weight column, or no usable rows.
pub fn parse_build_table_csv(content: &str) -> Result<BuildTableImport> {
    let mut reader = ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content.trim().as_bytes());

    let headers: Vec<String> = reader.headers()?.iter().map(normalize_header).collect();
    let height_col = headers
        .iter()
        .position(|h| h == "height")
        .ok_or_else(|| EngineError::InvalidInput("CSV must have a \"height\" column".into()))?;

    let class_cols: Vec<(BuildRatingClass, usize)> = BASE_RATING_CLASSES
        .iter()
        .filter_map(|class| headers.iter().position(|h| h == class.as_str()).map(|i| (*class, i)))
        .collect();
    if class_cols.is_empty() {
        return Err(EngineError::InvalidInput(
            "CSV must have at least one weight column (preferred_plus, preferred, standard_plus, or standard)".into(),
        ));
    }

    let mut import = BuildTableImport::default();
    for (index, record) in reader.records().enumerate() {
        let record = record?;
        if record.iter().all(|v| v.is_empty()) {
            continue;
        }
        let line = index + 2;

        let height_value = record.get(height_col).unwrap_or("");
        let Some(height_inches) = parse_height_string(height_value) else {
            import.errors.push(format!("Row {}: Invalid height \"{}\"", line, height_value));
            continue;
        };

        let weight_ranges: RatingRanges = class_cols
            .iter()
            .filter_map(|(class, col)| {
                let max = parse_weight(record.get(*col).unwrap_or(""))?;
                Some((*class, RatingRange::up_to(max)))
            })
            .collect();
        if weight_ranges.is_empty() {
            import.warnings.push(format!(
                "Row {}: No valid weight values for {}",
                line,
                format_height(height_inches)
            ));
            continue;
        }

        if let Some(existing) = import.rows.iter().position(|r| r.height_inches == height_inches) {
            import.warnings.push(format!(
                "Row {}: Duplicate height {}, using later value",
                line,
                format_height(height_inches)
            ));
            import.rows.remove(existing);
        }
        import.rows.push(BuildChartRow {
            height_inches,
            weight_ranges,
        });
    }

    if import.rows.is_empty() {
        let mut errors = import.errors;
        errors.push("No valid data rows found".to_string());
        return Err(EngineError::InvalidInput(errors.join("; ")));
    }

    import.rows.sort_by_key(|r| r.height_inches);
    log::debug!(
        "Imported build chart with {} rows ({} errors, {} warnings)",
        import.rows.len(),
        import.errors.len(),
        import.warnings.len()
    );
    Ok(import)
}

/// Write the base-class maximums back out in the import format
pub fn export_build_table_csv(rows: &[BuildChartRow]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    let mut header = vec!["height".to_string()];
    header.extend(BASE_RATING_CLASSES.iter().map(|c| c.as_str().to_string()));
    writer.write_record(&header)?;

    for row in rows {
        let mut record = vec![format_height(row.height_inches)];
        record.extend(BASE_RATING_CLASSES.iter().map(|c| {
            row.weight_ranges
                .get(c)
                .and_then(|r| r.max)
                .map(|m| m.to_string())
                .unwrap_or_default()
        }));
        writer.write_record(&record)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| EngineError::Io(e.into_error()))?;
    String::from_utf8(bytes).map_err(|e| EngineError::InvalidInput(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_height_formats() {
        assert_eq!(parse_height_string("5'10\""), Some(70));
        assert_eq!(parse_height_string("5'10"), Some(70));
        assert_eq!(parse_height_string("5-10"), Some(70));
        assert_eq!(parse_height_string("70"), Some(70));
        assert_eq!(parse_height_string("5'12"), None);
        assert_eq!(parse_height_string("30"), None);
        assert_eq!(parse_height_string("tall"), None);
    }

    #[test]
    fn test_parse_chart() {
        let csv = "Height,Pref+,Preferred,Std+,Standard\n\
                   \"5'10\"\"\",170,185,200,225\n\
                   4'10\",119,132,,174\n";
        let import = parse_build_table_csv(csv).unwrap();
        assert_eq!(import.rows.len(), 2);
        assert_eq!(import.rows[0].height_inches, 58);
        let short = &import.rows[0].weight_ranges;
        assert!(!short.contains_key(&BuildRatingClass::StandardPlus));
        assert_eq!(short[&BuildRatingClass::Standard].max, Some(174.0));
        assert_eq!(import.rows[1].weight_ranges[&BuildRatingClass::PreferredPlus].max, Some(170.0));
    }

    #[test]
    fn test_bad_rows_reported() {
        let csv = "height,standard\nabc,200\n5'9,-\n5'10,220\n5'10,225\n";
        let import = parse_build_table_csv(csv).unwrap();
        assert_eq!(import.rows.len(), 1);
        assert_eq!(import.rows[0].weight_ranges[&BuildRatingClass::Standard].max, Some(225.0));
        assert_eq!(import.errors, vec!["Row 2: Invalid height \"abc\"".to_string()]);
        assert_eq!(import.warnings.len(), 2);
        assert!(import.warnings[1].contains("Duplicate height 5'10\""));
    }

    #[test]
    fn test_structural_failures() {
        assert!(parse_build_table_csv("weight,standard\n150,200\n").is_err());
        assert!(parse_build_table_csv("height,weight\n5'10,200\n").is_err());
        let err = parse_build_table_csv("height,standard\nabc,200\n").unwrap_err();
        assert!(err.to_string().contains("No valid data rows found"));
    }

    #[test]
    fn test_export_matches_import_format() {
        let import = parse_build_table_csv("height,preferred,standard\n5'10,185,225\n").unwrap();
        let out = export_build_table_csv(&import.rows).unwrap();
        assert_eq!(out, "height,preferred_plus,preferred,standard_plus,standard\n\"5'10\"\"\",,185,,225\n");
    }
}
