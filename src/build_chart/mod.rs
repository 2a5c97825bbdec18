//! Carrier build charts: height/weight or BMI limits per rating class

pub mod import;
pub mod lookup;

pub use import::{
    export_build_table_csv, format_height, parse_build_table_csv, parse_height_string, BuildTableImport,
};
pub use lookup::{
    get_bmi_guidance, get_rating_comparison_message, get_weight_guidance, lookup_bmi_rating,
    lookup_build_rating, lookup_build_rating_unified, ratings_match, BmiGuidance, BuildRatingLookup,
    WeightGuidance,
};

use crate::error::{EngineError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Build rating, best to worst in declaration order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildRatingClass {
    PreferredPlus,
    Preferred,
    StandardPlus,
    Standard,
    TableA,
    TableB,
    TableC,
    TableD,
    TableE,
    TableF,
    TableG,
    TableH,
    TableI,
    TableJ,
    TableK,
    TableL,
    TableM,
    TableN,
    TableO,
    TableP,
    /// Heavier than every defined range
    TableRated,
    /// No chart, or the chart has no usable data
    Unknown,
}

/// Ratings ordered best to worst; `Unknown` is not on the ladder
pub const BUILD_RATING_CLASS_ORDER: [BuildRatingClass; 21] = [
    BuildRatingClass::PreferredPlus,
    BuildRatingClass::Preferred,
    BuildRatingClass::StandardPlus,
    BuildRatingClass::Standard,
    BuildRatingClass::TableA,
    BuildRatingClass::TableB,
    BuildRatingClass::TableC,
    BuildRatingClass::TableD,
    BuildRatingClass::TableE,
    BuildRatingClass::TableF,
    BuildRatingClass::TableG,
    BuildRatingClass::TableH,
    BuildRatingClass::TableI,
    BuildRatingClass::TableJ,
    BuildRatingClass::TableK,
    BuildRatingClass::TableL,
    BuildRatingClass::TableM,
    BuildRatingClass::TableN,
    BuildRatingClass::TableO,
    BuildRatingClass::TableP,
    BuildRatingClass::TableRated,
];

/// The four non-table classes a chart row must define at least one of
pub const BASE_RATING_CLASSES: [BuildRatingClass; 4] = [
    BuildRatingClass::PreferredPlus,
    BuildRatingClass::Preferred,
    BuildRatingClass::StandardPlus,
    BuildRatingClass::Standard,
];

impl BuildRatingClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            BuildRatingClass::PreferredPlus => "preferred_plus",
            BuildRatingClass::Preferred => "preferred",
            BuildRatingClass::StandardPlus => "standard_plus",
            BuildRatingClass::Standard => "standard",
            BuildRatingClass::TableA => "table_a",
            BuildRatingClass::TableB => "table_b",
            BuildRatingClass::TableC => "table_c",
            BuildRatingClass::TableD => "table_d",
            BuildRatingClass::TableE => "table_e",
            BuildRatingClass::TableF => "table_f",
            BuildRatingClass::TableG => "table_g",
            BuildRatingClass::TableH => "table_h",
            BuildRatingClass::TableI => "table_i",
            BuildRatingClass::TableJ => "table_j",
            BuildRatingClass::TableK => "table_k",
            BuildRatingClass::TableL => "table_l",
            BuildRatingClass::TableM => "table_m",
            BuildRatingClass::TableN => "table_n",
            BuildRatingClass::TableO => "table_o",
            BuildRatingClass::TableP => "table_p",
            BuildRatingClass::TableRated => "table_rated",
            BuildRatingClass::Unknown => "unknown",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        let normalized = value.trim().to_ascii_lowercase();
        BUILD_RATING_CLASS_ORDER
            .iter()
            .chain(std::iter::once(&BuildRatingClass::Unknown))
            .find(|c| c.as_str() == normalized)
            .copied()
            .ok_or_else(|| EngineError::unknown("build rating class", value))
    }

    /// Position on [`BUILD_RATING_CLASS_ORDER`]
    pub fn order_index(&self) -> Option<usize> {
        BUILD_RATING_CLASS_ORDER.iter().position(|c| c == self)
    }

    /// Lettered table ratings and the generic `table_rated`
    pub fn is_table(&self) -> bool {
        matches!(self.order_index(), Some(i) if i >= BASE_RATING_CLASSES.len())
    }
}

/// Inclusive range; a missing bound is open
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RatingRange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

impl RatingRange {
    pub fn up_to(max: f64) -> Self {
        Self { min: None, max: Some(max) }
    }

    pub fn between(min: f64, max: f64) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
        }
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min.unwrap_or(0.0) && value <= self.max.unwrap_or(f64::INFINITY)
    }
}

/// Range per rating class; weights in pounds or BMI values
pub type RatingRanges = BTreeMap<BuildRatingClass, RatingRange>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildChartRow {
    pub height_inches: u32,
    pub weight_ranges: RatingRanges,
}

impl BuildChartRow {
    pub fn has_base_ranges(&self) -> bool {
        BASE_RATING_CLASSES.iter().any(|c| self.weight_ranges.contains_key(c))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildTableType {
    #[default]
    HeightWeight,
    Bmi,
}

/// One carrier build chart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildChart {
    pub id: String,
    pub carrier_id: String,
    /// `None` is shared by every IMO
    #[serde(default)]
    pub imo_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub table_type: BuildTableType,
    #[serde(default)]
    pub build_data: Vec<BuildChartRow>,
    #[serde(default)]
    pub bmi_data: Option<RatingRanges>,
    #[serde(default)]
    pub is_default: bool,
}

impl BuildChart {
    /// Rating for a client using whichever table this chart carries
    pub fn rate(&self, height_feet: u32, height_inches: u32, weight_lbs: f64) -> BuildRatingLookup {
        lookup_build_rating_unified(
            height_feet,
            height_inches,
            weight_lbs,
            self.table_type,
            Some(self.build_data.as_slice()),
            self.bmi_data.as_ref(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_rating_class_order_and_parse() {
        assert!(BuildRatingClass::Preferred < BuildRatingClass::TableA);
        assert_eq!(BuildRatingClass::parse("TABLE_C").unwrap(), BuildRatingClass::TableC);
        assert_eq!(BuildRatingClass::parse("unknown").unwrap(), BuildRatingClass::Unknown);
        assert!(BuildRatingClass::parse("table_z").is_err());
        assert!(BuildRatingClass::TableRated.is_table());
        assert!(!BuildRatingClass::Standard.is_table());
        assert_eq!(BuildRatingClass::Unknown.order_index(), None);
    }

    #[test]
    fn test_range_bounds_are_inclusive_and_open() {
        let r = RatingRange::between(150.0, 180.0);
        assert!(r.contains(150.0) && r.contains(180.0));
        assert!(!r.contains(180.5));
        assert!(RatingRange::up_to(25.0).contains(0.0));
        assert!(RatingRange::default().contains(999.0));
    }

    #[test]
    fn test_chart_deserializes() {
        let chart: BuildChart = serde_json::from_value(json!({
            "id": "bc-1",
            "carrier_id": "c1",
            "table_type": "bmi",
            "bmi_data": {"preferred_plus": {"max": 25.0}, "table_b": {"min": 33.0, "max": 36.0}},
            "is_default": true
        }))
        .unwrap();
        assert_eq!(chart.table_type, BuildTableType::Bmi);
        let bmi = chart.bmi_data.unwrap();
        assert_eq!(bmi[&BuildRatingClass::TableB].min, Some(33.0));
        assert!(chart.imo_id.is_none());
    }
}
