//! Rating lookups against build charts and improvement guidance

use super::{BuildChartRow, BuildRatingClass, BuildTableType, RatingRanges, BUILD_RATING_CLASS_ORDER};
use crate::client::calculate_bmi;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildRatingLookup {
    pub rating_class: BuildRatingClass,
    pub has_table: bool,
    /// Upper limit of the next better class that the client is over
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threshold_exceeded: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threshold_class: Option<BuildRatingClass>,
}

impl BuildRatingLookup {
    fn no_table() -> Self {
        Self::unknown(false)
    }

    fn unknown(has_table: bool) -> Self {
        Self {
            rating_class: BuildRatingClass::Unknown,
            has_table,
            threshold_exceeded: None,
            threshold_class: None,
        }
    }

    fn rated(rating_class: BuildRatingClass, threshold: Option<(Option<f64>, BuildRatingClass)>) -> Self {
        Self {
            rating_class,
            has_table: true,
            threshold_exceeded: threshold.and_then(|(limit, _)| limit),
            threshold_class: threshold.map(|(_, class)| class),
        }
    }
}

fn max_of(ranges: &RatingRanges, class: BuildRatingClass) -> Option<f64> {
    ranges.get(&class).and_then(|r| r.max)
}

/// First class (best to worst) whose range contains `value`; anything past
/// the last range is `table_rated`
fn rate_against(value: f64, ranges: &RatingRanges) -> BuildRatingLookup {
    use BuildRatingClass::*;

    let base = [
        (PreferredPlus, None),
        (Preferred, Some(PreferredPlus)),
        (StandardPlus, Some(Preferred)),
        (Standard, Some(StandardPlus)),
    ];
    for (class, better) in base {
        if ranges.get(&class).is_some_and(|r| r.contains(value)) {
            return BuildRatingLookup::rated(class, better.map(|b| (max_of(ranges, b), b)));
        }
    }

    let standard_max = max_of(ranges, Standard);
    let mut previous = Standard;
    for class in BUILD_RATING_CLASS_ORDER.iter().copied().filter(|c| c.is_table() && *c != TableRated) {
        let Some(range) = ranges.get(&class) else {
            continue;
        };
        if range.contains(value) {
            return BuildRatingLookup::rated(class, Some((standard_max, previous)));
        }
        previous = class;
    }

    BuildRatingLookup::rated(TableRated, Some((standard_max, previous)))
}

/// Exact height, else the shortest/tallest row when outside the chart, else
/// the nearest row (the shorter one on ties)
fn find_row_for_height(height_inches: u32, rows: &[BuildChartRow]) -> Option<&BuildChartRow> {
    let mut sorted: Vec<&BuildChartRow> = rows.iter().collect();
    sorted.sort_by_key(|r| r.height_inches);

    let first = *sorted.first()?;
    let last = *sorted.last()?;
    if let Some(exact) = sorted.iter().find(|r| r.height_inches == height_inches) {
        return Some(*exact);
    }
    if height_inches < first.height_inches {
        return Some(first);
    }
    if height_inches > last.height_inches {
        return Some(last);
    }
    sorted
        .into_iter()
        .min_by_key(|r| r.height_inches.abs_diff(height_inches))
}

/// Rating from a height/weight chart
pub fn lookup_build_rating(
    height_feet: u32,
    height_inches: u32,
    weight_lbs: f64,
    rows: Option<&[BuildChartRow]>,
) -> BuildRatingLookup {
    let Some(rows) = rows.filter(|r| !r.is_empty()) else {
        return BuildRatingLookup::no_table();
    };

    match find_row_for_height(height_feet * 12 + height_inches, rows) {
        Some(row) if row.has_base_ranges() => rate_against(weight_lbs, &row.weight_ranges),
        _ => BuildRatingLookup::unknown(true),
    }
}

/// Rating from a BMI chart
pub fn lookup_bmi_rating(
    height_feet: u32,
    height_inches: u32,
    weight_lbs: f64,
    ranges: Option<&RatingRanges>,
) -> BuildRatingLookup {
    let Some(ranges) = ranges else {
        return BuildRatingLookup::no_table();
    };
    if ranges.is_empty() {
        return BuildRatingLookup::unknown(true);
    }

    let bmi = calculate_bmi(height_feet as f64, height_inches as f64, weight_lbs);
    if bmi <= 0.0 {
        return BuildRatingLookup::unknown(true);
    }
    rate_against(bmi, ranges)
}

pub fn lookup_build_rating_unified(
    height_feet: u32,
    height_inches: u32,
    weight_lbs: f64,
    table_type: BuildTableType,
    build_data: Option<&[BuildChartRow]>,
    bmi_data: Option<&RatingRanges>,
) -> BuildRatingLookup {
    match table_type {
        BuildTableType::Bmi => lookup_bmi_rating(height_feet, height_inches, weight_lbs, bmi_data),
        BuildTableType::HeightWeight => lookup_build_rating(height_feet, height_inches, weight_lbs, build_data),
    }
}

fn normalize_rating(rating: &str) -> String {
    rating
        .trim()
        .to_ascii_lowercase()
        .split(|c: char| c.is_whitespace() || c == '_' || c == '-')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("_")
}

/// Whether a free-text rating agrees with the build rating to within one tier
pub fn ratings_match(predicted: &str, build_rating: BuildRatingClass) -> bool {
    let normalized = normalize_rating(predicted);
    if normalized == build_rating.as_str() {
        return true;
    }

    let predicted_index = BUILD_RATING_CLASS_ORDER.iter().position(|c| c.as_str() == normalized);
    match (predicted_index, build_rating.order_index()) {
        (Some(a), Some(b)) => a.abs_diff(b) <= 1,
        _ => false,
    }
}

/// Note for the agent when the build chart disagrees with a predicted class
pub fn get_rating_comparison_message(predicted: &str, build_rating: BuildRatingClass) -> Option<String> {
    if build_rating == BuildRatingClass::Unknown || ratings_match(predicted, build_rating) {
        return None;
    }

    let normalized = normalize_rating(predicted);
    let predicted_index = BUILD_RATING_CLASS_ORDER.iter().position(|c| c.as_str() == normalized);
    let label = build_rating.as_str().replace('_', " ");
    let less_favorable = match (build_rating.order_index(), predicted_index) {
        (Some(build), Some(predicted)) => build > predicted,
        (Some(_), None) => true,
        _ => false,
    };

    Some(if less_favorable {
        format!("Build table indicates {} (less favorable than predicted)", label)
    } else {
        format!("Build table indicates {} (more favorable than predicted)", label)
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeightGuidance {
    pub current_rating: BuildRatingClass,
    pub next_better_rating: Option<BuildRatingClass>,
    /// Pounds to lose; `None` when unknown or nothing to lose
    pub weight_to_next_rating: Option<f64>,
    pub max_weight_for_next_rating: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BmiGuidance {
    pub current_rating: BuildRatingClass,
    pub current_bmi: f64,
    pub next_better_rating: Option<BuildRatingClass>,
    /// Rounded to 0.1
    pub bmi_to_next_rating: Option<f64>,
    pub max_bmi_for_next_rating: Option<f64>,
}

fn next_better(rating: BuildRatingClass) -> Option<BuildRatingClass> {
    let index = rating.order_index()?;
    index.checked_sub(1).map(|i| BUILD_RATING_CLASS_ORDER[i])
}

/// Only base classes have a meaningful "max to qualify"
fn base_max(ranges: &RatingRanges, class: BuildRatingClass) -> Option<f64> {
    if class.is_table() {
        return None;
    }
    max_of(ranges, class)
}

/// How much weight to lose to reach the next better rating
pub fn get_weight_guidance(
    height_feet: u32,
    height_inches: u32,
    weight_lbs: f64,
    rows: Option<&[BuildChartRow]>,
) -> Option<WeightGuidance> {
    let current = lookup_build_rating(height_feet, height_inches, weight_lbs, rows);
    if !current.has_table || current.rating_class == BuildRatingClass::Unknown {
        return None;
    }

    let Some(next) = next_better(current.rating_class) else {
        return Some(WeightGuidance {
            current_rating: current.rating_class,
            next_better_rating: None,
            weight_to_next_rating: None,
            max_weight_for_next_rating: None,
        });
    };

    let row = find_row_for_height(height_feet * 12 + height_inches, rows?)?;
    let max_for_next = base_max(&row.weight_ranges, next);

    Some(WeightGuidance {
        current_rating: current.rating_class,
        next_better_rating: Some(next),
        weight_to_next_rating: max_for_next.map(|m| weight_lbs - m).filter(|d| *d > 0.0),
        max_weight_for_next_rating: max_for_next,
    })
}

/// How far BMI must drop to reach the next better rating
pub fn get_bmi_guidance(
    height_feet: u32,
    height_inches: u32,
    weight_lbs: f64,
    ranges: Option<&RatingRanges>,
) -> Option<BmiGuidance> {
    let current = lookup_bmi_rating(height_feet, height_inches, weight_lbs, ranges);
    if !current.has_table || current.rating_class == BuildRatingClass::Unknown {
        return None;
    }
    let current_bmi = calculate_bmi(height_feet as f64, height_inches as f64, weight_lbs);

    let Some(next) = next_better(current.rating_class) else {
        return Some(BmiGuidance {
            current_rating: current.rating_class,
            current_bmi,
            next_better_rating: None,
            bmi_to_next_rating: None,
            max_bmi_for_next_rating: None,
        });
    };

    let max_for_next = ranges.and_then(|r| base_max(r, next));
    Some(BmiGuidance {
        current_rating: current.rating_class,
        current_bmi,
        next_better_rating: Some(next),
        bmi_to_next_rating: max_for_next
            .map(|m| current_bmi - m)
            .filter(|d| *d > 0.0)
            .map(|d| (d * 10.0).round() / 10.0),
        max_bmi_for_next_rating: max_for_next,
    })
}
