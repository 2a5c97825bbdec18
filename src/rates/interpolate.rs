//! Premium lookup over a product's rate grid.
//!
//! Rates are never extrapolated: an age or face amount outside the rows of the
//! selected rate cell is a miss, including single-face grids. Inside the grid
//! a premium is read exactly or estimated by bilinear interpolation between
//! the bracketing ages and face amounts.
//!
//! When the requested class has no usable rates the lookup walks
//! [`RATE_CLASS_LADDER`] toward worse classes and reports which class it used.

use super::matrix::{PremiumMatrix, PremiumMatrixRow, RateClass, TobaccoClass, RATE_CLASS_LADDER};
use crate::client::Gender;
use log::warn;
use serde::Serialize;

/// Monthly premiums above this are treated as bad data
pub const PREMIUM_GUARDRAIL: f64 = 100_000.0;

/// One rate cell request: who, how much, which class and term
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PremiumQuery {
    pub age: u32,
    pub face_amount: f64,
    pub gender: Gender,
    pub tobacco_class: TobaccoClass,
    pub health_class: RateClass,
    /// `None` selects permanent (termless) rows
    pub term_years: Option<u32>,
}

impl PremiumQuery {
    pub fn with_class(&self, health_class: RateClass) -> Self {
        Self { health_class, ..*self }
    }

    pub fn with_face(&self, face_amount: f64) -> Self {
        Self { face_amount, ..*self }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PremiumMissReason {
    NoMatrix,
    NonRateableClass,
    NoMatchingRates,
}

impl PremiumMissReason {
    pub fn describe(&self) -> &'static str {
        match self {
            PremiumMissReason::NoMatrix => "No premium matrix data",
            PremiumMissReason::NonRateableClass => "Health class is non-rateable (decline/refer)",
            PremiumMissReason::NoMatchingRates => "No matching rates after fallback",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PremiumLookup {
    #[serde(rename_all = "camelCase")]
    Found {
        premium: f64,
        requested: RateClass,
        used: RateClass,
        was_exact: bool,
        term_years: Option<u32>,
    },
    NotFound { reason: PremiumMissReason },
}

impl PremiumLookup {
    pub fn premium(&self) -> Option<f64> {
        match self {
            PremiumLookup::Found { premium, .. } => Some(*premium),
            PremiumLookup::NotFound { .. } => None,
        }
    }

    pub fn used_class(&self) -> Option<RateClass> {
        match self {
            PremiumLookup::Found { used, .. } => Some(*used),
            PremiumLookup::NotFound { .. } => None,
        }
    }
}

/// Premium with class fallback, using the default guardrail
pub fn interpolate_premium(matrix: &PremiumMatrix, query: &PremiumQuery) -> PremiumLookup {
    interpolate_premium_with_guardrail(matrix, query, PREMIUM_GUARDRAIL)
}

pub fn interpolate_premium_with_guardrail(
    matrix: &PremiumMatrix,
    query: &PremiumQuery,
    guardrail: f64,
) -> PremiumLookup {
    if matrix.is_empty() {
        return PremiumLookup::NotFound {
            reason: PremiumMissReason::NoMatrix,
        };
    }
    let Some(start) = query.health_class.ladder_index() else {
        return PremiumLookup::NotFound {
            reason: PremiumMissReason::NonRateableClass,
        };
    };

    for &class in &RATE_CLASS_LADDER[start..] {
        if let Some(premium) = estimate_premium(matrix, &query.with_class(class), guardrail) {
            return PremiumLookup::Found {
                premium,
                requested: query.health_class,
                used: class,
                was_exact: class == query.health_class,
                term_years: query.term_years,
            };
        }
    }

    PremiumLookup::NotFound {
        reason: PremiumMissReason::NoMatchingRates,
    }
}

/// Premium for exactly the queried class, no fallback.
///
/// `None` when the class has no rows, the point lies outside the grid, or the
/// resulting premium fails validation.
pub fn estimate_premium(matrix: &PremiumMatrix, query: &PremiumQuery, guardrail: f64) -> Option<f64> {
    let rows = matrix.rows_for(
        query.gender,
        query.tobacco_class,
        query.health_class,
        query.term_years,
    );
    if rows.is_empty() {
        return None;
    }
    let raw = interpolate_rows(&rows, query.age, query.face_amount)?;
    validate_premium(raw, query, guardrail)
}

/// Strict key lookup, no interpolation and no validation
pub fn get_exact_premium(matrix: &PremiumMatrix, query: &PremiumQuery) -> Option<f64> {
    matrix
        .rows_for(
            query.gender,
            query.tobacco_class,
            query.health_class,
            query.term_years,
        )
        .into_iter()
        .find(|r| r.age == query.age && r.face_amount == query.face_amount)
        .map(|r| r.monthly_premium)
}

fn lerp(x: f64, x0: f64, x1: f64, y0: f64, y1: f64) -> f64 {
    if x1 == x0 {
        return y0;
    }
    y0 + (x - x0) * (y1 - y0) / (x1 - x0)
}

/// Nearest grid values at or below and at or above `value`.
/// Callers have already range-checked `value` against `sorted`.
fn find_bounds(value: f64, sorted: &[f64]) -> (f64, f64) {
    let lower = sorted.iter().copied().filter(|v| *v <= value).fold(sorted[0], f64::max);
    let upper = sorted
        .iter()
        .copied()
        .filter(|v| *v >= value)
        .fold(sorted[sorted.len() - 1], f64::min);
    (lower, upper)
}

fn distinct_sorted(values: impl Iterator<Item = f64>) -> Vec<f64> {
    let mut values: Vec<f64> = values.collect();
    values.sort_by(|a, b| a.total_cmp(b));
    values.dedup();
    values
}

fn interpolate_rows(rows: &[&PremiumMatrixRow], age: u32, face: f64) -> Option<f64> {
    let cell = |a: f64, f: f64| {
        rows.iter()
            .find(|r| r.age as f64 == a && r.face_amount == f)
            .map(|r| r.monthly_premium)
    };

    let target_age = age as f64;
    if let Some(exact) = cell(target_age, face) {
        return Some(exact);
    }

    let ages = distinct_sorted(rows.iter().map(|r| r.age as f64));
    let faces = distinct_sorted(rows.iter().map(|r| r.face_amount));
    let (min_age, max_age) = (ages[0], ages[ages.len() - 1]);
    let (min_face, max_face) = (faces[0], faces[faces.len() - 1]);

    if target_age < min_age || target_age > max_age {
        warn!("Age {} out of matrix range [{}, {}]", age, min_age, max_age);
        return None;
    }
    if face < min_face || face > max_face {
        warn!("Face ${} out of matrix range [${}, ${}]", face, min_face, max_face);
        return None;
    }

    let (age_lo, age_hi) = find_bounds(target_age, &ages);
    let (face_lo, face_hi) = find_bounds(face, &faces);

    let q11 = cell(age_lo, face_lo);
    let q12 = cell(age_lo, face_hi);
    let q21 = cell(age_hi, face_lo);
    let q22 = cell(age_hi, face_hi);

    let corners: Vec<f64> = [q11, q12, q21, q22].into_iter().flatten().collect();
    let average = || {
        if corners.is_empty() {
            None
        } else {
            Some(corners.iter().sum::<f64>() / corners.len() as f64)
        }
    };
    if corners.len() < 2 {
        return average();
    }

    match (q11, q12, q21, q22) {
        (Some(a), Some(b), Some(c), Some(d)) => {
            let r1 = lerp(face, face_lo, face_hi, a, b);
            let r2 = lerp(face, face_lo, face_hi, c, d);
            Some(lerp(target_age, age_lo, age_hi, r1, r2))
        }
        (Some(a), Some(b), _, _) => Some(lerp(face, face_lo, face_hi, a, b)),
        (_, _, Some(c), Some(d)) => Some(lerp(face, face_lo, face_hi, c, d)),
        (Some(a), _, Some(c), _) => Some(lerp(target_age, age_lo, age_hi, a, c)),
        (_, Some(b), _, Some(d)) => Some(lerp(target_age, age_lo, age_hi, b, d)),
        _ => average(),
    }
}

fn validate_premium(premium: f64, query: &PremiumQuery, guardrail: f64) -> Option<f64> {
    if !premium.is_finite() {
        warn!(
            "Premium for age {} face ${} ({}) is not finite",
            query.age,
            query.face_amount,
            query.health_class.as_str()
        );
        return None;
    }
    if premium <= 0.0 {
        warn!(
            "Non-positive premium {} for age {} face ${} ({})",
            premium,
            query.age,
            query.face_amount,
            query.health_class.as_str()
        );
        return None;
    }
    if premium > guardrail {
        warn!(
            "Premium ${} for age {} face ${} exceeds guardrail ${}",
            premium, query.age, query.face_amount, guardrail
        );
        return None;
    }
    Some(premium)
}
