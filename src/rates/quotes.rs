//! Side-by-side quotes at alternative face amounts

use super::interpolate::{estimate_premium, PremiumQuery};
use super::matrix::PremiumMatrix;
use serde::{Deserialize, Serialize};

/// Multipliers of the requested amount offered for comparison
const COMPARISON_MULTIPLIERS: [f64; 5] = [0.5, 0.75, 1.0, 1.5, 2.0];

/// Comparison amounts are rounded to this increment
const FACE_ROUNDING: f64 = 5_000.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlternativeQuote {
    pub face_amount: f64,
    pub monthly_premium: f64,
    pub cost_per_thousand: f64,
}

/// Premium per $1,000 of coverage
pub fn cost_per_thousand(premium: f64, face_amount: f64) -> Option<f64> {
    (face_amount > 0.0).then(|| premium / (face_amount / 1000.0))
}

/// Amounts around the request worth quoting, clamped to the product limits.
///
/// Multiples of the request are rounded to the nearest $5,000; the request
/// itself is always kept as given.
pub fn comparison_face_amounts(requested: f64, min_face: Option<f64>, max_face: f64) -> Vec<f64> {
    let min = min_face.unwrap_or(0.0);
    let max = max_face.max(min);

    let mut amounts: Vec<f64> = COMPARISON_MULTIPLIERS
        .iter()
        .map(|&m| {
            if m == 1.0 {
                requested
            } else {
                (requested * m / FACE_ROUNDING).round() * FACE_ROUNDING
            }
        })
        .map(|amount| amount.clamp(min, max))
        .filter(|amount| *amount > 0.0)
        .collect();

    amounts.sort_by(|a, b| a.total_cmp(b));
    amounts.dedup();
    amounts
}

/// The user's own comparison amounts that fit the product, or the request
/// clamped into the product range when none fit
pub fn fit_face_amounts(user_amounts: &[f64], requested: f64, min_face: Option<f64>, max_face: f64) -> Vec<f64> {
    let min = min_face.unwrap_or(0.0);
    let mut amounts: Vec<f64> = user_amounts
        .iter()
        .copied()
        .filter(|a| *a >= min && *a <= max_face)
        .collect();

    if amounts.is_empty() {
        return vec![requested.max(min).min(max_face)];
    }
    amounts.sort_by(|a, b| a.total_cmp(b));
    amounts
}

/// Quote every amount at the class and term in `base`; misses are skipped
pub fn calculate_alternative_quotes(
    matrix: &PremiumMatrix,
    face_amounts: &[f64],
    base: &PremiumQuery,
    guardrail: f64,
) -> Vec<AlternativeQuote> {
    face_amounts
        .iter()
        .filter_map(|&face_amount| {
            let premium = estimate_premium(matrix, &base.with_face(face_amount), guardrail)?;
            Some(AlternativeQuote {
                face_amount,
                monthly_premium: premium,
                cost_per_thousand: cost_per_thousand(premium, face_amount)?,
            })
        })
        .collect()
}
