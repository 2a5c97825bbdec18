//! Stage 4: scoring and picking the recommendations

use super::types::{EligibilityStatus, EvaluatedProduct, Recommendation, RecommendationReason, ScoreComponents};
use crate::config::EngineConfig;
use std::cmp::Ordering;
use std::collections::HashSet;

/// Score inputs for one product.
///
/// The price score is relative to the most expensive product of the batch
/// (0.5 without a premium or batch maximum). Unknown-eligibility products are
/// discounted by how much follow-up data they are missing.
pub fn calculate_score(
    likelihood: f64,
    premium: Option<f64>,
    max_premium: f64,
    status: EligibilityStatus,
    data_confidence: f64,
    config: &EngineConfig,
) -> ScoreComponents {
    let price_score = match premium {
        Some(p) if max_premium > 0.0 => 1.0 - p / max_premium,
        _ => 0.5,
    };
    let floor = config.unknown_confidence_floor;
    let confidence_multiplier = match status {
        EligibilityStatus::Unknown => floor + data_confidence * (1.0 - floor),
        _ => 1.0,
    };

    ScoreComponents {
        likelihood,
        price_score,
        data_confidence,
        confidence_multiplier,
    }
}

pub fn final_score(components: &ScoreComponents, config: &EngineConfig) -> f64 {
    let raw = components.likelihood * config.approval_weight + components.price_score * config.price_weight;
    raw * components.confidence_multiplier
}

/// Recompute every score against the batch's most expensive premium
pub fn rescore(products: &mut [EvaluatedProduct], config: &EngineConfig) {
    let max_premium = products.iter().filter_map(|p| p.premium).fold(0.0, f64::max);
    for product in products.iter_mut() {
        product.score_components = calculate_score(
            product.approval.likelihood,
            product.premium,
            max_premium,
            product.eligibility.status,
            product.eligibility.confidence,
            config,
        );
        product.final_score = final_score(&product.score_components, config);
    }
}

fn by_score_desc(a: &EvaluatedProduct, b: &EvaluatedProduct) -> Ordering {
    b.final_score.total_cmp(&a.final_score)
}

/// Eligible, priced products ranked into labelled picks.
///
/// Best value (top score) first, then the cheapest, best approval odds and
/// most coverage, each skipping products already picked.
pub fn select_recommendations(products: &[EvaluatedProduct], limit: usize) -> Vec<Recommendation> {
    let mut ranked: Vec<&EvaluatedProduct> = products
        .iter()
        .filter(|p| p.eligibility.status == EligibilityStatus::Eligible && p.premium.is_some())
        .collect();
    ranked.sort_by(|a, b| by_score_desc(a, b));

    let premium = |p: &EvaluatedProduct| p.premium.unwrap_or(f64::INFINITY);
    let mut by_price = ranked.clone();
    by_price.sort_by(|a, b| premium(*a).total_cmp(&premium(*b)));
    let mut by_approval = ranked.clone();
    by_approval.sort_by(|a, b| b.approval.likelihood.total_cmp(&a.approval.likelihood));
    let mut by_coverage = ranked.clone();
    by_coverage.sort_by(|a, b| b.max_coverage.total_cmp(&a.max_coverage));

    let picks = [
        (RecommendationReason::BestValue, &ranked),
        (RecommendationReason::Cheapest, &by_price),
        (RecommendationReason::BestApproval, &by_approval),
        (RecommendationReason::HighestCoverage, &by_coverage),
    ];

    let mut seen: HashSet<&str> = HashSet::new();
    let mut recommendations = Vec::new();
    for (reason, ordering) in picks {
        if recommendations.len() >= limit {
            break;
        }
        let Some(pick) = ordering.iter().find(|p| !seen.contains(p.product.product_id.as_str())) else {
            continue;
        };
        seen.insert(pick.product.product_id.as_str());
        if let Some(rec) = Recommendation::from_evaluated(pick, reason) {
            recommendations.push(rec);
        }
    }
    recommendations
}

/// Eligible products with a premium, best score first
pub fn rank_eligible(products: &[EvaluatedProduct]) -> Vec<EvaluatedProduct> {
    let mut eligible: Vec<EvaluatedProduct> = products
        .iter()
        .filter(|p| p.eligibility.status == EligibilityStatus::Eligible && p.premium.is_some())
        .cloned()
        .collect();
    eligible.sort_by(by_score_desc);
    eligible
}

/// Unknown-eligibility products, best score first
pub fn rank_unknown(products: &[EvaluatedProduct]) -> Vec<EvaluatedProduct> {
    let mut unknown: Vec<EvaluatedProduct> = products
        .iter()
        .filter(|p| p.eligibility.status == EligibilityStatus::Unknown)
        .cloned()
        .collect();
    unknown.sort_by(by_score_desc);
    unknown
}
