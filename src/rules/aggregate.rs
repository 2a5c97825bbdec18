//! Combine per-condition outcomes into one product-level decision

use super::dsl::{FlatExtraComposition, RuleEligibility, RuleHealthClass, TableRating};
use super::evaluator::{ConditionOutcome, FlatExtra, MatchedRule, MissingField};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedOutcome {
    pub eligibility: RuleEligibility,
    pub health_class: RuleHealthClass,
    pub table_rating: TableRating,
    pub table_units: u32,
    pub flat_extras: Vec<FlatExtra>,
    pub total_flat_extra_per_thousand: f64,
    pub max_flat_extra_duration: u32,
    pub concerns: Vec<String>,
    pub matched_rules: Vec<MatchedRule>,
    pub missing_fields: Vec<MissingField>,
    pub global_outcome: Option<ConditionOutcome>,
    pub condition_outcomes: Vec<ConditionOutcome>,
}

fn push_unique(concerns: &mut Vec<String>, items: &[String]) {
    for item in items {
        if !concerns.contains(item) {
            concerns.push(item.clone());
        }
    }
}

/// Per-thousand rate and duration charged for a set of flat extras
fn compose_flat_extras(extras: &[FlatExtra], composition: FlatExtraComposition) -> (f64, u32) {
    if extras.is_empty() {
        return (0.0, 0);
    }

    match composition {
        FlatExtraComposition::Sum => (
            extras.iter().map(|e| e.per_thousand).sum(),
            extras.iter().map(|e| e.years).max().unwrap_or(0),
        ),
        FlatExtraComposition::Max => {
            let mut best = &extras[0];
            for extra in &extras[1..] {
                if extra.per_thousand > best.per_thousand {
                    best = extra;
                }
            }
            (best.per_thousand, best.years)
        }
        FlatExtraComposition::WorstOnly => {
            let cost = |e: &FlatExtra| e.per_thousand * e.years as f64;
            let mut worst = &extras[0];
            for extra in &extras[1..] {
                if cost(extra) > cost(worst) {
                    worst = extra;
                }
            }
            (worst.per_thousand, worst.years)
        }
    }
}

/// Most conservative combination of the condition outcomes.
///
/// An ineligible global outcome decides the product on its own. Otherwise
/// eligibility, health class and table rating each take the worst value seen.
pub fn aggregate_outcomes(
    condition_outcomes: Vec<ConditionOutcome>,
    global: Option<ConditionOutcome>,
    composition: FlatExtraComposition,
) -> AggregatedOutcome {
    if let Some(global) = global.as_ref().filter(|g| g.eligibility == RuleEligibility::Ineligible) {
        return AggregatedOutcome {
            eligibility: RuleEligibility::Ineligible,
            health_class: RuleHealthClass::Decline,
            table_rating: TableRating::None,
            table_units: 0,
            flat_extras: Vec::new(),
            total_flat_extra_per_thousand: 0.0,
            max_flat_extra_duration: 0,
            concerns: global.concerns.clone(),
            matched_rules: global.matched_rules.clone(),
            missing_fields: Vec::new(),
            global_outcome: Some(global.clone()),
            condition_outcomes,
        };
    }

    let mut eligibility = RuleEligibility::Eligible;
    let mut worst_rank = RuleHealthClass::PreferredPlus.rank();
    let mut table_units = 0;
    let mut flat_extras = Vec::new();
    let mut concerns = Vec::new();
    let mut matched_rules = Vec::new();
    let mut missing_fields = Vec::new();

    for outcome in global.iter().chain(condition_outcomes.iter()) {
        eligibility = eligibility.worse(outcome.eligibility);
        worst_rank = worst_rank.max(outcome.health_class.rank());
        table_units = table_units.max(outcome.table_units);
        if let Some(extra) = &outcome.flat_extra {
            flat_extras.push(extra.clone());
        }
        push_unique(&mut concerns, &outcome.concerns);
        matched_rules.extend(outcome.matched_rules.iter().cloned());
        missing_fields.extend(outcome.missing_fields.iter().cloned());
    }

    let (total_flat_extra_per_thousand, max_flat_extra_duration) = compose_flat_extras(&flat_extras, composition);

    AggregatedOutcome {
        eligibility,
        health_class: RuleHealthClass::from_rank(worst_rank),
        table_rating: TableRating::from_units(table_units as i64),
        table_units,
        flat_extras,
        total_flat_extra_per_thousand,
        max_flat_extra_duration,
        concerns,
        matched_rules,
        missing_fields,
        global_outcome: global,
        condition_outcomes,
    }
}
