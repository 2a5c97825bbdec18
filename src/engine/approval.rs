//! Stage 2: approval likelihood and health class for one product.
//!
//! Carriers with underwriting rule sets are evaluated with the rule engine;
//! carriers without them can fall back to flat per-condition acceptance rules.

use super::types::{ApprovalResult, ConditionDecision};
use crate::build_chart::BuildRatingClass;
use crate::client::ClientProfile;
use crate::config::EngineConfig;
use crate::products::{AcceptanceDecision, ProductCandidate, ProductCatalog};
use crate::rates::RateClass;
use crate::rules::{
    aggregate_outcomes, evaluate_rule_set, generate_input_hash, ConditionOutcome, FactMap,
    FlatExtraComposition, RuleEligibility, RuleHealthClass, RuleSetScope, UnderwritingRuleSet,
};
use chrono::NaiveDate;
use log::debug;
use std::collections::HashMap;

/// Cap on overall likelihood when every condition is fully eligible
const MAX_LIKELIHOOD: f64 = 0.95;

/// Likelihood used when an acceptance rule does not state one
const DEFAULT_ACCEPTANCE_LIKELIHOOD: f64 = 0.5;

fn decision_for(eligibility: RuleEligibility, table_units: u32) -> AcceptanceDecision {
    match eligibility {
        RuleEligibility::Ineligible => AcceptanceDecision::Declined,
        RuleEligibility::Refer | RuleEligibility::Unknown => AcceptanceDecision::CaseByCase,
        RuleEligibility::Eligible if table_units > 0 => AcceptanceDecision::TableRated,
        RuleEligibility::Eligible => AcceptanceDecision::Approved,
    }
}

fn likelihood_for(eligibility: RuleEligibility) -> f64 {
    match eligibility {
        RuleEligibility::Eligible => 0.9,
        RuleEligibility::Refer => 0.6,
        RuleEligibility::Unknown => 0.5,
        RuleEligibility::Ineligible => 0.0,
    }
}

/// Rule-engine class to the class premiums are looked up with
fn rate_class_for(class: RuleHealthClass) -> RateClass {
    match class {
        RuleHealthClass::PreferredPlus => RateClass::PreferredPlus,
        RuleHealthClass::Preferred => RateClass::Preferred,
        RuleHealthClass::StandardPlus => RateClass::StandardPlus,
        RuleHealthClass::Standard => RateClass::Standard,
        RuleHealthClass::Substandard => RateClass::TableRated,
        RuleHealthClass::Refer | RuleHealthClass::Decline | RuleHealthClass::Unknown => RateClass::Standard,
    }
}

fn no_rule_set_outcome(condition_code: &str) -> ConditionOutcome {
    ConditionOutcome {
        condition_code: condition_code.to_string(),
        eligibility: RuleEligibility::Unknown,
        health_class: RuleHealthClass::Unknown,
        table_units: 0,
        flat_extra: None,
        concerns: vec![format!(
            "{}: no approved rule set found - manual review required",
            condition_code
        )],
        matched_rules: Vec::new(),
        missing_fields: Vec::new(),
    }
}

/// Worst outcome over every applicable global rule set
fn fold_global_outcomes(outcomes: Vec<ConditionOutcome>) -> Option<ConditionOutcome> {
    outcomes.into_iter().reduce(|worst, current| {
        let agg = aggregate_outcomes(vec![worst, current], None, FlatExtraComposition::Max);
        ConditionOutcome {
            condition_code: "global".to_string(),
            eligibility: agg.eligibility,
            health_class: agg.health_class,
            table_units: agg.table_units,
            flat_extra: agg.flat_extras.into_iter().next(),
            concerns: agg.concerns,
            matched_rules: agg.matched_rules,
            missing_fields: agg.missing_fields,
        }
    })
}

/// Highest version wins; the first listed wins a tie
fn latest_by_condition<'a>(sets: &[&'a UnderwritingRuleSet]) -> HashMap<&'a str, &'a UnderwritingRuleSet> {
    let mut latest: HashMap<&str, &UnderwritingRuleSet> = HashMap::new();
    for rs in sets {
        let Some(code) = rs.condition_code.as_deref() else {
            log::warn!("Condition-scoped rule set {} has no condition code - skipping", rs.id);
            continue;
        };
        match latest.get(code) {
            Some(existing) if existing.version >= rs.version => {}
            _ => {
                latest.insert(code, rs);
            }
        }
    }
    latest
}

/// Approval from the carrier's rule sets.
///
/// Global sets are folded to their worst outcome; each client condition is
/// evaluated against the latest set for its code, or marked unknown when the
/// carrier has none. `as_of` anchors date tests in the rules.
pub fn calculate_approval_v2(
    catalog: &ProductCatalog,
    product: &ProductCandidate,
    imo_id: &str,
    client: &ClientProfile,
    as_of: NaiveDate,
    composition: FlatExtraComposition,
) -> ApprovalResult {
    if client.health_conditions.is_empty() {
        return ApprovalResult::no_conditions();
    }

    let facts = FactMap::build(client, as_of);
    let global_sets = catalog.rule_sets_for(&product.carrier_id, &product.product_id, imo_id, RuleSetScope::Global);
    let condition_sets: Vec<&UnderwritingRuleSet> = catalog
        .rule_sets_for(&product.carrier_id, &product.product_id, imo_id, RuleSetScope::Condition)
        .into_iter()
        .filter(|rs| {
            rs.condition_code
                .as_ref()
                .map_or(true, |code| client.health_conditions.contains(code))
        })
        .collect();

    let mut evaluated_rule_sets: Vec<String> = global_sets.iter().map(|rs| format!("global:{}", rs.name)).collect();
    evaluated_rule_sets.extend(condition_sets.iter().filter_map(|rs| {
        rs.condition_code
            .as_ref()
            .map(|code| format!("condition:{}:{}", code, rs.name))
    }));

    let global_outcome = fold_global_outcomes(global_sets.iter().map(|rs| evaluate_rule_set(rs, &facts)).collect());

    let latest = latest_by_condition(&condition_sets);
    let condition_outcomes: Vec<ConditionOutcome> = client
        .health_conditions
        .iter()
        .map(|code| match latest.get(code.as_str()) {
            Some(rs) => evaluate_rule_set(rs, &facts),
            None => no_rule_set_outcome(code),
        })
        .collect();

    let input_hash = generate_input_hash(&facts);
    for outcome in &condition_outcomes {
        let predicate_result = match outcome.eligibility {
            RuleEligibility::Eligible => "matched",
            RuleEligibility::Ineligible => "failed",
            _ => "unknown",
        };
        debug!(
            "Rule audit product={} condition={} rule_set={} result={} eligibility={} health_class={} table_units={} matched_rules={} missing_fields={} input_hash={}",
            product.product_id,
            outcome.condition_code,
            latest.get(outcome.condition_code.as_str()).map_or("none", |rs| rs.id.as_str()),
            predicate_result,
            outcome.eligibility.as_str(),
            outcome.health_class.as_str(),
            outcome.table_units,
            outcome.matched_rules.len(),
            outcome.missing_fields.len(),
            input_hash
        );
    }

    let condition_decisions: Vec<ConditionDecision> = condition_outcomes
        .iter()
        .map(|o| ConditionDecision {
            condition_code: o.condition_code.clone(),
            decision: decision_for(o.eligibility, o.table_units),
            likelihood: likelihood_for(o.eligibility),
            health_class_result: (o.health_class != RuleHealthClass::Unknown).then(|| o.health_class.as_str().to_string()),
            concerns: o.concerns.clone(),
            missing_fields: o.missing_fields.iter().map(|m| m.field.clone()).collect(),
        })
        .collect();

    let aggregated = aggregate_outcomes(condition_outcomes, global_outcome, composition);
    let likelihood = if aggregated.eligibility == RuleEligibility::Ineligible {
        0.0
    } else {
        condition_decisions
            .iter()
            .map(|d| d.likelihood)
            .fold(MAX_LIKELIHOOD, f64::min)
    };

    ApprovalResult {
        likelihood,
        health_class: rate_class_for(aggregated.health_class),
        condition_decisions,
        concerns: aggregated.concerns,
        evaluated_rule_sets,
    }
}

/// Approval from per-condition acceptance rules
pub fn calculate_approval_legacy(
    catalog: &ProductCatalog,
    product: &ProductCandidate,
    imo_id: &str,
    health_conditions: &[String],
) -> ApprovalResult {
    if health_conditions.is_empty() {
        return ApprovalResult::no_conditions();
    }

    let mut decisions = Vec::with_capacity(health_conditions.len());
    let mut concerns = Vec::new();

    for code in health_conditions {
        match catalog.acceptance_for(product, code, imo_id) {
            Some(rule) => {
                match rule.acceptance {
                    AcceptanceDecision::Declined => concerns.push(format!("{}: declined", code)),
                    AcceptanceDecision::CaseByCase => concerns.push(format!("{}: requires review", code)),
                    AcceptanceDecision::TableRated => concerns.push(format!("{}: table rated", code)),
                    AcceptanceDecision::Approved => {}
                }
                decisions.push(ConditionDecision {
                    condition_code: code.clone(),
                    decision: rule.acceptance,
                    likelihood: rule.approval_likelihood.unwrap_or(DEFAULT_ACCEPTANCE_LIKELIHOOD),
                    health_class_result: rule.health_class_result.clone(),
                    concerns: Vec::new(),
                    missing_fields: Vec::new(),
                });
            }
            None => {
                concerns.push(format!("{}: no rule found", code));
                decisions.push(ConditionDecision {
                    condition_code: code.clone(),
                    decision: AcceptanceDecision::CaseByCase,
                    likelihood: DEFAULT_ACCEPTANCE_LIKELIHOOD,
                    health_class_result: None,
                    concerns: Vec::new(),
                    missing_fields: Vec::new(),
                });
            }
        }
    }

    if decisions.iter().any(|d| d.decision == AcceptanceDecision::Declined) {
        return ApprovalResult {
            likelihood: 0.0,
            health_class: RateClass::Standard,
            condition_decisions: decisions,
            concerns,
            evaluated_rule_sets: Vec::new(),
        };
    }

    let likelihood = decisions.iter().map(|d| d.likelihood).fold(f64::INFINITY, f64::min);
    let health_class = determine_health_class(&decisions);
    ApprovalResult {
        likelihood,
        health_class,
        condition_decisions: decisions,
        concerns,
        evaluated_rule_sets: Vec::new(),
    }
}

/// Rule sets when the carrier has them, else acceptance rules if allowed
pub fn calculate_approval(
    catalog: &ProductCatalog,
    product: &ProductCandidate,
    imo_id: &str,
    client: &ClientProfile,
    config: &EngineConfig,
    as_of: NaiveDate,
) -> ApprovalResult {
    if config.legacy_acceptance_fallback && !catalog.has_rule_sets(&product.carrier_id, &product.product_id, imo_id) {
        debug!("No rule sets for {}; using acceptance rules", product.product_name);
        return calculate_approval_legacy(catalog, product, imo_id, &client.health_conditions);
    }
    calculate_approval_v2(catalog, product, imo_id, client, as_of, config.flat_extra_composition)
}

/// Worst class named by the decisions; `table_*` results count as table rated
/// and unrecognized or absent results are ignored
pub fn determine_health_class(decisions: &[ConditionDecision]) -> RateClass {
    decisions
        .iter()
        .filter_map(|d| d.health_class_result.as_deref())
        .filter_map(|result| {
            if result.starts_with("table_") {
                Some(RateClass::TableRated)
            } else {
                RateClass::parse(result).ok().filter(RateClass::is_rateable)
            }
        })
        .max_by_key(|c| c.ladder_index())
        .unwrap_or(RateClass::PreferredPlus)
}

/// Severity of a build rating on the rate-class scale: preferred_plus 0 ..
/// standard 3, every table rating 4. `unknown` counts as standard.
pub fn health_class_severity(build: BuildRatingClass) -> usize {
    match build {
        BuildRatingClass::Unknown => 3,
        other => other.order_index().map_or(3, |i| i.min(4)),
    }
}

fn rate_class_severity(class: RateClass) -> usize {
    class.ladder_index().unwrap_or(3)
}

/// The build chart is a floor on the class: the rule class stands unless the
/// build rating is worse, in which case the build rating's class is used
pub fn apply_build_constraint(rule_class: RateClass, build: BuildRatingClass) -> RateClass {
    if health_class_severity(build) <= rate_class_severity(rule_class) {
        return rule_class;
    }
    match build {
        BuildRatingClass::PreferredPlus => RateClass::PreferredPlus,
        BuildRatingClass::Preferred => RateClass::Preferred,
        BuildRatingClass::StandardPlus => RateClass::StandardPlus,
        BuildRatingClass::Standard | BuildRatingClass::Unknown => RateClass::Standard,
        _ => RateClass::TableRated,
    }
}
