//! Three-valued predicate evaluation and rule set matching.
//!
//! A test on a missing fact is *unknown* rather than false (unless the
//! condition says `treatNullAs: fail`), and unknowns propagate:
//! - `all`: first failure fails the group, otherwise any unknown makes it
//!   unknown; every missing field is collected.
//! - `any`: first match matches, otherwise any unknown makes it unknown.
//! - `not`: unknown stays unknown, matched and failed swap.

use super::dsl::{
    extract_condition_code, ArrayOperator, BooleanOperator, ConditionTest, DateOperator,
    FieldCondition, NullHandling, NullOperator, NumericOperator, NumericValue, PredicateGroup,
    PredicateNode, PresenceOperator, RuleEligibility, RuleHealthClass, RuleOutcome, SetOperator,
    SetValue, StringOperator, UnderwritingRuleSet,
};
use super::facts::FactMap;
use crate::client::responses::parse_date;
use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum FieldEval {
    Matched,
    Failed(String),
    Unknown(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequiredFor {
    All,
    Any,
}

/// A fact a rule needed but the client did not provide
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MissingField {
    pub field: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition_code: Option<String>,
    pub reason: String,
    pub required_for: RequiredFor,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PredicateResult {
    Matched(Vec<FieldCondition>),
    Failed(Vec<FieldCondition>),
    Unknown(Vec<MissingField>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchedRule {
    pub rule_id: String,
    pub rule_name: String,
    pub rule_set_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition_code: Option<String>,
    pub matched_conditions: Vec<FieldCondition>,
    pub outcome: RuleOutcome,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlatExtra {
    pub per_thousand: f64,
    pub years: u32,
    /// Name of the rule that imposed it
    pub source: String,
}

/// Result of evaluating one rule set (one condition, or the global set)
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionOutcome {
    pub condition_code: String,
    pub eligibility: RuleEligibility,
    pub health_class: RuleHealthClass,
    pub table_units: u32,
    pub flat_extra: Option<FlatExtra>,
    pub concerns: Vec<String>,
    pub matched_rules: Vec<MatchedRule>,
    pub missing_fields: Vec<MissingField>,
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn as_bool(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::String(s) => s == "true" || s == "1",
        Value::Number(n) => n.as_f64() == Some(1.0),
        _ => false,
    }
}

fn as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn number_label(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

fn years_since(date: NaiveDate, as_of: NaiveDate) -> i64 {
    ((as_of - date).num_days() as f64 / 365.25).floor() as i64
}

fn months_since(date: NaiveDate, as_of: NaiveDate) -> i64 {
    (as_of.year() - date.year()) as i64 * 12 + (as_of.month() as i64 - date.month() as i64)
}

fn check(passed: bool, reason: impl FnOnce() -> String) -> FieldEval {
    if passed {
        FieldEval::Matched
    } else {
        FieldEval::Failed(reason())
    }
}

fn evaluate_numeric(field: &str, operator: NumericOperator, expected: &NumericValue, value: &Value) -> FieldEval {
    let Some(num) = as_number(value) else {
        return FieldEval::Failed(format!("{} is not a number", field));
    };
    let shown = number_label(num);

    match (operator, *expected) {
        (NumericOperator::Between, NumericValue::Range(min, max)) => check(num >= min && num <= max, || {
            format!("{} {} not in [{}, {}]", field, shown, number_label(min), number_label(max))
        }),
        (_, NumericValue::Range(..)) => FieldEval::Failed(format!("{} expects a single value", field)),
        (op, NumericValue::Single(e)) => {
            let (passed, negated) = match op {
                NumericOperator::Eq => (num == e, "!="),
                NumericOperator::Neq => (num != e, "=="),
                NumericOperator::Gt => (num > e, "<="),
                NumericOperator::Gte => (num >= e, "<"),
                NumericOperator::Lt => (num < e, ">="),
                NumericOperator::Lte => (num <= e, ">"),
                NumericOperator::Between => {
                    return FieldEval::Failed("between requires [min, max]".to_string())
                }
            };
            check(passed, || format!("{} {} {} {}", field, shown, negated, number_label(e)))
        }
    }
}

fn evaluate_date(field: &str, operator: DateOperator, threshold: u32, value: &Value, as_of: NaiveDate) -> FieldEval {
    let Some(date) = value.as_str().and_then(parse_date) else {
        return FieldEval::Failed(format!("{} is not a valid date", field));
    };
    let threshold = threshold as i64;

    match operator {
        DateOperator::YearsSinceGte => {
            let years = years_since(date, as_of);
            check(years >= threshold, || format!("{} years since {} < {}", years, field, threshold))
        }
        DateOperator::YearsSinceLte => {
            let years = years_since(date, as_of);
            check(years <= threshold, || format!("{} years since {} > {}", years, field, threshold))
        }
        DateOperator::MonthsSinceGte => {
            let months = months_since(date, as_of);
            check(months >= threshold, || format!("{} months since {} < {}", months, field, threshold))
        }
        DateOperator::MonthsSinceLte => {
            let months = months_since(date, as_of);
            check(months <= threshold, || format!("{} months since {} > {}", months, field, threshold))
        }
    }
}

fn evaluate_array(field: &str, operator: ArrayOperator, expected: &[String], value: &Value) -> FieldEval {
    let items: Vec<&str> = value
        .as_array()
        .map(|a| a.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();
    let has = |e: &String| items.contains(&e.as_str());

    match operator {
        ArrayOperator::IsEmpty => check(items.is_empty(), || format!("{} is not empty", field)),
        ArrayOperator::IsNotEmpty => check(!items.is_empty(), || format!("{} is empty", field)),
        ArrayOperator::IncludesAny => check(expected.iter().any(has), || {
            format!("{} doesn't include any of [{}]", field, expected.join(", "))
        }),
        ArrayOperator::IncludesAll => check(expected.iter().all(has), || {
            format!("{} doesn't include all of [{}]", field, expected.join(", "))
        }),
    }
}

fn evaluate_string(field: &str, operator: StringOperator, expected: &str, value: &Value) -> FieldEval {
    let text = as_text(value);
    match operator {
        StringOperator::Eq => check(text == expected, || format!("{} \"{}\" != \"{}\"", field, text, expected)),
        StringOperator::Neq => check(text != expected, || format!("{} \"{}\" == \"{}\"", field, text, expected)),
        StringOperator::Contains => check(text.contains(expected), || {
            format!("{} doesn't contain \"{}\"", field, expected)
        }),
        StringOperator::StartsWith => check(text.starts_with(expected), || {
            format!("{} doesn't start with \"{}\"", field, expected)
        }),
        StringOperator::EndsWith => check(text.ends_with(expected), || {
            format!("{} doesn't end with \"{}\"", field, expected)
        }),
    }
}

fn set_contains(expected: &[SetValue], value: &Value) -> bool {
    expected.iter().any(|candidate| match (candidate, value) {
        (SetValue::Text(s), Value::String(v)) => s == v,
        (SetValue::Number(n), Value::Number(v)) => v.as_f64() == Some(*n),
        _ => false,
    })
}

fn set_label(expected: &[SetValue]) -> String {
    expected
        .iter()
        .map(|v| match v {
            SetValue::Text(s) => s.clone(),
            SetValue::Number(n) => number_label(*n),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Evaluate one field test against the facts
pub fn evaluate_field_condition(condition: &FieldCondition, facts: &FactMap) -> FieldEval {
    let field = condition.field.as_str();

    // Presence checks read the condition list directly and never go missing
    if let ConditionTest::ConditionPresence { operator, value } = &condition.test {
        let present = facts.conditions();
        return match operator {
            PresenceOperator::IncludesAny => check(value.iter().any(|c| present.contains(&c.as_str())), || {
                format!("None of [{}] present", value.join(", "))
            }),
            PresenceOperator::IncludesAll => {
                let missing: Vec<&str> = value
                    .iter()
                    .map(String::as_str)
                    .filter(|c| !present.contains(c))
                    .collect();
                check(missing.is_empty(), || format!("Missing conditions: {}", missing.join(", ")))
            }
        };
    }

    let Some(value) = facts.get(field) else {
        if let ConditionTest::NullCheck { operator } = &condition.test {
            return check(*operator == NullOperator::IsNull, || format!("{} is null", field));
        }
        return match condition.treat_null_as.unwrap_or_default() {
            NullHandling::Fail => FieldEval::Failed(format!("{} is missing (treated as fail)", field)),
            NullHandling::Unknown => FieldEval::Unknown(format!("{} is missing", field)),
        };
    };

    match &condition.test {
        ConditionTest::NullCheck { operator } => {
            check(*operator == NullOperator::IsNotNull, || format!("{} is not null", field))
        }
        ConditionTest::Numeric { operator, value: expected } => evaluate_numeric(field, *operator, expected, value),
        ConditionTest::Date { operator, value: threshold } => {
            evaluate_date(field, *operator, *threshold, value, facts.as_of())
        }
        ConditionTest::Boolean { operator, value: expected } => {
            let actual = as_bool(value);
            match operator {
                BooleanOperator::Eq => check(actual == *expected, || format!("{} {} != {}", field, actual, expected)),
                BooleanOperator::Neq => check(actual != *expected, || format!("{} {} == {}", field, actual, expected)),
            }
        }
        ConditionTest::String { operator, value: expected } => evaluate_string(field, *operator, expected, value),
        ConditionTest::Array { operator, value: expected } => evaluate_array(field, *operator, expected, value),
        ConditionTest::Set { operator, value: expected } => match operator {
            SetOperator::In => check(set_contains(expected, value), || {
                format!("{} not in [{}]", field, set_label(expected))
            }),
            SetOperator::NotIn => check(!set_contains(expected, value), || {
                format!("{} in [{}]", field, set_label(expected))
            }),
        },
        ConditionTest::ConditionPresence { .. } => FieldEval::Matched,
    }
}

fn missing_field(condition: &FieldCondition, reason: String, required_for: RequiredFor) -> MissingField {
    MissingField {
        field: condition.field.clone(),
        condition_code: extract_condition_code(&condition.field).map(str::to_string),
        reason,
        required_for,
    }
}

fn evaluate_all(nodes: &[PredicateNode], facts: &FactMap) -> PredicateResult {
    let mut matched = Vec::new();
    let mut missing = Vec::new();

    for node in nodes {
        match node {
            PredicateNode::Condition(condition) => match evaluate_field_condition(condition, facts) {
                FieldEval::Matched => matched.push(condition.clone()),
                FieldEval::Failed(_) => return PredicateResult::Failed(vec![condition.clone()]),
                FieldEval::Unknown(reason) => missing.push(missing_field(condition, reason, RequiredFor::All)),
            },
            PredicateNode::Group(group) => match evaluate_predicate(group, facts) {
                failed @ PredicateResult::Failed(_) => return failed,
                PredicateResult::Unknown(fields) => missing.extend(fields),
                PredicateResult::Matched(conditions) => matched.extend(conditions),
            },
        }
    }

    if missing.is_empty() {
        PredicateResult::Matched(matched)
    } else {
        PredicateResult::Unknown(missing)
    }
}

fn evaluate_any(nodes: &[PredicateNode], facts: &FactMap) -> PredicateResult {
    let mut unknown = Vec::new();

    for node in nodes {
        match node {
            PredicateNode::Condition(condition) => match evaluate_field_condition(condition, facts) {
                FieldEval::Matched => return PredicateResult::Matched(vec![condition.clone()]),
                FieldEval::Unknown(reason) => unknown.push(missing_field(condition, reason, RequiredFor::Any)),
                FieldEval::Failed(_) => {}
            },
            PredicateNode::Group(group) => match evaluate_predicate(group, facts) {
                matched @ PredicateResult::Matched(_) => return matched,
                PredicateResult::Unknown(fields) => unknown.extend(fields),
                PredicateResult::Failed(_) => {}
            },
        }
    }

    if unknown.is_empty() {
        PredicateResult::Failed(Vec::new())
    } else {
        PredicateResult::Unknown(unknown)
    }
}

fn evaluate_not(node: &PredicateNode, facts: &FactMap) -> PredicateResult {
    let inner = match node {
        PredicateNode::Condition(condition) => match evaluate_field_condition(condition, facts) {
            FieldEval::Matched => PredicateResult::Matched(vec![condition.clone()]),
            FieldEval::Failed(_) => PredicateResult::Failed(vec![condition.clone()]),
            FieldEval::Unknown(reason) => {
                PredicateResult::Unknown(vec![missing_field(condition, reason, RequiredFor::All)])
            }
        },
        PredicateNode::Group(group) => evaluate_predicate(group, facts),
    };

    match inner {
        PredicateResult::Unknown(fields) => PredicateResult::Unknown(fields),
        PredicateResult::Matched(_) => PredicateResult::Failed(Vec::new()),
        PredicateResult::Failed(_) => PredicateResult::Matched(Vec::new()),
    }
}

/// Evaluate a predicate group; the empty group matches
pub fn evaluate_predicate(predicate: &PredicateGroup, facts: &FactMap) -> PredicateResult {
    if let Some(nodes) = &predicate.all {
        return evaluate_all(nodes, facts);
    }
    if let Some(nodes) = &predicate.any {
        return evaluate_any(nodes, facts);
    }
    if let Some(node) = &predicate.not {
        return evaluate_not(node, facts);
    }
    PredicateResult::Matched(Vec::new())
}

/// Run a rule set's rules in priority order; the first applicable match wins.
///
/// With no match, any missing data makes the outcome unknown; otherwise the
/// set's default outcome (or the safe refer outcome) applies.
pub fn evaluate_rule_set(rule_set: &UnderwritingRuleSet, facts: &FactMap) -> ConditionOutcome {
    let mut rules: Vec<_> = rule_set
        .rules
        .iter()
        .filter(|r| r.applies_to(facts.age(), facts.gender()))
        .collect();
    rules.sort_by_key(|r| r.priority);

    let condition_code = rule_set.condition_code.clone();
    let outcome_code = condition_code.clone().unwrap_or_else(|| "global".to_string());
    let mut all_missing: Vec<MissingField> = Vec::new();

    for rule in rules {
        match evaluate_predicate(&rule.predicate, facts) {
            PredicateResult::Matched(matched_conditions) => {
                let outcome = rule.outcome();
                let flat_extra = outcome
                    .flat_extra_per_thousand
                    .filter(|per_thousand| *per_thousand > 0.0)
                    .map(|per_thousand| FlatExtra {
                        per_thousand,
                        years: outcome.flat_extra_years.unwrap_or(1),
                        source: rule.name.clone(),
                    });

                return ConditionOutcome {
                    condition_code: outcome_code,
                    eligibility: outcome.eligibility,
                    health_class: outcome.health_class,
                    table_units: outcome.table_rating.units(),
                    flat_extra,
                    concerns: outcome.concerns.clone(),
                    matched_rules: vec![MatchedRule {
                        rule_id: rule.id.clone(),
                        rule_name: rule.name.clone(),
                        rule_set_id: rule_set.id.clone(),
                        condition_code,
                        matched_conditions,
                        outcome,
                    }],
                    missing_fields: Vec::new(),
                };
            }
            PredicateResult::Unknown(fields) => all_missing.extend(fields),
            PredicateResult::Failed(_) => {}
        }
    }

    if !all_missing.is_empty() {
        let fields: Vec<&str> = all_missing.iter().map(|m| m.field.as_str()).collect();
        return ConditionOutcome {
            condition_code: outcome_code,
            eligibility: RuleEligibility::Unknown,
            health_class: RuleHealthClass::Unknown,
            table_units: 0,
            flat_extra: None,
            concerns: vec![format!("Missing data to evaluate: {}", fields.join(", "))],
            matched_rules: Vec::new(),
            missing_fields: all_missing,
        };
    }

    let default = rule_set.default_outcome.clone().unwrap_or_else(RuleOutcome::default_safe);
    ConditionOutcome {
        condition_code: outcome_code,
        eligibility: default.eligibility,
        health_class: default.health_class,
        table_units: 0,
        flat_extra: None,
        concerns: vec![default.reason],
        matched_rules: Vec::new(),
        missing_fields: Vec::new(),
    }
}
