//! Carrier underwriting rules: predicate language, evaluation and aggregation

pub mod aggregate;
pub mod dsl;
pub mod evaluator;
pub mod facts;

pub use aggregate::{aggregate_outcomes, AggregatedOutcome};
pub use dsl::{
    parse_predicate, FlatExtraComposition, ReviewStatus, RuleEligibility, RuleHealthClass,
    RuleOutcome, RuleSetScope, TableRating, UnderwritingRule, UnderwritingRuleSet,
};
pub use evaluator::{
    evaluate_predicate, evaluate_rule_set, ConditionOutcome, FlatExtra, MissingField,
    PredicateResult,
};
pub use facts::{generate_input_hash, FactMap};
