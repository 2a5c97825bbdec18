//! Request-independent result types produced by the engine stages

use crate::build_chart::BuildRatingClass;
use crate::products::{AcceptanceDecision, ProductCandidate, ProductType};
use crate::rates::{AlternativeQuote, RateClass};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EligibilityStatus {
    Eligible,
    /// Nothing rules the product out, but follow-up answers are missing
    Unknown,
    Ineligible,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EligibilityMissingField {
    pub field: String,
    pub condition_code: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EligibilityResult {
    pub status: EligibilityStatus,
    pub reasons: Vec<String>,
    pub missing_fields: Vec<EligibilityMissingField>,
    /// Share of the client's conditions with usable follow-up data
    pub confidence: f64,
}

/// Per-condition decision carried into recommendations
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionDecision {
    pub condition_code: String,
    pub decision: AcceptanceDecision,
    pub likelihood: f64,
    pub health_class_result: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub concerns: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub missing_fields: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalResult {
    pub likelihood: f64,
    pub health_class: RateClass,
    pub condition_decisions: Vec<ConditionDecision>,
    pub concerns: Vec<String>,
    /// `global:{name}` / `condition:{code}:{name}`, empty on the legacy path
    pub evaluated_rule_sets: Vec<String>,
}

impl ApprovalResult {
    /// Healthy client: no conditions to evaluate
    pub fn no_conditions() -> Self {
        Self {
            likelihood: 0.95,
            health_class: RateClass::Preferred,
            condition_decisions: Vec::new(),
            concerns: Vec::new(),
            evaluated_rule_sets: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreComponents {
    pub likelihood: f64,
    /// 1 for the cheapest product of the batch, 0 for the most expensive
    pub price_score: f64,
    pub data_confidence: f64,
    pub confidence_multiplier: f64,
}

/// A product that survived every stage, with everything needed to rank it
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluatedProduct {
    pub product: ProductCandidate,
    pub eligibility: EligibilityResult,
    pub approval: ApprovalResult,
    pub premium: Option<f64>,
    pub health_class_requested: Option<RateClass>,
    pub health_class_used: Option<RateClass>,
    pub was_fallback: Option<bool>,
    pub term_years: Option<u32>,
    pub available_terms: Vec<u32>,
    pub alternative_quotes: Vec<AlternativeQuote>,
    pub max_coverage: f64,
    pub score_components: ScoreComponents,
    pub final_score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build_rating: Option<BuildRatingClass>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationReason {
    BestValue,
    Cheapest,
    BestApproval,
    HighestCoverage,
}

impl RecommendationReason {
    pub fn label(&self) -> &'static str {
        match self {
            RecommendationReason::BestValue => "Best Overall Value",
            RecommendationReason::Cheapest => "Lowest Premium",
            RecommendationReason::BestApproval => "Best Approval Odds",
            RecommendationReason::HighestCoverage => "Most Coverage",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub carrier_id: String,
    pub carrier_name: String,
    pub product_id: String,
    pub product_name: String,
    pub product_type: ProductType,
    pub monthly_premium: f64,
    pub max_coverage: f64,
    pub approval_likelihood: f64,
    pub health_class_result: RateClass,
    pub reason: RecommendationReason,
    pub concerns: Vec<String>,
    pub condition_decisions: Vec<ConditionDecision>,
    pub score: f64,
    pub term_years: Option<u32>,
    pub was_fallback: bool,
    pub alternative_quotes: Vec<AlternativeQuote>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build_rating: Option<BuildRatingClass>,
}

impl Recommendation {
    /// `None` when the product has no premium; only priced products are recommended
    pub fn from_evaluated(evaluated: &EvaluatedProduct, reason: RecommendationReason) -> Option<Self> {
        let premium = evaluated.premium?;
        let product = &evaluated.product;
        Some(Self {
            carrier_id: product.carrier_id.clone(),
            carrier_name: product.carrier_name.clone(),
            product_id: product.product_id.clone(),
            product_name: product.product_name.clone(),
            product_type: product.product_type,
            monthly_premium: premium,
            max_coverage: evaluated.max_coverage,
            approval_likelihood: evaluated.approval.likelihood,
            health_class_result: evaluated.health_class_used.unwrap_or(evaluated.approval.health_class),
            reason,
            concerns: evaluated.approval.concerns.clone(),
            condition_decisions: evaluated.approval.condition_decisions.clone(),
            score: evaluated.final_score,
            term_years: evaluated.term_years,
            was_fallback: evaluated.was_fallback.unwrap_or(false),
            alternative_quotes: evaluated.alternative_quotes.clone(),
            build_rating: evaluated.build_rating,
        })
    }
}

/// How many products reached each stage
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterStats {
    pub total_products: usize,
    pub passed_eligibility: usize,
    pub unknown_eligibility: usize,
    pub passed_acceptance: usize,
    pub with_premiums: usize,
    pub ineligible: usize,
}

impl FilterStats {
    pub fn add(&mut self, other: &FilterStats) {
        self.total_products += other.total_products;
        self.passed_eligibility += other.passed_eligibility;
        self.unknown_eligibility += other.unknown_eligibility;
        self.passed_acceptance += other.passed_acceptance;
        self.with_premiums += other.with_premiums;
        self.ineligible += other.ineligible;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionEngineResult {
    /// Eligible, priced products, best score first
    pub eligible_products: Vec<EvaluatedProduct>,
    pub recommendations: Vec<Recommendation>,
    /// Products that may fit once missing follow-up answers are provided,
    /// best score first
    pub unknown_eligibility: Vec<EvaluatedProduct>,
    pub filtered: FilterStats,
    /// Wall-clock milliseconds
    pub processing_time: u64,
}
