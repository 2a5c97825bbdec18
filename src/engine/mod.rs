//! Underwriting decision engine
//!
//! Filters the product catalog against a client in stages (term selection,
//! eligibility, approval, build chart, premium) and ranks what survives into
//! labelled recommendations.

pub mod approval;
pub mod eligibility;
pub mod evaluate;
pub mod ranking;
pub mod types;

pub use approval::{
    apply_build_constraint, calculate_approval, calculate_approval_legacy, calculate_approval_v2,
    determine_health_class, health_class_severity,
};
pub use eligibility::{check_eligibility, MISSING_FOLLOW_UP_REASON};
pub use evaluate::{evaluate_single_product, ProductEvaluation};
pub use ranking::{calculate_score, final_score, rank_eligible, rank_unknown, rescore, select_recommendations};
pub use types::{
    ApprovalResult, ConditionDecision, DecisionEngineResult, EligibilityMissingField, EligibilityResult,
    EligibilityStatus, EvaluatedProduct, FilterStats, Recommendation, RecommendationReason, ScoreComponents,
};

use crate::client::DecisionEngineInput;
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::products::ProductCatalog;
use chrono::{Local, NaiveDate};
use log::info;
use rayon::prelude::*;
use rayon::ThreadPool;
use std::time::Instant;

/// Pre-loaded decision engine
///
/// The catalog is loaded once and shared read-only by every request.
///
/// # Example
/// ```ignore
/// let catalog = ProductCatalog::load_from("data/catalog")?;
/// let engine = DecisionEngine::new(catalog, EngineConfig::from_env()?)?;
///
/// let result = engine.get_recommendations(&input)?;
/// for rec in &result.recommendations {
///     println!("{}: {} {}", rec.reason.label(), rec.product_name, rec.monthly_premium);
/// }
/// ```
#[derive(Debug)]
pub struct DecisionEngine {
    catalog: ProductCatalog,
    config: EngineConfig,
    /// Bounds concurrent product evaluations; `None` uses the global pool
    pool: Option<ThreadPool>,
}

impl DecisionEngine {
    pub fn new(catalog: ProductCatalog, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let pool = match config.parallel_product_limit {
            0 => None,
            limit => Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(limit)
                    .build()
                    .map_err(|e| EngineError::Config(format!("Failed to build evaluation pool: {}", e)))?,
            ),
        };
        Ok(Self { catalog, config, pool })
    }

    pub fn catalog(&self) -> &ProductCatalog {
        &self.catalog
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Recommendations for `input`, with date predicates evaluated as of today
    pub fn get_recommendations(&self, input: &DecisionEngineInput) -> Result<DecisionEngineResult> {
        self.get_recommendations_as_of(input, Local::now().date_naive())
    }

    /// Recommendations with date predicates evaluated as of `as_of`
    pub fn get_recommendations_as_of(
        &self,
        input: &DecisionEngineInput,
        as_of: NaiveDate,
    ) -> Result<DecisionEngineResult> {
        input.validate()?;
        let start = Instant::now();

        let candidates = self.catalog.candidates_for(input);
        let evaluate_all = || -> Vec<ProductEvaluation> {
            candidates
                .par_iter()
                .map(|product| evaluate_single_product(&self.catalog, product, input, &self.config, as_of))
                .collect()
        };
        let evaluations = match &self.pool {
            Some(pool) => pool.install(evaluate_all),
            None => evaluate_all(),
        };

        let mut filtered = FilterStats::default();
        let mut evaluated = Vec::with_capacity(evaluations.len());
        for evaluation in evaluations {
            filtered.add(&evaluation.stats);
            evaluated.extend(evaluation.evaluated);
        }

        rescore(&mut evaluated, &self.config);
        let recommendations = select_recommendations(&evaluated, self.config.max_recommendations);
        let eligible_products = rank_eligible(&evaluated);
        let unknown_eligibility = rank_unknown(&evaluated);
        let processing_time = start.elapsed().as_millis() as u64;

        info!(
            "Evaluated {} products in {}ms: {} eligible, {} unknown, {} priced, {} recommended",
            filtered.total_products,
            processing_time,
            filtered.passed_eligibility,
            filtered.unknown_eligibility,
            filtered.with_premiums,
            recommendations.len()
        );

        Ok(DecisionEngineResult {
            eligible_products,
            recommendations,
            unknown_eligibility,
            filtered,
            processing_time,
        })
    }
}
