//! One product through every stage: term, eligibility, approval, build chart,
//! premium and alternative quotes.

use super::approval::{apply_build_constraint, calculate_approval};
use super::eligibility::check_eligibility;
use super::ranking::{calculate_score, final_score};
use super::types::{EligibilityStatus, EvaluatedProduct, FilterStats};
use crate::build_chart::BuildRatingClass;
use crate::client::DecisionEngineInput;
use crate::config::EngineConfig;
use crate::products::{get_max_face_amount_for_age_term, ProductCandidate, ProductCatalog};
use crate::rates::{
    calculate_alternative_quotes, comparison_face_amounts, fit_face_amounts, interpolate_premium_with_guardrail,
    PremiumLookup, PremiumMatrix, PremiumQuery, TobaccoClass,
};
use chrono::NaiveDate;
use log::{debug, warn};

/// Outcome of evaluating one product; `evaluated` is `None` when it was dropped
#[derive(Debug, Clone)]
pub struct ProductEvaluation {
    pub evaluated: Option<EvaluatedProduct>,
    pub stats: FilterStats,
}

impl ProductEvaluation {
    fn dropped(mut stats: FilterStats) -> Self {
        stats.ineligible = 1;
        Self { evaluated: None, stats }
    }
}

/// Term used for both eligibility and pricing.
///
/// `Ok(None)` for permanent products (or products without rates), `Err(())`
/// when the product cannot be offered at this age or the requested term.
fn select_term(
    matrix: &PremiumMatrix,
    age: u32,
    requested: Option<u32>,
    product_name: &str,
) -> Result<Option<u32>, ()> {
    let available = matrix.available_terms_for_age(age);
    if matrix.is_permanent() {
        return Ok(None);
    }
    if available.is_empty() && !matrix.is_empty() {
        debug!("Skipping {}: no terms available for age {}", product_name, age);
        return Err(());
    }

    match requested {
        Some(term) if available.contains(&term) => Ok(Some(term)),
        Some(term) => {
            debug!(
                "Skipping {}: requested term {}yr not available for age {} (available {:?})",
                product_name, term, age, available
            );
            Err(())
        }
        None => Ok(available.last().copied()),
    }
}

/// Run one product through every stage for `input`.
///
/// Products that are ineligible, declined outright while eligible, or
/// unofferable at the requested term are dropped. Unknown-eligibility products
/// are kept even when they could not be priced.
pub fn evaluate_single_product(
    catalog: &ProductCatalog,
    product: &ProductCandidate,
    input: &DecisionEngineInput,
    config: &EngineConfig,
    as_of: NaiveDate,
) -> ProductEvaluation {
    let client = &input.client;
    let coverage = &input.coverage;
    let mut stats = FilterStats {
        total_products: 1,
        ..Default::default()
    };

    let empty = PremiumMatrix::default();
    let matrix = catalog.matrix_for(&product.product_id).unwrap_or(&empty);
    let available_terms = matrix.available_terms_for_age(client.age);
    let Ok(term_years) = select_term(matrix, client.age, input.term_years, &product.product_name) else {
        return ProductEvaluation::dropped(stats);
    };

    // Stage 1
    let eligibility = check_eligibility(
        product,
        client,
        coverage,
        catalog.criteria_for(&product.product_id),
        term_years,
    );
    match eligibility.status {
        EligibilityStatus::Ineligible => {
            debug!("{} ineligible: {}", product.product_name, eligibility.reasons.join("; "));
            return ProductEvaluation::dropped(stats);
        }
        EligibilityStatus::Unknown => stats.unknown_eligibility = 1,
        EligibilityStatus::Eligible => stats.passed_eligibility = 1,
    }

    // Stage 2
    let approval = calculate_approval(catalog, product, &input.imo_id, client, config, as_of);
    if eligibility.status == EligibilityStatus::Eligible && approval.likelihood == 0.0 {
        debug!("{} declined: {}", product.product_name, approval.concerns.join("; "));
        return ProductEvaluation::dropped(stats);
    }
    stats.passed_acceptance = 1;

    // Build chart floor on the class
    let mut health_class = approval.health_class;
    let mut build_rating = None;
    if let (Some(feet), Some(inches), Some(weight)) = (client.height_feet, client.height_inches, client.weight) {
        if let Some((chart, assignment)) = catalog.build_chart_for(product, &input.imo_id) {
            let lookup = chart.rate(feet, inches, weight);
            if lookup.rating_class != BuildRatingClass::Unknown {
                build_rating = Some(lookup.rating_class);
                health_class = apply_build_constraint(approval.health_class, lookup.rating_class);
                if health_class != approval.health_class {
                    debug!(
                        "Build chart {} ({:?}) moved {} from {} to {}",
                        chart.id,
                        assignment,
                        product.product_name,
                        approval.health_class.as_str(),
                        health_class.as_str()
                    );
                }
            }
        }
    }

    // Stage 3
    let query = PremiumQuery {
        age: client.age,
        face_amount: coverage.face_amount,
        gender: client.gender,
        tobacco_class: TobaccoClass::from_tobacco_use(client.tobacco),
        health_class,
        term_years,
    };
    let lookup = interpolate_premium_with_guardrail(matrix, &query, config.premium_guardrail);

    let (premium, requested, used, was_fallback, term_used, alternative_quotes) = match lookup {
        PremiumLookup::Found {
            premium,
            requested,
            used,
            was_exact,
            term_years,
        } => {
            if !was_exact {
                debug!(
                    "{}: priced at {} instead of {}",
                    product.product_name,
                    used.as_str(),
                    requested.as_str()
                );
            }
            let max_face = get_max_face_amount_for_age_term(
                product.metadata.as_ref(),
                product.max_face_amount,
                client.age,
                term_years,
            );
            let amounts = if coverage.face_amounts.is_empty() {
                comparison_face_amounts(coverage.face_amount, product.min_face_amount, max_face)
            } else {
                fit_face_amounts(&coverage.face_amounts, coverage.face_amount, product.min_face_amount, max_face)
            };
            let quotes = calculate_alternative_quotes(
                matrix,
                &amounts,
                &PremiumQuery {
                    health_class: used,
                    term_years,
                    ..query
                },
                config.premium_guardrail,
            );
            (Some(premium), Some(requested), Some(used), Some(!was_exact), term_years, quotes)
        }
        PremiumLookup::NotFound { reason } => {
            warn!("No premium for {}: {}", product.product_name, reason.describe());
            (None, None, None, None, None, Vec::new())
        }
    };

    if premium.is_some() {
        stats.with_premiums = 1;
    }

    let max_coverage = match product.max_face_amount {
        Some(max) if max > 0.0 => max.min(coverage.face_amount),
        _ => coverage.face_amount,
    };

    let score_components = calculate_score(
        approval.likelihood,
        premium,
        0.0,
        eligibility.status,
        eligibility.confidence,
        config,
    );

    ProductEvaluation {
        evaluated: Some(EvaluatedProduct {
            product: product.clone(),
            eligibility,
            approval,
            premium,
            health_class_requested: requested,
            health_class_used: used,
            was_fallback,
            term_years: term_used,
            available_terms,
            alternative_quotes,
            max_coverage,
            final_score: final_score(&score_components, config),
            score_components,
            build_rating,
        }),
        stats,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build_chart::{BuildChart, BuildChartRow, BuildTableType, RatingRange};
    use crate::client::{ClientProfile, CoverageRequest, Gender};
    use crate::products::catalog::test_support::product;
    use crate::products::{AcceptanceDecision, AcceptanceRule, ProductType};
    use crate::rates::matrix::test_support::{row, standard_matrix};
    use crate::rates::RateClass;
    use serde_json::Map;

    const IMO: &str = "0f4c2a3e-8b1d-4c55-9e0a-123456789abc";

    fn as_of() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, 15).unwrap()
    }

    fn input(age: u32, term_years: Option<u32>) -> DecisionEngineInput {
        DecisionEngineInput {
            client: ClientProfile::new(age, Gender::Male),
            coverage: CoverageRequest::new(250_000.0),
            imo_id: IMO.into(),
            term_years,
        }
    }

    /// 10yr rates for ages 30-60, 20yr rates only for ages 30-40
    fn term_catalog() -> ProductCatalog {
        let mut rows = Vec::new();
        for class in [RateClass::Preferred, RateClass::Standard] {
            rows.extend(standard_matrix(class, Some(10)));
            rows.extend(standard_matrix(class, Some(20)).into_iter().filter(|r| r.age <= 40));
        }
        ProductCatalog::new(vec![product("p1", "c1", ProductType::TermLife)])
            .with_matrix("p1", PremiumMatrix::new(rows))
    }

    fn run(catalog: &ProductCatalog, input: &DecisionEngineInput) -> ProductEvaluation {
        let product = &catalog.products()[0];
        evaluate_single_product(catalog, product, input, &EngineConfig::default(), as_of())
    }

    #[test]
    fn test_longest_term_by_default() {
        let catalog = term_catalog();
        let result = run(&catalog, &input(35, None));
        let evaluated = result.evaluated.unwrap();
        assert_eq!(evaluated.term_years, Some(20));
        assert_eq!(evaluated.available_terms, vec![10, 20]);
        assert_eq!(evaluated.health_class_used, Some(RateClass::Preferred));
        assert_eq!(evaluated.was_fallback, Some(false));
        assert_eq!(result.stats.with_premiums, 1);

        let older = run(&catalog, &input(50, None)).evaluated.unwrap();
        assert_eq!(older.term_years, Some(10));
    }

    #[test]
    fn test_requested_term_must_be_available() {
        let catalog = term_catalog();
        let result = run(&catalog, &input(50, Some(20)));
        assert!(result.evaluated.is_none());
        assert_eq!(result.stats.ineligible, 1);

        let result = run(&catalog, &input(50, Some(10)));
        assert_eq!(result.evaluated.unwrap().term_years, Some(10));
    }

    #[test]
    fn test_no_terms_for_age_drops_product() {
        let catalog = term_catalog();
        let mut request = input(70, None);
        request.coverage.face_amount = 100_000.0;
        let result = run(&catalog, &request);
        assert!(result.evaluated.is_none());
        assert_eq!(result.stats.passed_eligibility, 0);
    }

    #[test]
    fn test_permanent_product_has_no_term() {
        let mut rows = standard_matrix(RateClass::Preferred, None);
        rows.extend(standard_matrix(RateClass::Standard, None));
        let catalog = ProductCatalog::new(vec![product("p1", "c1", ProductType::WholeLife)])
            .with_matrix("p1", PremiumMatrix::new(rows));
        let evaluated = run(&catalog, &input(45, Some(20))).evaluated.unwrap();
        assert_eq!(evaluated.term_years, None);
        assert!(evaluated.premium.is_some());
        assert!(!evaluated.alternative_quotes.is_empty());
    }

    #[test]
    fn test_declined_eligible_product_dropped() {
        let catalog = term_catalog().with_acceptance_rules(vec![AcceptanceRule {
            carrier_id: "c1".into(),
            condition_code: "als".into(),
            imo_id: None,
            product_type: None,
            acceptance: AcceptanceDecision::Declined,
            approval_likelihood: None,
            health_class_result: None,
            notes: None,
        }]);
        let mut request = input(35, None);
        request.client.health_conditions = vec!["als".into()];
        let result = run(&catalog, &request);
        assert!(result.evaluated.is_none());
        assert_eq!(result.stats.passed_eligibility, 1);
        assert_eq!(result.stats.passed_acceptance, 0);
        assert_eq!(result.stats.ineligible, 1);
    }

    #[test]
    fn test_unknown_kept_without_premium() {
        let catalog = ProductCatalog::new(vec![product("p1", "c1", ProductType::TermLife)]);
        let mut request = input(35, None);
        request.client.health_conditions = vec!["diabetes".into()];
        request.client.condition_responses.insert("diabetes".into(), Map::new());
        let result = run(&catalog, &request);
        let evaluated = result.evaluated.unwrap();
        assert_eq!(evaluated.eligibility.status, EligibilityStatus::Unknown);
        assert!(evaluated.premium.is_none());
        assert_eq!(result.stats.unknown_eligibility, 1);
        assert_eq!(result.stats.with_premiums, 0);
    }

    #[test]
    fn test_build_chart_lowers_class() {
        let mut weight_ranges = std::collections::BTreeMap::new();
        weight_ranges.insert(BuildRatingClass::Preferred, RatingRange::up_to(180.0));
        weight_ranges.insert(BuildRatingClass::Standard, RatingRange::up_to(220.0));
        let chart = BuildChart {
            id: "bc-1".into(),
            carrier_id: "c1".into(),
            imo_id: None,
            name: None,
            table_type: BuildTableType::HeightWeight,
            build_data: vec![BuildChartRow {
                height_inches: 70,
                weight_ranges,
            }],
            bmi_data: None,
            is_default: true,
        };
        let catalog = term_catalog().with_build_charts(vec![chart]);

        let mut request = input(35, None);
        request.client.height_feet = Some(5);
        request.client.height_inches = Some(10);
        request.client.weight = Some(200.0);
        let evaluated = run(&catalog, &request).evaluated.unwrap();
        assert_eq!(evaluated.build_rating, Some(BuildRatingClass::Standard));
        assert_eq!(evaluated.health_class_used, Some(RateClass::Standard));
        assert_eq!(evaluated.approval.health_class, RateClass::Preferred);
    }

    #[test]
    fn test_class_fallback_reported() {
        let rows: Vec<_> = standard_matrix(RateClass::Standard, Some(20));
        let catalog = ProductCatalog::new(vec![product("p1", "c1", ProductType::TermLife)])
            .with_matrix("p1", PremiumMatrix::new(rows));
        let evaluated = run(&catalog, &input(40, None)).evaluated.unwrap();
        assert_eq!(evaluated.health_class_requested, Some(RateClass::Preferred));
        assert_eq!(evaluated.health_class_used, Some(RateClass::Standard));
        assert_eq!(evaluated.was_fallback, Some(true));
    }

    #[test]
    fn test_max_coverage_capped_by_product() {
        let catalog = term_catalog();
        let mut request = input(35, None);
        request.coverage.face_amount = 400_000.0;
        let evaluated = run(&catalog, &request).evaluated.unwrap();
        assert_eq!(evaluated.max_coverage, 400_000.0);

        let mut small = product("p1", "c1", ProductType::TermLife);
        small.max_face_amount = Some(500_000.0);
        let small_catalog = ProductCatalog::new(vec![small]).with_matrix(
            "p1",
            PremiumMatrix::new(vec![row(35, 500_000.0, 80.0, RateClass::Preferred, Some(20))]),
        );
        request.coverage.face_amount = 500_000.0;
        let evaluated = run(&small_catalog, &request).evaluated.unwrap();
        assert_eq!(evaluated.max_coverage, 500_000.0);
        assert_eq!(evaluated.premium, Some(80.0));
    }
}
