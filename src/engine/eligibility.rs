//! Stage 1: hard product limits and follow-up completeness

use super::types::{EligibilityMissingField, EligibilityResult, EligibilityStatus};
use crate::client::{ClientProfile, CoverageRequest};
use crate::format::format_currency;
use crate::products::{get_max_face_amount_for_age_term, ExtractedCriteria, ProductCandidate, MAX_SAFE_FACE};

pub const MISSING_FOLLOW_UP_REASON: &str = "Missing required follow-up information";

fn face_limit_reasons(
    reasons: &mut Vec<String>,
    product: &ProductCandidate,
    client: &ClientProfile,
    coverage: &CoverageRequest,
    term_years: Option<u32>,
) {
    let face = coverage.face_amount;
    if face < product.min_face_amount.unwrap_or(0.0) {
        reasons.push(format!("Requested {} below minimum", format_currency(face)));
    }

    let base_max = get_max_face_amount_for_age_term(
        product.metadata.as_ref(),
        product.max_face_amount,
        client.age,
        None,
    );
    let max_face = get_max_face_amount_for_age_term(
        product.metadata.as_ref(),
        product.max_face_amount,
        client.age,
        term_years,
    );
    if face > max_face {
        let term_note = match term_years {
            Some(term) if max_face < base_max => format!(" for {}yr term", term),
            _ => String::new(),
        };
        reasons.push(format!(
            "Requested {} exceeds max {}{}",
            format_currency(face),
            format_currency(max_face),
            term_note
        ));
    }
}

fn criteria_reasons(
    reasons: &mut Vec<String>,
    criteria: &ExtractedCriteria,
    client: &ClientProfile,
    coverage: &CoverageRequest,
) {
    let has = |reasons: &[String], needle: &str| reasons.iter().any(|r| r.contains(needle));

    if let Some(limits) = &criteria.age_limits {
        if let Some(min) = limits.min_issue_age.filter(|min| client.age < *min) {
            if !has(reasons, "below minimum") {
                reasons.push(format!("Age {} below issue age {}", client.age, min));
            }
        }
        if let Some(max) = limits.max_issue_age.filter(|max| client.age > *max) {
            if !has(reasons, "above maximum") {
                reasons.push(format!("Age {} above issue age {}", client.age, max));
            }
        }
    }

    if let Some(limits) = &criteria.face_amount_limits {
        if let Some(min) = limits.minimum.filter(|min| coverage.face_amount < *min) {
            if !has(reasons, "below minimum") {
                reasons.push(format!("Amount below minimum {}", format_currency(min)));
            }
        }

        let age_max = limits
            .age_tiers
            .iter()
            .filter(|t| t.contains(client.age))
            .fold(limits.maximum.unwrap_or(MAX_SAFE_FACE), |max, t| max.min(t.max_face_amount));
        if coverage.face_amount > age_max && age_max < MAX_SAFE_FACE {
            reasons.push(format!(
                "{} exceeds age-based max {}",
                format_currency(coverage.face_amount),
                format_currency(age_max)
            ));
        }
    }

    if let Some(knockouts) = &criteria.knockout_conditions {
        let hits: Vec<&str> = client
            .health_conditions
            .iter()
            .filter(|c| knockouts.condition_codes.contains(c))
            .map(String::as_str)
            .collect();
        if !hits.is_empty() {
            reasons.push(format!("Knockout condition: {}", hits.join(", ")));
        }
    }

    if let (Some(state), Some(availability)) = (client.state.as_deref(), &criteria.state_availability) {
        if !state.is_empty() && availability.unavailable_states.iter().any(|s| s == state) {
            reasons.push(format!("Not available in {}", state));
        }
    }
}

/// Conditions whose follow-up entry exists but holds no answers
fn missing_follow_ups(client: &ClientProfile) -> Vec<EligibilityMissingField> {
    client
        .health_conditions
        .iter()
        .filter(|code| client.condition_responses.get(*code).is_some_and(|r| r.is_empty()))
        .map(|code| EligibilityMissingField {
            field: format!("{}.responses", code),
            condition_code: code.clone(),
        })
        .collect()
}

/// Tri-state eligibility of one product.
///
/// Any hard-limit reason makes the product ineligible, regardless of missing
/// data. Otherwise missing follow-up answers make it unknown with a confidence
/// equal to the share of conditions that were answered.
pub fn check_eligibility(
    product: &ProductCandidate,
    client: &ClientProfile,
    coverage: &CoverageRequest,
    criteria: Option<&ExtractedCriteria>,
    term_years: Option<u32>,
) -> EligibilityResult {
    let mut reasons = Vec::new();

    let min_age = product.min_age.unwrap_or(0);
    let max_age = product.max_age.unwrap_or(100);
    if client.age < min_age {
        reasons.push(format!("Client age {} below minimum {}", client.age, min_age));
    }
    if client.age > max_age {
        reasons.push(format!("Client age {} above maximum {}", client.age, max_age));
    }

    face_limit_reasons(&mut reasons, product, client, coverage, term_years);
    if let Some(criteria) = criteria {
        criteria_reasons(&mut reasons, criteria, client, coverage);
    }

    if !reasons.is_empty() {
        return EligibilityResult {
            status: EligibilityStatus::Ineligible,
            reasons,
            missing_fields: Vec::new(),
            confidence: 0.0,
        };
    }

    let missing_fields = missing_follow_ups(client);
    if missing_fields.is_empty() {
        return EligibilityResult {
            status: EligibilityStatus::Eligible,
            reasons,
            missing_fields,
            confidence: 1.0,
        };
    }

    let total = client.health_conditions.len().max(1) as f64;
    let confidence = (1.0 - missing_fields.len() as f64 / total).max(0.0);
    EligibilityResult {
        status: EligibilityStatus::Unknown,
        reasons: vec![MISSING_FOLLOW_UP_REASON.to_string()],
        missing_fields,
        confidence,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::Gender;
    use crate::products::catalog::test_support::product;
    use crate::products::{
        AgeLimits, AgeTier, AgeTieredFaceAmounts, FaceAmountLimits, KnockoutConditions, ProductMetadata,
        ProductType, StateAvailability, TermRestriction,
    };
    use approx::assert_abs_diff_eq;
    use serde_json::{json, Map};

    fn term_product() -> ProductCandidate {
        product("p1", "c1", ProductType::TermLife)
    }

    fn client(age: u32) -> ClientProfile {
        ClientProfile::new(age, Gender::Male)
    }

    fn coverage(face: f64) -> CoverageRequest {
        CoverageRequest::new(face)
    }

    #[test]
    fn test_eligible_within_limits() {
        let result = check_eligibility(&term_product(), &client(40), &coverage(250_000.0), None, Some(20));
        assert_eq!(result.status, EligibilityStatus::Eligible);
        assert!(result.reasons.is_empty());
        assert_eq!(result.confidence, 1.0);
    }

    #[test]
    fn test_age_and_face_reasons() {
        let result = check_eligibility(&term_product(), &client(80), &coverage(2_000_000.0), None, None);
        assert_eq!(result.status, EligibilityStatus::Ineligible);
        assert_eq!(
            result.reasons,
            vec![
                "Client age 80 above maximum 75".to_string(),
                "Requested $2,000,000 exceeds max $1,000,000".to_string(),
            ]
        );

        let result = check_eligibility(&term_product(), &client(10), &coverage(10_000.0), None, None);
        assert_eq!(
            result.reasons,
            vec![
                "Client age 10 below minimum 18".to_string(),
                "Requested $10,000 below minimum".to_string(),
            ]
        );
    }

    #[test]
    fn test_missing_limits_use_defaults() {
        let mut open = term_product();
        open.min_age = None;
        open.max_age = None;
        open.min_face_amount = None;
        open.max_face_amount = None;
        let result = check_eligibility(&open, &client(100), &coverage(5_000_000.0), None, None);
        assert_eq!(result.status, EligibilityStatus::Eligible);
        let result = check_eligibility(&open, &client(101), &coverage(5_000_000.0), None, None);
        assert_eq!(result.reasons, vec!["Client age 101 above maximum 100".to_string()]);
    }

    #[test]
    fn test_term_restriction_noted() {
        let mut p = term_product();
        p.metadata = Some(ProductMetadata {
            age_tiered_face_amounts: Some(AgeTieredFaceAmounts {
                tiers: vec![AgeTier {
                    min_age: 18,
                    max_age: 65,
                    max_face_amount: 500_000.0,
                    term_restrictions: vec![TermRestriction {
                        term_years: 30,
                        max_face_amount: 250_000.0,
                    }],
                }],
            }),
        });

        let result = check_eligibility(&p, &client(40), &coverage(300_000.0), None, Some(30));
        assert_eq!(
            result.reasons,
            vec!["Requested $300,000 exceeds max $250,000 for 30yr term".to_string()]
        );
        let result = check_eligibility(&p, &client(40), &coverage(300_000.0), None, Some(20));
        assert_eq!(result.status, EligibilityStatus::Eligible);
        let result = check_eligibility(&p, &client(40), &coverage(600_000.0), None, Some(20));
        assert_eq!(result.reasons, vec!["Requested $600,000 exceeds max $500,000".to_string()]);
    }

    #[test]
    fn test_extracted_criteria() {
        let criteria = ExtractedCriteria {
            age_limits: Some(AgeLimits {
                min_issue_age: Some(21),
                max_issue_age: Some(60),
            }),
            face_amount_limits: Some(FaceAmountLimits {
                minimum: Some(50_000.0),
                maximum: Some(750_000.0),
                age_tiers: vec![AgeTier {
                    min_age: 51,
                    max_age: 60,
                    max_face_amount: 300_000.0,
                    term_restrictions: vec![],
                }],
            }),
            knockout_conditions: Some(KnockoutConditions {
                condition_codes: vec!["als".into(), "hiv".into()],
            }),
            state_availability: Some(StateAvailability {
                unavailable_states: vec!["NY".into()],
            }),
        };

        let mut older = client(61);
        older.state = Some("NY".into());
        older.health_conditions = vec!["hiv".into(), "asthma".into(), "als".into()];
        let result = check_eligibility(&term_product(), &older, &coverage(40_000.0), Some(&criteria), None);
        assert_eq!(
            result.reasons,
            vec![
                "Age 61 above issue age 60".to_string(),
                "Amount below minimum $50,000".to_string(),
                "Knockout condition: hiv, als".to_string(),
                "Not available in NY".to_string(),
            ]
        );

        let result = check_eligibility(&term_product(), &client(55), &coverage(400_000.0), Some(&criteria), None);
        assert_eq!(result.reasons, vec!["$400,000 exceeds age-based max $300,000".to_string()]);

        let young = check_eligibility(&term_product(), &client(19), &coverage(400_000.0), Some(&criteria), None);
        assert_eq!(young.reasons, vec!["Age 19 below issue age 21".to_string()]);
    }

    #[test]
    fn test_product_reason_suppresses_criteria_duplicate() {
        let criteria = ExtractedCriteria {
            age_limits: Some(AgeLimits {
                min_issue_age: None,
                max_issue_age: Some(70),
            }),
            ..Default::default()
        };
        let result = check_eligibility(&term_product(), &client(80), &coverage(250_000.0), Some(&criteria), None);
        assert_eq!(result.reasons, vec!["Client age 80 above maximum 75".to_string()]);
    }

    #[test]
    fn test_unknown_when_follow_up_empty() {
        let mut c = client(45);
        c.health_conditions = vec!["diabetes".into(), "asthma".into()];
        c.condition_responses.insert("diabetes".into(), Map::new());
        let mut answered = Map::new();
        answered.insert("severity".into(), json!("mild"));
        c.condition_responses.insert("asthma".into(), answered);

        let result = check_eligibility(&term_product(), &c, &coverage(250_000.0), None, None);
        assert_eq!(result.status, EligibilityStatus::Unknown);
        assert_eq!(result.reasons, vec![MISSING_FOLLOW_UP_REASON.to_string()]);
        assert_eq!(result.missing_fields.len(), 1);
        assert_eq!(result.missing_fields[0].condition_code, "diabetes");
        assert_abs_diff_eq!(result.confidence, 0.5);
    }

    #[test]
    fn test_ineligible_takes_precedence_over_unknown() {
        let mut c = client(80);
        c.health_conditions = vec!["diabetes".into()];
        c.condition_responses.insert("diabetes".into(), Map::new());
        let result = check_eligibility(&term_product(), &c, &coverage(250_000.0), None, None);
        assert_eq!(result.status, EligibilityStatus::Ineligible);
        assert!(result.missing_fields.is_empty());
    }
}
