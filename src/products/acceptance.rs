//! Per-condition carrier acceptance rules (the pre-rule-set format)

use super::ProductType;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AcceptanceDecision {
    Approved,
    TableRated,
    CaseByCase,
    Declined,
}

impl AcceptanceDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            AcceptanceDecision::Approved => "approved",
            AcceptanceDecision::TableRated => "table_rated",
            AcceptanceDecision::CaseByCase => "case_by_case",
            AcceptanceDecision::Declined => "declined",
        }
    }
}

/// How one carrier treats one condition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcceptanceRule {
    pub carrier_id: String,
    pub condition_code: String,
    #[serde(default)]
    pub imo_id: Option<String>,
    /// `None` applies to every product type of the carrier
    #[serde(default)]
    pub product_type: Option<ProductType>,
    pub acceptance: AcceptanceDecision,
    #[serde(default)]
    pub approval_likelihood: Option<f64>,
    #[serde(default)]
    pub health_class_result: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Rule for a carrier/condition, preferring one written for the product type
/// over a carrier-wide one
pub fn lookup_acceptance<'a>(
    rules: &'a [AcceptanceRule],
    carrier_id: &str,
    condition_code: &str,
    imo_id: &str,
    product_type: ProductType,
) -> Option<&'a AcceptanceRule> {
    let mut candidates = rules.iter().filter(|r| {
        r.carrier_id == carrier_id
            && r.condition_code == condition_code
            && r.imo_id.as_deref().map_or(true, |imo| imo == imo_id)
            && r.product_type.map_or(true, |t| t == product_type)
    });

    let first = candidates.next()?;
    if first.product_type.is_some() {
        return Some(first);
    }
    Some(candidates.find(|r| r.product_type.is_some()).unwrap_or(first))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(product_type: Option<ProductType>, acceptance: AcceptanceDecision) -> AcceptanceRule {
        AcceptanceRule {
            carrier_id: "c1".into(),
            condition_code: "diabetes".into(),
            imo_id: None,
            product_type,
            acceptance,
            approval_likelihood: Some(0.7),
            health_class_result: Some("standard".into()),
            notes: None,
        }
    }

    #[test]
    fn test_product_specific_rule_preferred() {
        let rules = vec![
            rule(None, AcceptanceDecision::Approved),
            rule(Some(ProductType::TermLife), AcceptanceDecision::Declined),
        ];
        let found = lookup_acceptance(&rules, "c1", "diabetes", "imo-1", ProductType::TermLife).unwrap();
        assert_eq!(found.acceptance, AcceptanceDecision::Declined);

        let found = lookup_acceptance(&rules, "c1", "diabetes", "imo-1", ProductType::WholeLife).unwrap();
        assert_eq!(found.acceptance, AcceptanceDecision::Approved);
    }

    #[test]
    fn test_other_carrier_or_imo_ignored() {
        let mut other_imo = rule(None, AcceptanceDecision::Approved);
        other_imo.imo_id = Some("imo-2".into());
        let rules = vec![other_imo];
        assert!(lookup_acceptance(&rules, "c1", "diabetes", "imo-1", ProductType::TermLife).is_none());
        assert!(lookup_acceptance(&rules, "c9", "diabetes", "imo-2", ProductType::TermLife).is_none());
    }

    #[test]
    fn test_deserialize_snake_case() {
        let parsed: AcceptanceRule = serde_json::from_str(
            r#"{"carrier_id":"c1","condition_code":"copd","acceptance":"case_by_case"}"#,
        )
        .unwrap();
        assert_eq!(parsed.acceptance, AcceptanceDecision::CaseByCase);
        assert!(parsed.approval_likelihood.is_none());
    }
}
