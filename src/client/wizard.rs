//! Quick-quote wizard form data and its conversion into engine input

use super::health::{calculate_age, calculate_bmi};
use super::responses::transform_condition_responses;
use super::{ClientProfile, CoverageRequest, DecisionEngineInput, Gender};
use crate::products::ProductType;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Smallest face amount the wizard treats as a real coverage request
const MIN_WIZARD_FACE_AMOUNT: f64 = 10_000.0;

/// Client step of the wizard. Gender may be `other` or blank.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WizardClientInfo {
    pub name: String,
    pub dob: Option<String>,
    pub age: u32,
    pub gender: String,
    pub state: String,
    pub height_feet: u32,
    pub height_inches: u32,
    pub weight: f64,
}

/// Follow-up answers for one reported condition
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionResponse {
    pub condition_code: String,
    #[serde(default)]
    pub condition_name: String,
    #[serde(default)]
    pub responses: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TobaccoInfo {
    pub current_use: bool,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_use_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MedicationInfo {
    pub bp_med_count: u32,
    pub cholesterol_med_count: u32,
    pub other_medications: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HealthInfo {
    pub conditions: Vec<ConditionResponse>,
    pub tobacco: TobaccoInfo,
    pub medications: MedicationInfo,
}

/// Coverage step: up to three face amounts to compare
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WizardCoverage {
    pub face_amounts: Vec<f64>,
    pub product_types: Vec<ProductType>,
}

impl WizardCoverage {
    /// First amount of at least $10,000, else the first amount, else 0
    pub fn primary_face_amount(&self) -> f64 {
        self.face_amounts
            .iter()
            .copied()
            .find(|a| *a >= MIN_WIZARD_FACE_AMOUNT)
            .or_else(|| self.face_amounts.first().copied())
            .unwrap_or(0.0)
    }
}

fn parse_dob(dob: &str) -> Option<NaiveDate> {
    let trimmed = dob.trim();
    let date_part = trimmed.get(..10).unwrap_or(trimmed);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
}

/// Build the engine request from the wizard's three steps.
///
/// `today` is used for the age-from-dob calculation and for date answers in
/// condition follow-ups.
pub fn transform_wizard_to_input(
    client: &WizardClientInfo,
    health: &HealthInfo,
    coverage: &WizardCoverage,
    imo_id: &str,
    term_years: Option<u32>,
    today: NaiveDate,
) -> DecisionEngineInput {
    let age = client
        .dob
        .as_deref()
        .and_then(parse_dob)
        .map(|dob| calculate_age(dob, today))
        .unwrap_or(client.age);

    let gender = match client.gender.trim().to_ascii_lowercase().as_str() {
        "female" => Gender::Female,
        "male" => Gender::Male,
        other => {
            log::warn!(
                "Gender \"{}\" has no rate class; pricing with male rates",
                other
            );
            Gender::Male
        }
    };

    let bmi = calculate_bmi(
        client.height_feet as f64,
        client.height_inches as f64,
        client.weight,
    );
    let has_build = client.height_feet > 0 && client.weight > 0.0;

    let state = client.state.trim();

    DecisionEngineInput {
        client: ClientProfile {
            age,
            gender,
            state: (!state.is_empty()).then(|| state.to_string()),
            bmi: (has_build && bmi > 0.0).then_some(bmi),
            tobacco: health.tobacco.current_use,
            health_conditions: health
                .conditions
                .iter()
                .map(|c| c.condition_code.clone())
                .collect(),
            condition_responses: transform_condition_responses(&health.conditions, age, today),
            height_feet: has_build.then_some(client.height_feet),
            height_inches: has_build.then_some(client.height_inches),
            weight: has_build.then_some(client.weight),
        },
        coverage: CoverageRequest {
            face_amount: coverage.primary_face_amount(),
            product_types: coverage.product_types.clone(),
            face_amounts: coverage.face_amounts.clone(),
        },
        imo_id: imo_id.to_string(),
        term_years,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 1).unwrap()
    }

    fn client() -> WizardClientInfo {
        WizardClientInfo {
            name: "Pat Doe".into(),
            dob: None,
            age: 42,
            gender: "female".into(),
            state: "TX".into(),
            height_feet: 5,
            height_inches: 6,
            weight: 150.0,
        }
    }

    #[test]
    fn test_basic_transform() {
        let health = HealthInfo {
            conditions: vec![ConditionResponse {
                condition_code: "diabetes".into(),
                condition_name: "Diabetes".into(),
                responses: json!({"a1c_level": 6.5}).as_object().cloned().unwrap(),
            }],
            tobacco: TobaccoInfo { current_use: true, ..Default::default() },
            medications: MedicationInfo::default(),
        };
        let coverage = WizardCoverage {
            face_amounts: vec![5_000.0, 250_000.0, 500_000.0],
            product_types: vec![ProductType::TermLife],
        };

        let input = transform_wizard_to_input(&client(), &health, &coverage, "imo-1234567890", Some(20), today());

        assert_eq!(input.client.age, 42);
        assert_eq!(input.client.gender, Gender::Female);
        assert_eq!(input.client.state.as_deref(), Some("TX"));
        assert_eq!(input.client.bmi, Some(24.2));
        assert!(input.client.tobacco);
        assert_eq!(input.client.health_conditions, vec!["diabetes".to_string()]);
        assert_eq!(input.client.condition_responses["diabetes"]["good_control"], json!(true));
        assert_eq!(input.coverage.face_amount, 250_000.0);
        assert_eq!(input.coverage.face_amounts.len(), 3);
        assert_eq!(input.term_years, Some(20));
    }

    #[test]
    fn test_dob_overrides_stated_age() {
        let mut c = client();
        c.dob = Some("1980-06-15".into());
        let input = transform_wizard_to_input(
            &c,
            &HealthInfo::default(),
            &WizardCoverage::default(),
            "imo-1234567890",
            None,
            today(),
        );
        assert_eq!(input.client.age, 44);
        assert_eq!(input.coverage.face_amount, 0.0);
    }

    #[test]
    fn test_non_binary_gender_falls_back_to_male() {
        let mut c = client();
        c.gender = "other".into();
        c.state = " ".into();
        c.height_feet = 0;
        let input = transform_wizard_to_input(
            &c,
            &HealthInfo::default(),
            &WizardCoverage::default(),
            "imo-1234567890",
            None,
            today(),
        );
        assert_eq!(input.client.gender, Gender::Male);
        assert!(input.client.state.is_none());
        assert!(input.client.height_feet.is_none());
    }
}
