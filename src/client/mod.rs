//! Client profile and coverage request handed to the decision engine

pub mod health;
pub mod responses;
pub mod wizard;

pub use health::{calculate_age, calculate_age_today, calculate_bmi, BmiCategory, HealthTier};
pub use responses::transform_condition_responses;
pub use wizard::{
    transform_wizard_to_input, ConditionResponse, HealthInfo, WizardClientInfo, WizardCoverage,
};

use crate::error::{EngineError, Result};
use crate::products::ProductType;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Follow-up answers keyed by condition code, each a map of fact name to value
pub type ConditionResponses = BTreeMap<String, Map<String, Value>>;

/// Gender used for rate lookups (premium matrices only carry binary gender)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "male" | "m" => Ok(Gender::Male),
            "female" | "f" => Ok(Gender::Female),
            other => Err(EngineError::unknown("gender", other)),
        }
    }
}

/// Health and demographic profile of the applicant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientProfile {
    pub age: u32,
    pub gender: Gender,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bmi: Option<f64>,
    #[serde(default)]
    pub tobacco: bool,
    /// Condition codes, e.g. `diabetes`
    #[serde(default)]
    pub health_conditions: Vec<String>,
    #[serde(default)]
    pub condition_responses: ConditionResponses,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height_feet: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height_inches: Option<u32>,
    /// Weight in pounds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
}

impl ClientProfile {
    /// Minimal healthy profile, mostly for tests and CLI defaults
    pub fn new(age: u32, gender: Gender) -> Self {
        Self {
            age,
            gender,
            state: None,
            bmi: None,
            tobacco: false,
            health_conditions: Vec::new(),
            condition_responses: BTreeMap::new(),
            height_feet: None,
            height_inches: None,
            weight: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverageRequest {
    pub face_amount: f64,
    /// Empty means every product type
    #[serde(default)]
    pub product_types: Vec<ProductType>,
    /// Optional amounts to quote side by side
    #[serde(default)]
    pub face_amounts: Vec<f64>,
}

impl CoverageRequest {
    pub fn new(face_amount: f64) -> Self {
        Self {
            face_amount,
            product_types: Vec::new(),
            face_amounts: Vec::new(),
        }
    }
}

/// Full request for [`crate::engine::DecisionEngine::get_recommendations`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionEngineInput {
    pub client: ClientProfile,
    pub coverage: CoverageRequest,
    pub imo_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub term_years: Option<u32>,
}

impl DecisionEngineInput {
    /// Reject requests the engine cannot meaningfully evaluate
    pub fn validate(&self) -> Result<()> {
        if self.imo_id.len() < 10 {
            return Err(EngineError::InvalidInput(
                "Invalid imoId: must be a valid UUID string".into(),
            ));
        }
        if self.client.age > 120 {
            return Err(EngineError::InvalidInput(
                "Invalid client age: must be between 0 and 120".into(),
            ));
        }
        let face = self.coverage.face_amount;
        if !face.is_finite() || face <= 0.0 {
            return Err(EngineError::InvalidInput(
                "Invalid coverage amount: must be a positive number".into(),
            ));
        }
        Ok(())
    }
}
