//! Insurance products, their issue limits and the catalog they live in

pub mod acceptance;
pub mod catalog;
pub mod loader;

pub use acceptance::{lookup_acceptance, AcceptanceDecision, AcceptanceRule};
pub use catalog::{BuildChartAssignment, ProductCatalog};
pub use loader::{load_products, load_products_from_reader};

use crate::error::{EngineError, Result};
use serde::{Deserialize, Serialize};

/// Face amount used when neither the product nor its tiers set a cap (2^53 - 1)
pub const MAX_SAFE_FACE: f64 = 9_007_199_254_740_991.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductType {
    TermLife,
    WholeLife,
    ParticipatingWholeLife,
    UniversalLife,
    IndexedUniversalLife,
    FinalExpense,
}

impl ProductType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductType::TermLife => "term_life",
            ProductType::WholeLife => "whole_life",
            ProductType::ParticipatingWholeLife => "participating_whole_life",
            ProductType::UniversalLife => "universal_life",
            ProductType::IndexedUniversalLife => "indexed_universal_life",
            ProductType::FinalExpense => "final_expense",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value.trim() {
            "term_life" => Ok(ProductType::TermLife),
            "whole_life" => Ok(ProductType::WholeLife),
            "participating_whole_life" => Ok(ProductType::ParticipatingWholeLife),
            "universal_life" => Ok(ProductType::UniversalLife),
            "indexed_universal_life" => Ok(ProductType::IndexedUniversalLife),
            "final_expense" => Ok(ProductType::FinalExpense),
            other => Err(EngineError::unknown("product type", other)),
        }
    }

    pub fn is_term(&self) -> bool {
        matches!(self, ProductType::TermLife)
    }
}

/// Tighter face cap for one term length inside an age tier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TermRestriction {
    pub term_years: u32,
    pub max_face_amount: f64,
}

/// Face cap for an inclusive issue-age band
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgeTier {
    pub min_age: u32,
    pub max_age: u32,
    pub max_face_amount: f64,
    #[serde(default)]
    pub term_restrictions: Vec<TermRestriction>,
}

impl AgeTier {
    pub fn contains(&self, age: u32) -> bool {
        age >= self.min_age && age <= self.max_age
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgeTieredFaceAmounts {
    #[serde(default)]
    pub tiers: Vec<AgeTier>,
}

/// Free-form product metadata; only the age-tier table is interpreted
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age_tiered_face_amounts: Option<AgeTieredFaceAmounts>,
}

impl ProductMetadata {
    pub fn tiers(&self) -> &[AgeTier] {
        self.age_tiered_face_amounts
            .as_ref()
            .map(|t| t.tiers.as_slice())
            .unwrap_or(&[])
    }
}

/// Product row as offered to the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductCandidate {
    pub product_id: String,
    pub product_name: String,
    pub carrier_id: String,
    pub carrier_name: String,
    pub product_type: ProductType,
    pub min_age: Option<u32>,
    pub max_age: Option<u32>,
    pub min_face_amount: Option<f64>,
    pub max_face_amount: Option<f64>,
    #[serde(default)]
    pub metadata: Option<ProductMetadata>,
    #[serde(default)]
    pub build_chart_id: Option<String>,
    /// Owning IMO; `None` means shared with every IMO
    #[serde(default)]
    pub imo_id: Option<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

/// Maximum face amount for an age, optionally tightened for a term length.
///
/// Starts from the product max (or [`MAX_SAFE_FACE`]); every tier containing
/// `age` contributes its max, or the matching term restriction's max when
/// `term_years` is given. The smallest value wins.
pub fn get_max_face_amount_for_age_term(
    metadata: Option<&ProductMetadata>,
    product_max: Option<f64>,
    age: u32,
    term_years: Option<u32>,
) -> f64 {
    let mut max_face = product_max.unwrap_or(MAX_SAFE_FACE);
    let Some(metadata) = metadata else {
        return max_face;
    };

    for tier in metadata.tiers().iter().filter(|t| t.contains(age)) {
        let restricted = term_years.and_then(|term| {
            tier.term_restrictions
                .iter()
                .find(|r| r.term_years == term)
                .map(|r| r.max_face_amount)
        });
        max_face = max_face.min(restricted.unwrap_or(tier.max_face_amount));
    }

    max_face
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgeLimits {
    pub min_issue_age: Option<u32>,
    pub max_issue_age: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FaceAmountLimits {
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
    #[serde(default)]
    pub age_tiers: Vec<AgeTier>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KnockoutConditions {
    #[serde(default)]
    pub condition_codes: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateAvailability {
    #[serde(default)]
    pub unavailable_states: Vec<String>,
}

/// Underwriting limits extracted from a carrier guide
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedCriteria {
    #[serde(default)]
    pub age_limits: Option<AgeLimits>,
    #[serde(default)]
    pub face_amount_limits: Option<FaceAmountLimits>,
    #[serde(default)]
    pub knockout_conditions: Option<KnockoutConditions>,
    #[serde(default)]
    pub state_availability: Option<StateAvailability>,
}
