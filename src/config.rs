//! Engine configuration
//!
//! Every field has a default so a partial JSON file (or none at all) yields a
//! usable configuration.

use crate::error::{EngineError, Result};
use crate::rules::FlatExtraComposition;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Environment variable naming a JSON config file for [`EngineConfig::from_env`]
pub const CONFIG_ENV_VAR: &str = "UNDERWRITING_CONFIG";

fn default_approval_weight() -> f64 {
    0.4
}

fn default_price_weight() -> f64 {
    0.6
}

fn default_unknown_confidence_floor() -> f64 {
    0.5
}

fn default_premium_guardrail() -> f64 {
    100_000.0
}

fn default_parallel_product_limit() -> usize {
    10
}

fn default_quick_quote_term() -> u32 {
    20
}

fn default_flat_extra_composition() -> FlatExtraComposition {
    FlatExtraComposition::Max
}

fn default_true() -> bool {
    true
}

fn default_max_recommendations() -> usize {
    4
}

/// Tunables for scoring, pricing guardrails and parallelism
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    /// Weight of approval likelihood in the final score
    #[serde(default = "default_approval_weight")]
    pub approval_weight: f64,

    /// Weight of the relative price score in the final score
    #[serde(default = "default_price_weight")]
    pub price_weight: f64,

    /// Base of the confidence multiplier applied to unknown-eligibility products
    /// (`floor + confidence * (1 - floor)`)
    #[serde(default = "default_unknown_confidence_floor")]
    pub unknown_confidence_floor: f64,

    /// Monthly premiums above this are treated as bad data
    #[serde(default = "default_premium_guardrail")]
    pub premium_guardrail: f64,

    /// Max products evaluated concurrently; 0 uses the global rayon pool
    #[serde(default = "default_parallel_product_limit")]
    pub parallel_product_limit: usize,

    #[serde(default = "default_quick_quote_term")]
    pub default_quick_quote_term: u32,

    #[serde(default = "default_flat_extra_composition")]
    pub flat_extra_composition: FlatExtraComposition,

    /// Use per-condition acceptance rules when a carrier has no rule sets
    #[serde(default = "default_true")]
    pub legacy_acceptance_fallback: bool,

    #[serde(default = "default_max_recommendations")]
    pub max_recommendations: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            approval_weight: default_approval_weight(),
            price_weight: default_price_weight(),
            unknown_confidence_floor: default_unknown_confidence_floor(),
            premium_guardrail: default_premium_guardrail(),
            parallel_product_limit: default_parallel_product_limit(),
            default_quick_quote_term: default_quick_quote_term(),
            flat_extra_composition: default_flat_extra_composition(),
            legacy_acceptance_fallback: default_true(),
            max_recommendations: default_max_recommendations(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: EngineConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from the file named by `UNDERWRITING_CONFIG`, or defaults when unset
    pub fn from_env() -> Result<Self> {
        match std::env::var(CONFIG_ENV_VAR) {
            Ok(path) if !path.trim().is_empty() => {
                log::info!("Loading engine config from {}", path);
                Self::from_json_file(path.trim())
            }
            _ => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.approval_weight < 0.0 || self.price_weight < 0.0 {
            return Err(EngineError::Config("score weights must be non-negative".into()));
        }
        if !(0.0..=1.0).contains(&self.unknown_confidence_floor) {
            return Err(EngineError::Config(
                "unknownConfidenceFloor must be between 0 and 1".into(),
            ));
        }
        if self.premium_guardrail <= 0.0 {
            return Err(EngineError::Config("premiumGuardrail must be positive".into()));
        }
        Ok(())
    }
}
