//! Underwriting Engine - Life insurance product selection and pricing
//!
//! This library provides:
//! - Tri-state product eligibility (age, face amount, state, knockout conditions)
//! - Rule-based underwriting (predicate DSL, rule sets, outcome aggregation)
//! - Carrier build charts (height/weight and BMI tables)
//! - Premium matrix lookup with bilinear interpolation and class fallback
//! - Ranked, priced recommendations and quick quotes

pub mod build_chart;
pub mod client;
pub mod config;
pub mod engine;
pub mod error;
pub mod format;
pub mod products;
pub mod rates;
pub mod rules;
pub mod validation;

// Re-export commonly used types
pub use client::{calculate_age, calculate_bmi, ClientProfile, CoverageRequest, DecisionEngineInput, Gender};
pub use config::EngineConfig;
pub use engine::{DecisionEngine, DecisionEngineResult, EvaluatedProduct, Recommendation};
pub use error::{EngineError, Result};
pub use format::{format_currency, format_currency_cents, format_percentage};
pub use products::{ProductCandidate, ProductCatalog, ProductType};
pub use rates::{PremiumMatrix, QuickQuoter, RateClass};
pub use validation::{is_valid_hex_color, is_valid_safe_url};
