//! In-memory product catalog: everything the engine reads about products.
//!
//! Loaded once from a catalog directory and shared read-only across product
//! evaluations:
//!
//! | file                 | contents                                  |
//! |----------------------|-------------------------------------------|
//! | `products.csv`       | product rows (required)                   |
//! | `premium_matrix.csv` | rate grids keyed by product id (required) |
//! | `metadata.json`      | product id -> metadata (age tiers)        |
//! | `criteria.json`      | product id -> extracted criteria          |
//! | `build_charts.json`  | carrier build charts                      |
//! | `rule_sets.json`     | underwriting rule sets                    |
//! | `acceptance.json`    | per-condition acceptance rules            |

use super::acceptance::{lookup_acceptance, AcceptanceRule};
use super::loader::{load_json_list, load_json_map, load_products};
use super::{ExtractedCriteria, ProductCandidate, ProductMetadata};
use crate::build_chart::BuildChart;
use crate::client::DecisionEngineInput;
use crate::error::Result;
use crate::rates::{load_premium_matrices, PremiumMatrix};
use crate::rules::{RuleSetScope, UnderwritingRuleSet};
use log::{debug, info, warn};
use std::collections::HashMap;
use std::path::Path;

/// Where a product's build chart came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildChartAssignment {
    /// Named by the product's `build_chart_id`
    Product,
    /// The carrier's default chart for the IMO
    CarrierDefault,
}

/// Products plus the per-product data the engine evaluates them against
///
/// # Example
/// ```ignore
/// let catalog = ProductCatalog::load_from("data/catalog")?;
/// let candidates = catalog.candidates_for(&input);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ProductCatalog {
    products: Vec<ProductCandidate>,
    matrices: HashMap<String, PremiumMatrix>,
    criteria: HashMap<String, ExtractedCriteria>,
    build_charts: Vec<BuildChart>,
    rule_sets: Vec<UnderwritingRuleSet>,
    acceptance_rules: Vec<AcceptanceRule>,
}

impl ProductCatalog {
    pub fn new(products: Vec<ProductCandidate>) -> Self {
        Self {
            products,
            ..Default::default()
        }
    }

    /// Load a catalog directory; only the two CSV files are required
    pub fn load_from<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        let products = load_products(dir.join("products.csv"))?;
        let matrices = load_premium_matrices(dir.join("premium_matrix.csv"))?;

        let mut catalog = Self::new(products).with_matrices(matrices);

        let metadata_path = dir.join("metadata.json");
        if metadata_path.exists() {
            let metadata: HashMap<String, ProductMetadata> = load_json_map(&metadata_path)?;
            catalog = catalog.with_metadata(metadata);
        }
        let criteria_path = dir.join("criteria.json");
        if criteria_path.exists() {
            catalog = catalog.with_criteria(load_json_map(&criteria_path)?);
        }
        let charts_path = dir.join("build_charts.json");
        if charts_path.exists() {
            catalog = catalog.with_build_charts(load_json_list(&charts_path)?);
        }
        let rules_path = dir.join("rule_sets.json");
        if rules_path.exists() {
            catalog = catalog.with_rule_sets(load_json_list(&rules_path)?);
        }
        let acceptance_path = dir.join("acceptance.json");
        if acceptance_path.exists() {
            catalog = catalog.with_acceptance_rules(load_json_list(&acceptance_path)?);
        }

        info!(
            "Loaded catalog from {}: {} products, {} rate grids, {} build charts, {} rule sets, {} acceptance rules",
            dir.display(),
            catalog.products.len(),
            catalog.matrices.len(),
            catalog.build_charts.len(),
            catalog.rule_sets.len(),
            catalog.acceptance_rules.len()
        );
        Ok(catalog)
    }

    pub fn with_matrix(mut self, product_id: impl Into<String>, matrix: PremiumMatrix) -> Self {
        self.matrices.insert(product_id.into(), matrix);
        self
    }

    pub fn with_matrices(mut self, matrices: HashMap<String, PremiumMatrix>) -> Self {
        self.matrices.extend(matrices);
        self
    }

    /// Attach metadata to the products it names; unknown ids are ignored
    pub fn with_metadata(mut self, metadata: HashMap<String, ProductMetadata>) -> Self {
        for product in &mut self.products {
            if let Some(m) = metadata.get(&product.product_id) {
                product.metadata = Some(m.clone());
            }
        }
        self
    }

    pub fn with_criteria(mut self, criteria: HashMap<String, ExtractedCriteria>) -> Self {
        self.criteria.extend(criteria);
        self
    }

    pub fn with_build_charts(mut self, charts: Vec<BuildChart>) -> Self {
        self.build_charts.extend(charts);
        self
    }

    pub fn with_rule_sets(mut self, rule_sets: Vec<UnderwritingRuleSet>) -> Self {
        self.rule_sets.extend(rule_sets);
        self
    }

    pub fn with_acceptance_rules(mut self, rules: Vec<AcceptanceRule>) -> Self {
        self.acceptance_rules.extend(rules);
        self
    }

    pub fn products(&self) -> &[ProductCandidate] {
        &self.products
    }

    pub fn product(&self, product_id: &str) -> Option<&ProductCandidate> {
        self.products.iter().find(|p| p.product_id == product_id)
    }

    pub fn matrix_for(&self, product_id: &str) -> Option<&PremiumMatrix> {
        self.matrices.get(product_id)
    }

    pub fn criteria_for(&self, product_id: &str) -> Option<&ExtractedCriteria> {
        self.criteria.get(product_id)
    }

    pub fn acceptance_rules(&self) -> &[AcceptanceRule] {
        &self.acceptance_rules
    }

    /// Active products visible to the request's IMO, limited to the requested
    /// product types when any are given
    pub fn candidates_for(&self, input: &DecisionEngineInput) -> Vec<&ProductCandidate> {
        let types = &input.coverage.product_types;
        self.products
            .iter()
            .filter(|p| p.is_active)
            .filter(|p| p.imo_id.as_deref().map_or(true, |imo| imo == input.imo_id))
            .filter(|p| types.is_empty() || types.contains(&p.product_type))
            .collect()
    }

    /// The product's own chart, else the carrier default for the IMO.
    ///
    /// Carrier defaults prefer `is_default` charts, then file order. A
    /// product naming a chart that does not exist gets none.
    pub fn build_chart_for(
        &self,
        product: &ProductCandidate,
        imo_id: &str,
    ) -> Option<(&BuildChart, BuildChartAssignment)> {
        if let Some(chart_id) = product.build_chart_id.as_deref() {
            let chart = self.build_charts.iter().find(|c| c.id == chart_id);
            if chart.is_none() {
                warn!(
                    "Product {} references missing build chart {}",
                    product.product_id, chart_id
                );
            }
            return chart.map(|c| (c, BuildChartAssignment::Product));
        }

        let mut carrier_charts = self.build_charts.iter().filter(|c| {
            c.carrier_id == product.carrier_id
                && c.imo_id.as_deref().map_or(true, |imo| imo == imo_id)
        });
        let first = carrier_charts.next()?;
        let chart = if first.is_default {
            first
        } else {
            carrier_charts.find(|c| c.is_default).unwrap_or(first)
        };
        debug!(
            "Product {} uses carrier default build chart {}",
            product.product_id, chart.id
        );
        Some((chart, BuildChartAssignment::CarrierDefault))
    }

    /// Approved, active rule sets for a carrier/product of one scope
    pub fn rule_sets_for(
        &self,
        carrier_id: &str,
        product_id: &str,
        imo_id: &str,
        scope: RuleSetScope,
    ) -> Vec<&UnderwritingRuleSet> {
        self.rule_sets
            .iter()
            .filter(|rs| rs.scope == scope && rs.is_applicable(carrier_id, product_id))
            .filter(|rs| rs.imo_id.as_deref().map_or(true, |imo| imo == imo_id))
            .collect()
    }

    /// Whether any rule set (either scope) covers the carrier/product
    pub fn has_rule_sets(&self, carrier_id: &str, product_id: &str, imo_id: &str) -> bool {
        self.rule_sets.iter().any(|rs| {
            rs.is_applicable(carrier_id, product_id)
                && rs.imo_id.as_deref().map_or(true, |imo| imo == imo_id)
        })
    }

    pub fn acceptance_for(
        &self,
        product: &ProductCandidate,
        condition_code: &str,
        imo_id: &str,
    ) -> Option<&AcceptanceRule> {
        lookup_acceptance(
            &self.acceptance_rules,
            &product.carrier_id,
            condition_code,
            imo_id,
            product.product_type,
        )
    }
}
