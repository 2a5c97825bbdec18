//! Quick quotes: three face amounts (or three budgets) across every matching
//! product, without running underwriting.
//!
//! Rates are read for the class the user picks; there is no class fallback
//! and no extrapolation outside a product's grid.

use super::interpolate::{estimate_premium, PremiumQuery, PREMIUM_GUARDRAIL};
use super::matrix::{PremiumMatrix, RateClass, TobaccoClass, RATE_CLASS_LADDER};
use super::quotes::cost_per_thousand;
use crate::client::Gender;
use crate::products::{AgeTier, ProductCandidate, ProductCatalog, ProductType};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Product types the quick quote prices
pub const QUOTABLE_TYPES: [ProductType; 4] = [
    ProductType::TermLife,
    ProductType::WholeLife,
    ProductType::ParticipatingWholeLife,
    ProductType::IndexedUniversalLife,
];

/// Term used for term products when the user has not picked one
pub const DEFAULT_QUICK_QUOTE_TERM: u32 = 20;

/// Ages at or above this on a product mean "no limit"; the matrix decides
const OPEN_MAX_AGE: u32 = 120;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuickQuoteInput {
    pub age: u32,
    pub gender: Gender,
    #[serde(default)]
    pub tobacco_use: bool,
    pub health_class: RateClass,
    pub product_types: Vec<ProductType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub term_years: Option<u32>,
}

/// One of the three columns of a quote row
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteColumn {
    /// Face amount in coverage mode, monthly budget in budget mode
    pub input_value: f64,
    pub premium: Option<f64>,
    pub coverage: Option<f64>,
    pub cost_per_thousand: Option<f64>,
}

impl QuoteColumn {
    fn empty(input_value: f64) -> Self {
        Self {
            input_value,
            premium: None,
            coverage: None,
            cost_per_thousand: None,
        }
    }

    fn priced(input_value: f64, premium: f64, coverage: f64) -> Self {
        Self {
            input_value,
            premium: Some(premium),
            coverage: Some(coverage),
            cost_per_thousand: cost_per_thousand(premium, coverage),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuickQuoteResult {
    pub product_id: String,
    pub product_name: String,
    pub carrier_id: String,
    pub carrier_name: String,
    pub product_type: ProductType,
    pub term_years: Option<u32>,
    pub columns: [QuoteColumn; 3],
    pub avg_cost_per_thousand: Option<f64>,
}

/// Issue limits of one product, filled in from its matrix where unset
#[derive(Debug, Clone, PartialEq)]
pub struct ProductConstraints {
    pub min_age: u32,
    pub max_age: u32,
    pub min_face_amount: f64,
    pub max_face_amount: f64,
    pub age_tiers: Vec<AgeTier>,
}

impl ProductConstraints {
    fn derive(product: &ProductCandidate, matrix: &PremiumMatrix) -> Self {
        let (matrix_min_age, matrix_max_age) = matrix.age_range().unwrap_or((0, OPEN_MAX_AGE));
        let (matrix_min_face, matrix_max_face) = matrix.face_range().unwrap_or((0.0, 0.0));

        Self {
            min_age: product.min_age.filter(|a| *a > 0).unwrap_or(matrix_min_age),
            max_age: product.max_age.filter(|a| *a < OPEN_MAX_AGE).unwrap_or(matrix_max_age),
            min_face_amount: product.min_face_amount.unwrap_or(matrix_min_face),
            max_face_amount: product.max_face_amount.unwrap_or(matrix_max_face),
            age_tiers: product
                .metadata
                .as_ref()
                .map(|m| m.tiers().to_vec())
                .unwrap_or_default(),
        }
    }

    /// Max face for an age: the first tier containing it, else the product max
    pub fn max_face_for_age(&self, age: u32) -> f64 {
        self.age_tiers
            .iter()
            .find(|t| t.contains(age))
            .map_or(self.max_face_amount, |t| t.max_face_amount)
    }

    fn covers_age(&self, age: u32) -> bool {
        age >= self.min_age && age <= self.max_age
    }
}

#[derive(Debug, Clone)]
struct QuoteProduct {
    product: ProductCandidate,
    constraints: ProductConstraints,
    /// Inclusive issue-age range per term length
    term_ages: BTreeMap<u32, (u32, u32)>,
    matrix: PremiumMatrix,
}

impl QuoteProduct {
    fn is_term(&self) -> bool {
        self.product.product_type.is_term()
    }

    fn term_fits(&self, term: u32, age: u32) -> bool {
        self.term_ages
            .get(&term)
            .is_some_and(|(lo, hi)| age >= *lo && age <= *hi)
    }

    fn accepts_age(&self, age: u32, term: Option<u32>) -> bool {
        if !self.constraints.covers_age(age) {
            return false;
        }
        if !self.is_term() || self.term_ages.is_empty() {
            return true;
        }
        match term {
            Some(term) => self.term_fits(term, age),
            None => self.term_ages.keys().any(|&t| self.term_fits(t, age)),
        }
    }
}

/// Preloaded quick-quote calculator
///
/// # Example
/// ```ignore
/// let quoter = QuickQuoter::from_catalog(&catalog);
/// let rows = quoter.quotes_for_coverage(&input, [100_000.0, 250_000.0, 500_000.0]);
/// ```
#[derive(Debug, Clone)]
pub struct QuickQuoter {
    products: Vec<QuoteProduct>,
    default_term: u32,
    guardrail: f64,
}

impl QuickQuoter {
    /// Every active, quotable product in the catalog that has rates
    pub fn from_catalog(catalog: &ProductCatalog) -> Self {
        let products = catalog
            .products()
            .iter()
            .filter(|p| p.is_active && QUOTABLE_TYPES.contains(&p.product_type))
            .filter_map(|p| {
                let matrix = catalog.matrix_for(&p.product_id).filter(|m| !m.is_empty())?;
                let term_ages = matrix
                    .term_years()
                    .into_iter()
                    .filter_map(|t| Some((t, matrix.age_range_for_term(Some(t))?)))
                    .collect();
                Some(QuoteProduct {
                    product: p.clone(),
                    constraints: ProductConstraints::derive(p, matrix),
                    term_ages,
                    matrix: matrix.clone(),
                })
            })
            .collect();

        Self {
            products,
            default_term: DEFAULT_QUICK_QUOTE_TERM,
            guardrail: PREMIUM_GUARDRAIL,
        }
    }

    pub fn with_default_term(mut self, term_years: u32) -> Self {
        self.default_term = term_years;
        self
    }

    pub fn with_guardrail(mut self, guardrail: f64) -> Self {
        self.guardrail = guardrail;
        self
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    pub fn constraints_for(&self, product_id: &str) -> Option<&ProductConstraints> {
        self.products
            .iter()
            .find(|p| p.product.product_id == product_id)
            .map(|p| &p.constraints)
    }

    /// Products of the requested types that issue at `age` (and `term`),
    /// sorted by carrier then product name
    pub fn matching_products(
        &self,
        product_types: &[ProductType],
        age: u32,
        term_years: Option<u32>,
    ) -> Vec<&ProductCandidate> {
        self.matching(product_types, age, term_years)
            .into_iter()
            .map(|p| &p.product)
            .collect()
    }

    fn matching(&self, product_types: &[ProductType], age: u32, term_years: Option<u32>) -> Vec<&QuoteProduct> {
        let mut matched: Vec<&QuoteProduct> = self
            .products
            .iter()
            .filter(|p| product_types.contains(&p.product.product_type))
            .filter(|p| p.accepts_age(age, term_years))
            .collect();

        matched.sort_by(|a, b| {
            a.product
                .carrier_name
                .cmp(&b.product.carrier_name)
                .then_with(|| a.product.product_name.cmp(&b.product.product_name))
        });
        matched
    }

    fn term_for(&self, product: &QuoteProduct, input: &QuickQuoteInput) -> Option<u32> {
        product
            .is_term()
            .then(|| input.term_years.unwrap_or(self.default_term))
    }

    fn query(&self, input: &QuickQuoteInput, face_amount: f64, term_years: Option<u32>) -> PremiumQuery {
        PremiumQuery {
            age: input.age,
            face_amount,
            gender: input.gender,
            tobacco_class: TobaccoClass::from_tobacco_use(input.tobacco_use),
            health_class: input.health_class,
            term_years,
        }
    }

    /// Coverage mode: the premium of each face amount on every matching product
    pub fn quotes_for_coverage(&self, input: &QuickQuoteInput, face_amounts: [f64; 3]) -> Vec<QuickQuoteResult> {
        let results = self
            .matching(&input.product_types, input.age, input.term_years)
            .into_iter()
            .map(|product| {
                let term_years = self.term_for(product, input);
                let max_face = product.constraints.max_face_for_age(input.age);

                let columns = face_amounts.map(|face| {
                    if face > max_face {
                        return QuoteColumn::empty(face);
                    }
                    let query = self.query(input, face, term_years);
                    match estimate_premium(&product.matrix, &query, self.guardrail) {
                        Some(premium) => QuoteColumn::priced(face, premium, face),
                        None => QuoteColumn::empty(face),
                    }
                });

                build_result(product, term_years, columns)
            })
            .collect();

        sort_by_cost(results)
    }

    /// Budget mode: the largest grid face amount each budget buys, capped at
    /// the age-tier max and repriced there
    pub fn quotes_for_budget(&self, input: &QuickQuoteInput, budgets: [f64; 3]) -> Vec<QuickQuoteResult> {
        let results = self
            .matching(&input.product_types, input.age, input.term_years)
            .into_iter()
            .map(|product| {
                let term_years = self.term_for(product, input);
                let max_face = product.constraints.max_face_for_age(input.age);

                let columns = budgets.map(|budget| {
                    let Some((face, premium)) = self.max_coverage_for_budget(product, input, term_years, budget)
                    else {
                        return QuoteColumn::empty(budget);
                    };

                    if face > max_face {
                        let query = self.query(input, max_face, term_years);
                        let repriced = estimate_premium(&product.matrix, &query, self.guardrail).unwrap_or(premium);
                        return QuoteColumn::priced(budget, repriced, max_face);
                    }
                    QuoteColumn::priced(budget, premium, face)
                });

                build_result(product, term_years, columns)
            })
            .collect();

        sort_by_cost(results)
    }

    fn max_coverage_for_budget(
        &self,
        product: &QuoteProduct,
        input: &QuickQuoteInput,
        term_years: Option<u32>,
        budget: f64,
    ) -> Option<(f64, f64)> {
        let tobacco = TobaccoClass::from_tobacco_use(input.tobacco_use);
        let mut faces: Vec<f64> = product
            .matrix
            .rows_for(input.gender, tobacco, input.health_class, term_years)
            .iter()
            .map(|r| r.face_amount)
            .collect();
        faces.sort_by(|a, b| a.total_cmp(b));
        faces.dedup();

        let mut best = None;
        let (mut lo, mut hi) = (0usize, faces.len());
        while lo < hi {
            let mid = (lo + hi) / 2;
            let face = faces[mid];
            match estimate_premium(&product.matrix, &self.query(input, face, term_years), self.guardrail) {
                Some(premium) if premium <= budget => {
                    best = Some((face, premium));
                    lo = mid + 1;
                }
                _ => hi = mid,
            }
        }
        best
    }

    /// Term lengths offered by term products of the given types
    pub fn available_term_years(&self, product_types: &[ProductType]) -> Vec<u32> {
        self.term_products(product_types)
            .flat_map(|p| p.term_ages.keys().copied())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Term lengths some term product issues at `age`
    pub fn available_term_years_for_age(&self, product_types: &[ProductType], age: u32) -> Vec<u32> {
        self.term_products(product_types)
            .flat_map(|p| p.term_ages.keys().copied().filter(move |&t| p.term_fits(t, age)))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Rate classes present for the given types, best to worst
    pub fn available_health_classes(&self, product_types: &[ProductType]) -> Vec<RateClass> {
        let present: BTreeSet<usize> = self
            .products
            .iter()
            .filter(|p| product_types.contains(&p.product.product_type))
            .flat_map(|p| p.matrix.health_classes())
            .filter_map(|c| c.ladder_index())
            .collect();
        present.into_iter().map(|i| RATE_CLASS_LADDER[i]).collect()
    }

    fn term_products<'a>(&'a self, product_types: &'a [ProductType]) -> impl Iterator<Item = &'a QuoteProduct> + 'a {
        self.products
            .iter()
            .filter(move |p| p.is_term() && product_types.contains(&p.product.product_type))
    }
}

fn build_result(product: &QuoteProduct, term_years: Option<u32>, columns: [QuoteColumn; 3]) -> QuickQuoteResult {
    let costs: Vec<f64> = columns.iter().filter_map(|c| c.cost_per_thousand).collect();
    let avg_cost_per_thousand = (!costs.is_empty()).then(|| costs.iter().sum::<f64>() / costs.len() as f64);

    QuickQuoteResult {
        product_id: product.product.product_id.clone(),
        product_name: product.product.product_name.clone(),
        carrier_id: product.product.carrier_id.clone(),
        carrier_name: product.product.carrier_name.clone(),
        product_type: product.product.product_type,
        term_years,
        columns,
        avg_cost_per_thousand,
    }
}

/// Cheapest average cost per thousand first, rows without quotes last
fn sort_by_cost(mut results: Vec<QuickQuoteResult>) -> Vec<QuickQuoteResult> {
    results.sort_by(|a, b| match (a.avg_cost_per_thousand, b.avg_cost_per_thousand) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::products::{AgeTieredFaceAmounts, ProductMetadata};
    use crate::rates::matrix::test_support::standard_matrix;
    use approx::assert_abs_diff_eq;

    fn product(id: &str, carrier: &str, product_type: ProductType) -> ProductCandidate {
        ProductCandidate {
            product_id: id.into(),
            product_name: format!("{} plan", id),
            carrier_id: format!("{}-id", carrier),
            carrier_name: carrier.into(),
            product_type,
            min_age: None,
            max_age: None,
            min_face_amount: None,
            max_face_amount: None,
            metadata: None,
            build_chart_id: None,
            imo_id: None,
            is_active: true,
        }
    }

    fn input(age: u32) -> QuickQuoteInput {
        QuickQuoteInput {
            age,
            gender: Gender::Male,
            tobacco_use: false,
            health_class: RateClass::Standard,
            product_types: vec![ProductType::TermLife, ProductType::WholeLife],
            term_years: None,
        }
    }

    fn quoter() -> QuickQuoter {
        let mut term20 = standard_matrix(RateClass::Standard, Some(20));
        term20.extend(standard_matrix(RateClass::Preferred, Some(20)));
        // 30-year term only issues up to 50
        term20.extend(
            standard_matrix(RateClass::Standard, Some(30))
                .into_iter()
                .filter(|r| r.age <= 50),
        );

        let mut whole = product("wl", "Beta Life", ProductType::WholeLife);
        whole.metadata = Some(ProductMetadata {
            age_tiered_face_amounts: Some(AgeTieredFaceAmounts {
                tiers: vec![AgeTier {
                    min_age: 50,
                    max_age: 60,
                    max_face_amount: 250_000.0,
                    term_restrictions: vec![],
                }],
            }),
        });

        let catalog = ProductCatalog::new(vec![
            product("term", "Alpha Mutual", ProductType::TermLife),
            whole,
            product("fe", "Gamma", ProductType::FinalExpense),
        ])
        .with_matrix("term", PremiumMatrix::new(term20))
        .with_matrix("wl", PremiumMatrix::new(standard_matrix(RateClass::Standard, None)))
        .with_matrix("fe", PremiumMatrix::new(standard_matrix(RateClass::Standard, None)));

        QuickQuoter::from_catalog(&catalog)
    }

    #[test]
    fn test_only_quotable_types_loaded() {
        let q = quoter();
        assert_eq!(q.len(), 2);
        assert!(q.constraints_for("fe").is_none());
        let c = q.constraints_for("wl").unwrap();
        assert_eq!((c.min_age, c.max_age), (30, 60));
        assert_eq!(c.max_face_amount, 500_000.0);
        assert_eq!(c.max_face_for_age(55), 250_000.0);
        assert_eq!(c.max_face_for_age(40), 500_000.0);
    }

    #[test]
    fn test_matching_products_sorted_and_term_aware() {
        let q = quoter();
        let names: Vec<&str> = q
            .matching_products(&input(40).product_types, 40, None)
            .iter()
            .map(|p| p.carrier_name.as_str())
            .collect();
        assert_eq!(names, vec!["Alpha Mutual", "Beta Life"]);

        // no 30-year rates at 55
        let at_55 = q.matching_products(&[ProductType::TermLife], 55, Some(30));
        assert!(at_55.is_empty());
        assert_eq!(q.matching_products(&[ProductType::TermLife], 55, Some(20)).len(), 1);
        assert!(q.matching_products(&[ProductType::TermLife], 65, None).is_empty());
    }

    #[test]
    fn test_coverage_mode() {
        let q = quoter();
        let rows = q.quotes_for_coverage(&input(40), [100_000.0, 250_000.0, 2_000_000.0]);
        assert_eq!(rows.len(), 2);

        let term = rows.iter().find(|r| r.product_id == "term").unwrap();
        assert_eq!(term.term_years, Some(20));
        assert_abs_diff_eq!(term.columns[1].premium.unwrap(), 55.0, epsilon = 1e-9);
        assert_eq!(term.columns[1].coverage, Some(250_000.0));
        assert_abs_diff_eq!(term.columns[1].cost_per_thousand.unwrap(), 0.22, epsilon = 1e-9);
        // above the matrix max: no quote
        assert_eq!(term.columns[2].premium, None);

        let whole = rows.iter().find(|r| r.product_id == "wl").unwrap();
        assert_eq!(whole.term_years, None);
        let expected = (0.4 + 0.22) / 2.0;
        assert_abs_diff_eq!(whole.avg_cost_per_thousand.unwrap(), expected, epsilon = 1e-9);
    }

    #[test]
    fn test_coverage_mode_respects_age_tier_cap() {
        let q = quoter();
        let rows = q.quotes_for_coverage(&input(55), [100_000.0, 250_000.0, 500_000.0]);
        let whole = rows.iter().find(|r| r.product_id == "wl").unwrap();
        assert!(whole.columns[1].premium.is_some());
        assert_eq!(whole.columns[2], QuoteColumn::empty(500_000.0));
    }

    #[test]
    fn test_budget_mode_finds_largest_affordable_face() {
        let q = quoter();
        let mut request = input(40);
        request.product_types = vec![ProductType::WholeLife];
        // premiums at 40: 100k -> 40, 250k -> 55, 500k -> 80
        let rows = q.quotes_for_budget(&request, [30.0, 60.0, 1_000.0]);
        let cols = rows[0].columns;
        assert_eq!(cols[0].coverage, None);
        assert_eq!(cols[1].coverage, Some(250_000.0));
        assert_abs_diff_eq!(cols[1].premium.unwrap(), 55.0, epsilon = 1e-9);
        assert_eq!(cols[2].coverage, Some(500_000.0));
    }

    #[test]
    fn test_budget_mode_caps_and_reprices() {
        let q = quoter();
        let mut request = input(55);
        request.product_types = vec![ProductType::WholeLife];
        let rows = q.quotes_for_budget(&request, [1_000.0, 1_000.0, 1_000.0]);
        let col = rows[0].columns[0];
        assert_eq!(col.coverage, Some(250_000.0));
        // 10 + 55 * 0.5 + 250 * 0.1
        assert_abs_diff_eq!(col.premium.unwrap(), 62.5, epsilon = 1e-9);
    }

    #[test]
    fn test_rows_without_quotes_sort_last() {
        let q = quoter();
        let mut request = input(40);
        request.health_class = RateClass::Preferred;
        let rows = q.quotes_for_coverage(&request, [100_000.0, 250_000.0, 500_000.0]);
        assert_eq!(rows.last().unwrap().product_id, "wl");
        assert_eq!(rows.last().unwrap().avg_cost_per_thousand, None);
        assert!(rows[0].avg_cost_per_thousand.is_some());
    }

    #[test]
    fn test_available_terms_and_classes() {
        let q = quoter();
        let all = [ProductType::TermLife, ProductType::WholeLife];
        assert_eq!(q.available_term_years(&all), vec![20, 30]);
        assert_eq!(q.available_term_years_for_age(&all, 55), vec![20]);
        assert!(q.available_term_years(&[ProductType::WholeLife]).is_empty());
        assert_eq!(
            q.available_health_classes(&all),
            vec![RateClass::Preferred, RateClass::Standard]
        );
    }

    #[test]
    fn test_default_term_configurable() {
        let q = quoter().with_default_term(30);
        let mut request = input(40);
        request.product_types = vec![ProductType::TermLife];
        let rows = q.quotes_for_coverage(&request, [100_000.0, 250_000.0, 500_000.0]);
        assert_eq!(rows[0].term_years, Some(30));
    }
}
