//! Premium matrix rows and the rate classes they are keyed on

use crate::client::Gender;
use crate::error::{EngineError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Issue ages carriers are asked to fill in when entering a rate grid
pub const GRID_AGES: [u32; 14] = [20, 25, 30, 35, 40, 45, 50, 55, 60, 65, 70, 75, 80, 85];

/// Face amounts of the standard rate grid
pub const GRID_FACE_AMOUNTS: [f64; 9] = [
    25_000.0, 50_000.0, 75_000.0, 100_000.0, 150_000.0, 200_000.0, 250_000.0, 500_000.0, 1_000_000.0,
];

/// Level-term lengths a matrix may carry
pub const TERM_OPTIONS: [u32; 5] = [10, 15, 20, 25, 30];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TobaccoClass {
    NonTobacco,
    Tobacco,
    PreferredNonTobacco,
}

impl TobaccoClass {
    pub fn from_tobacco_use(tobacco: bool) -> Self {
        if tobacco {
            TobaccoClass::Tobacco
        } else {
            TobaccoClass::NonTobacco
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value.trim() {
            "non_tobacco" => Ok(TobaccoClass::NonTobacco),
            "tobacco" => Ok(TobaccoClass::Tobacco),
            "preferred_non_tobacco" => Ok(TobaccoClass::PreferredNonTobacco),
            other => Err(EngineError::unknown("tobacco class", other)),
        }
    }
}

/// Health class a premium is requested for.
///
/// `Decline` and `Refer` can come out of underwriting but never carry rates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateClass {
    PreferredPlus,
    Preferred,
    StandardPlus,
    Standard,
    TableRated,
    Decline,
    Refer,
}

/// Rateable classes best to worst; also the premium fallback order
pub const RATE_CLASS_LADDER: [RateClass; 5] = [
    RateClass::PreferredPlus,
    RateClass::Preferred,
    RateClass::StandardPlus,
    RateClass::Standard,
    RateClass::TableRated,
];

impl RateClass {
    pub fn is_rateable(&self) -> bool {
        !matches!(self, RateClass::Decline | RateClass::Refer)
    }

    /// Position on [`RATE_CLASS_LADDER`], `None` for non-rateable classes
    pub fn ladder_index(&self) -> Option<usize> {
        RATE_CLASS_LADDER.iter().position(|c| c == self)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RateClass::PreferredPlus => "preferred_plus",
            RateClass::Preferred => "preferred",
            RateClass::StandardPlus => "standard_plus",
            RateClass::Standard => "standard",
            RateClass::TableRated => "table_rated",
            RateClass::Decline => "decline",
            RateClass::Refer => "refer",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RateClass::PreferredPlus => "Preferred Plus",
            RateClass::Preferred => "Preferred",
            RateClass::StandardPlus => "Standard Plus",
            RateClass::Standard => "Standard",
            RateClass::TableRated => "Table Rated",
            RateClass::Decline => "Decline",
            RateClass::Refer => "Refer",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value.trim() {
            "preferred_plus" => Ok(RateClass::PreferredPlus),
            "preferred" => Ok(RateClass::Preferred),
            "standard_plus" => Ok(RateClass::StandardPlus),
            "standard" => Ok(RateClass::Standard),
            "table_rated" => Ok(RateClass::TableRated),
            "decline" => Ok(RateClass::Decline),
            "refer" => Ok(RateClass::Refer),
            other => Err(EngineError::unknown("health class", other)),
        }
    }
}

/// One cell of a product's rate grid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PremiumMatrixRow {
    pub age: u32,
    pub face_amount: f64,
    pub monthly_premium: f64,
    pub gender: Gender,
    pub tobacco_class: TobaccoClass,
    pub health_class: RateClass,
    /// `None` for permanent products
    pub term_years: Option<u32>,
}

impl PremiumMatrixRow {
    fn matches(&self, gender: Gender, tobacco: TobaccoClass, class: RateClass, term: Option<u32>) -> bool {
        self.gender == gender
            && self.tobacco_class == tobacco
            && self.health_class == class
            && self.term_years == term
    }
}

/// All rate rows for one product
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PremiumMatrix {
    pub rows: Vec<PremiumMatrixRow>,
}

impl PremiumMatrix {
    pub fn new(rows: Vec<PremiumMatrixRow>) -> Self {
        Self { rows }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Non-empty and every row termless
    pub fn is_permanent(&self) -> bool {
        !self.rows.is_empty() && self.rows.iter().all(|r| r.term_years.is_none())
    }

    /// Rows for one rate cell family; `term = None` selects permanent rows
    pub fn rows_for(
        &self,
        gender: Gender,
        tobacco: TobaccoClass,
        class: RateClass,
        term: Option<u32>,
    ) -> Vec<&PremiumMatrixRow> {
        self.rows
            .iter()
            .filter(|r| r.matches(gender, tobacco, class, term))
            .collect()
    }

    /// Term lengths present in the matrix, ascending
    pub fn term_years(&self) -> Vec<u32> {
        let terms: BTreeSet<u32> = self.rows.iter().filter_map(|r| r.term_years).collect();
        terms.into_iter().collect()
    }

    /// Inclusive issue-age range covered by one term's rows
    pub fn age_range_for_term(&self, term: Option<u32>) -> Option<(u32, u32)> {
        let mut ages = self.rows.iter().filter(|r| r.term_years == term).map(|r| r.age);
        let first = ages.next()?;
        Some(ages.fold((first, first), |(lo, hi), a| (lo.min(a), hi.max(a))))
    }

    /// Terms whose rows span `age`, ascending
    pub fn available_terms_for_age(&self, age: u32) -> Vec<u32> {
        self.term_years()
            .into_iter()
            .filter(|&term| {
                self.age_range_for_term(Some(term))
                    .is_some_and(|(lo, hi)| age >= lo && age <= hi)
            })
            .collect()
    }

    pub fn longest_available_term_for_age(&self, age: u32) -> Option<u32> {
        self.available_terms_for_age(age).into_iter().max()
    }

    /// Distinct rate classes present, best to worst
    pub fn health_classes(&self) -> Vec<RateClass> {
        RATE_CLASS_LADDER
            .iter()
            .copied()
            .filter(|class| self.rows.iter().any(|r| r.health_class == *class))
            .collect()
    }

    /// Distinct face amounts, ascending
    pub fn face_amounts(&self) -> Vec<f64> {
        let mut faces: Vec<f64> = self.rows.iter().map(|r| r.face_amount).collect();
        faces.sort_by(|a, b| a.total_cmp(b));
        faces.dedup();
        faces
    }

    pub fn age_range(&self) -> Option<(u32, u32)> {
        let min = self.rows.iter().map(|r| r.age).min()?;
        let max = self.rows.iter().map(|r| r.age).max()?;
        Some((min, max))
    }

    pub fn face_range(&self) -> Option<(f64, f64)> {
        let faces = self.face_amounts();
        Some((*faces.first()?, *faces.last()?))
    }
}

impl From<Vec<PremiumMatrixRow>> for PremiumMatrix {
    fn from(rows: Vec<PremiumMatrixRow>) -> Self {
        Self::new(rows)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    pub fn row(age: u32, face: f64, premium: f64, class: RateClass, term: Option<u32>) -> PremiumMatrixRow {
        PremiumMatrixRow {
            age,
            face_amount: face,
            monthly_premium: premium,
            gender: Gender::Male,
            tobacco_class: TobaccoClass::NonTobacco,
            health_class: class,
            term_years: term,
        }
    }

    /// Ages 30..=60 step 10, faces 100k/250k/500k, premium rising with both
    pub fn standard_matrix(class: RateClass, term: Option<u32>) -> Vec<PremiumMatrixRow> {
        let mut rows = Vec::new();
        for age in [30, 40, 50, 60] {
            for face in [100_000.0, 250_000.0, 500_000.0] {
                let premium = 10.0 + age as f64 * 0.5 + (face / 1000.0) * 0.1;
                rows.push(row(age, face, premium, class, term));
            }
        }
        rows
    }
}
