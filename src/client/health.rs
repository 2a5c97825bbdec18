//! Body-mass and age helpers used when building a client profile

use chrono::{Datelike, Local, NaiveDate};
use serde::{Deserialize, Serialize};

/// BMI from height in feet/inches and weight in pounds, rounded to 0.1.
///
/// Returns 0.0 when height or weight is not positive.
pub fn calculate_bmi(height_feet: f64, height_inches: f64, weight_lbs: f64) -> f64 {
    let total_inches = height_feet * 12.0 + height_inches;
    if total_inches <= 0.0 || weight_lbs <= 0.0 {
        return 0.0;
    }
    let bmi = weight_lbs * 703.0 / (total_inches * total_inches);
    (bmi * 10.0).round() / 10.0
}

/// WHO adult BMI bands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BmiCategory {
    Underweight,
    Normal,
    Overweight,
    ObeseClassI,
    ObeseClassII,
    ObeseClassIII,
}

impl BmiCategory {
    pub fn from_bmi(bmi: f64) -> Self {
        if bmi < 18.5 {
            BmiCategory::Underweight
        } else if bmi < 25.0 {
            BmiCategory::Normal
        } else if bmi < 30.0 {
            BmiCategory::Overweight
        } else if bmi < 35.0 {
            BmiCategory::ObeseClassI
        } else if bmi < 40.0 {
            BmiCategory::ObeseClassII
        } else {
            BmiCategory::ObeseClassIII
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            BmiCategory::Underweight => "Underweight",
            BmiCategory::Normal => "Normal",
            BmiCategory::Overweight => "Overweight",
            BmiCategory::ObeseClassI => "Obese Class I",
            BmiCategory::ObeseClassII => "Obese Class II",
            BmiCategory::ObeseClassIII => "Obese Class III",
        }
    }
}

/// Age in whole years on `today` for someone born on `dob`
pub fn calculate_age(dob: NaiveDate, today: NaiveDate) -> u32 {
    let mut age = today.year() - dob.year();
    if (today.month(), today.day()) < (dob.month(), dob.day()) {
        age -= 1;
    }
    age.max(0) as u32
}

/// [`calculate_age`] against the local calendar date
pub fn calculate_age_today(dob: NaiveDate) -> u32 {
    calculate_age(dob, Local::now().date_naive())
}

/// Coarse risk tier shown to agents alongside recommendations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthTier {
    PreferredPlus,
    Preferred,
    StandardPlus,
    Standard,
    Substandard,
    TableRated,
    Decline,
}

impl HealthTier {
    pub fn label(&self) -> &'static str {
        match self {
            HealthTier::PreferredPlus => "Preferred Plus",
            HealthTier::Preferred => "Preferred",
            HealthTier::StandardPlus => "Standard Plus",
            HealthTier::Standard => "Standard",
            HealthTier::Substandard => "Substandard",
            HealthTier::TableRated => "Table Rated",
            HealthTier::Decline => "Decline",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_bmi_five_six_150() {
        let bmi = calculate_bmi(5.0, 6.0, 150.0);
        assert_abs_diff_eq!(bmi, 24.2, epsilon = 1e-9);
        assert_eq!(BmiCategory::from_bmi(bmi), BmiCategory::Normal);
        // Same inputs, same answer
        assert_eq!(calculate_bmi(5.0, 6.0, 150.0), bmi);
    }

    #[test]
    fn test_bmi_invalid_inputs_return_zero() {
        assert_eq!(calculate_bmi(0.0, 0.0, 150.0), 0.0);
        assert_eq!(calculate_bmi(5.0, 10.0, 0.0), 0.0);
        assert_eq!(calculate_bmi(-1.0, 0.0, 150.0), 0.0);
    }

    #[test]
    fn test_bmi_categories() {
        assert_eq!(BmiCategory::from_bmi(18.4), BmiCategory::Underweight);
        assert_eq!(BmiCategory::from_bmi(25.0), BmiCategory::Overweight);
        assert_eq!(BmiCategory::from_bmi(34.9), BmiCategory::ObeseClassI);
        assert_eq!(BmiCategory::from_bmi(39.9), BmiCategory::ObeseClassII);
        assert_eq!(BmiCategory::from_bmi(45.0).label(), "Obese Class III");
    }

    #[test]
    fn test_age_exactly_one_year() {
        let today = NaiveDate::from_ymd_opt(2024, 6, 15).unwrap();
        let dob = NaiveDate::from_ymd_opt(2023, 6, 15).unwrap();
        assert_eq!(calculate_age(dob, today), 1);
    }

    #[test]
    fn test_age_before_birthday_decrements() {
        let today = NaiveDate::from_ymd_opt(2024, 6, 15).unwrap();
        assert_eq!(calculate_age(NaiveDate::from_ymd_opt(1980, 6, 16).unwrap(), today), 43);
        assert_eq!(calculate_age(NaiveDate::from_ymd_opt(1980, 7, 1).unwrap(), today), 43);
        assert_eq!(calculate_age(NaiveDate::from_ymd_opt(1980, 6, 15).unwrap(), today), 44);
    }

    #[test]
    fn test_health_tier_labels() {
        assert_eq!(HealthTier::StandardPlus.label(), "Standard Plus");
        assert_eq!(HealthTier::TableRated.label(), "Table Rated");
    }
}
