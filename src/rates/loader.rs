//! Load premium matrices from premium_matrix.csv

use super::matrix::{PremiumMatrix, PremiumMatrixRow, RateClass, TobaccoClass};
use crate::client::Gender;
use crate::error::{EngineError, Result};
use csv::Reader;
use std::collections::HashMap;
use std::path::Path;

/// Raw CSV row matching premium_matrix.csv columns
#[derive(Debug, serde::Deserialize)]
struct CsvRow {
    product_id: String,
    age: u32,
    face_amount: f64,
    monthly_premium: f64,
    gender: String,
    tobacco_class: String,
    health_class: String,
    /// Blank for permanent products
    #[serde(default)]
    term_years: Option<u32>,
}

impl CsvRow {
    fn to_row(&self) -> Result<PremiumMatrixRow> {
        let health_class = RateClass::parse(&self.health_class)?;
        if !health_class.is_rateable() {
            return Err(EngineError::InvalidInput(format!(
                "Premium row for product {} uses non-rateable class {}",
                self.product_id,
                health_class.as_str()
            )));
        }
        if !self.face_amount.is_finite() || self.face_amount <= 0.0 {
            return Err(EngineError::InvalidInput(format!(
                "Premium row for product {} has invalid face amount {}",
                self.product_id, self.face_amount
            )));
        }
        if !self.monthly_premium.is_finite() {
            return Err(EngineError::InvalidInput(format!(
                "Premium row for product {} has non-finite premium at age {}",
                self.product_id, self.age
            )));
        }

        Ok(PremiumMatrixRow {
            age: self.age,
            face_amount: self.face_amount,
            monthly_premium: self.monthly_premium,
            gender: Gender::parse(&self.gender)?,
            tobacco_class: TobaccoClass::parse(&self.tobacco_class)?,
            health_class,
            term_years: self.term_years,
        })
    }
}

/// Load every product's matrix from a CSV file, keyed by product id
pub fn load_premium_matrices<P: AsRef<Path>>(path: P) -> Result<HashMap<String, PremiumMatrix>> {
    read_matrices(Reader::from_path(path)?)
}

/// Load matrices from any reader (e.g., string buffer, network stream)
pub fn load_premium_matrices_from_reader<R: std::io::Read>(
    reader: R,
) -> Result<HashMap<String, PremiumMatrix>> {
    read_matrices(Reader::from_reader(reader))
}

fn read_matrices<R: std::io::Read>(mut reader: Reader<R>) -> Result<HashMap<String, PremiumMatrix>> {
    let mut matrices: HashMap<String, PremiumMatrix> = HashMap::new();

    for result in reader.deserialize() {
        let raw: CsvRow = result?;
        let row = raw.to_row()?;
        matrices.entry(raw.product_id).or_default().rows.push(row);
    }

    for matrix in matrices.values_mut() {
        matrix
            .rows
            .sort_by(|a, b| a.age.cmp(&b.age).then(a.face_amount.total_cmp(&b.face_amount)));
    }

    log::debug!("Loaded premium matrices for {} products", matrices.len());
    Ok(matrices)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rates::interpolate::{interpolate_premium, PremiumQuery};

    const CSV: &str = "\
product_id,age,face_amount,monthly_premium,gender,tobacco_class,health_class,term_years
p1,40,250000,55.0,male,non_tobacco,standard,20
p1,30,250000,50.0,male,non_tobacco,standard,20
p2,65,10000,48.5,female,tobacco,preferred,
";

    #[test]
    fn test_groups_rows_by_product() {
        let matrices = load_premium_matrices_from_reader(CSV.as_bytes()).unwrap();
        assert_eq!(matrices.len(), 2);

        let p1 = &matrices["p1"];
        assert_eq!(p1.len(), 2);
        assert_eq!(p1.rows[0].age, 30);
        assert_eq!(p1.term_years(), vec![20]);

        let p2 = &matrices["p2"];
        assert!(p2.is_permanent());
        assert_eq!(p2.rows[0].gender, Gender::Female);
        assert_eq!(p2.rows[0].tobacco_class, TobaccoClass::Tobacco);
    }

    #[test]
    fn test_rejects_non_rateable_class() {
        let csv = "\
product_id,age,face_amount,monthly_premium,gender,tobacco_class,health_class,term_years
p1,40,250000,55.0,male,non_tobacco,decline,
";
        assert!(load_premium_matrices_from_reader(csv.as_bytes()).is_err());
    }

    #[test]
    fn test_rejects_non_finite_values() {
        let header = "product_id,age,face_amount,monthly_premium,gender,tobacco_class,health_class,term_years\n";
        for bad in [
            "p1,45,NaN,60.0,male,non_tobacco,standard,20",
            "p1,45,inf,60.0,male,non_tobacco,standard,20",
            "p1,45,0,60.0,male,non_tobacco,standard,20",
            "p1,45,-250000,60.0,male,non_tobacco,standard,20",
            "p1,45,250000,NaN,male,non_tobacco,standard,20",
            "p1,45,250000,inf,male,non_tobacco,standard,20",
        ] {
            let csv = format!("{}{}\n", header, bad);
            let err = load_premium_matrices_from_reader(csv.as_bytes()).unwrap_err();
            assert!(matches!(err, EngineError::InvalidInput(_)), "{} loaded", bad);
        }
    }

    #[test]
    fn test_bad_face_row_cannot_widen_grid() {
        let csv = "\
product_id,age,face_amount,monthly_premium,gender,tobacco_class,health_class,term_years
p1,45,100000,30.0,male,non_tobacco,standard,20
p1,45,250000,60.0,male,non_tobacco,standard,20
p1,45,NaN,60.0,male,non_tobacco,standard,20
";
        assert!(load_premium_matrices_from_reader(csv.as_bytes()).is_err());

        let clean: String = csv.lines().take(3).map(|l| format!("{}\n", l)).collect();
        let matrices = load_premium_matrices_from_reader(clean.as_bytes()).unwrap();
        let query = PremiumQuery {
            age: 45,
            face_amount: 5_000_000.0,
            gender: Gender::Male,
            tobacco_class: TobaccoClass::NonTobacco,
            health_class: RateClass::Standard,
            term_years: Some(20),
        };
        assert!(interpolate_premium(&matrices["p1"], &query).premium().is_none());
    }
}
