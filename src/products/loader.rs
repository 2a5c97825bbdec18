//! Load products from products.csv and JSON side files

use super::{ProductCandidate, ProductType};
use crate::error::{EngineError, Result};
use csv::Reader;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::path::Path;

/// Raw CSV row matching products.csv columns
#[derive(Debug, serde::Deserialize)]
struct CsvRow {
    product_id: String,
    product_name: String,
    carrier_id: String,
    carrier_name: String,
    product_type: String,
    min_age: Option<u32>,
    max_age: Option<u32>,
    min_face_amount: Option<f64>,
    max_face_amount: Option<f64>,
    #[serde(default)]
    build_chart_id: Option<String>,
    #[serde(default)]
    imo_id: Option<String>,
    #[serde(default)]
    is_active: Option<String>,
}

impl CsvRow {
    fn to_product(self) -> Result<ProductCandidate> {
        let product_type = ProductType::parse(&self.product_type)?;
        for (column, value) in [("min_face_amount", self.min_face_amount), ("max_face_amount", self.max_face_amount)] {
            if let Some(v) = value.filter(|v| !v.is_finite() || *v < 0.0) {
                return Err(EngineError::InvalidInput(format!(
                    "Product {} has invalid {} {}",
                    self.product_id, column, v
                )));
            }
        }

        let is_active = match self.is_active.as_deref().map(str::trim) {
            None | Some("") => true,
            Some(flag) => matches!(flag.to_ascii_lowercase().as_str(), "true" | "1" | "yes" | "y"),
        };

        Ok(ProductCandidate {
            product_id: self.product_id,
            product_name: self.product_name,
            carrier_id: self.carrier_id,
            carrier_name: self.carrier_name,
            product_type,
            min_age: self.min_age,
            max_age: self.max_age,
            min_face_amount: self.min_face_amount,
            max_face_amount: self.max_face_amount,
            metadata: None,
            build_chart_id: non_blank(self.build_chart_id),
            imo_id: non_blank(self.imo_id),
            is_active,
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Load all products from a CSV file
pub fn load_products<P: AsRef<Path>>(path: P) -> Result<Vec<ProductCandidate>> {
    let reader = Reader::from_path(path)?;
    read_products(reader)
}

/// Load products from any reader (e.g., string buffer, network stream)
pub fn load_products_from_reader<R: std::io::Read>(reader: R) -> Result<Vec<ProductCandidate>> {
    read_products(Reader::from_reader(reader))
}

fn read_products<R: std::io::Read>(mut reader: Reader<R>) -> Result<Vec<ProductCandidate>> {
    let mut products = Vec::new();
    for result in reader.deserialize() {
        let row: CsvRow = result?;
        products.push(row.to_product()?);
    }
    Ok(products)
}

/// Read a JSON object keyed by id (product id, carrier id, ...)
pub fn load_json_map<T: DeserializeOwned, P: AsRef<Path>>(path: P) -> Result<HashMap<String, T>> {
    let text = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

/// Read a JSON array
pub fn load_json_list<T: DeserializeOwned, P: AsRef<Path>>(path: P) -> Result<Vec<T>> {
    let text = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CSV: &str = "\
product_id,product_name,carrier_id,carrier_name,product_type,min_age,max_age,min_face_amount,max_face_amount,build_chart_id,imo_id,is_active
p1,Term Elite,c1,Acme Life,term_life,18,75,25000,1000000,,,true
p2,Final Comfort,c2,Beacon,final_expense,50,85,5000,40000,bc-9,imo-1,false
p3,Whole Basic,c2,Beacon,whole_life,,,,,,,
";

    #[test]
    fn test_load_products_from_reader() {
        let products = load_products_from_reader(CSV.as_bytes()).unwrap();
        assert_eq!(products.len(), 3);

        let p1 = &products[0];
        assert_eq!(p1.product_type, ProductType::TermLife);
        assert_eq!(p1.min_age, Some(18));
        assert_eq!(p1.max_face_amount, Some(1_000_000.0));
        assert!(p1.build_chart_id.is_none());
        assert!(p1.imo_id.is_none());
        assert!(p1.is_active);

        let p2 = &products[1];
        assert_eq!(p2.build_chart_id.as_deref(), Some("bc-9"));
        assert_eq!(p2.imo_id.as_deref(), Some("imo-1"));
        assert!(!p2.is_active);

        let p3 = &products[2];
        assert!(p3.min_age.is_none());
        assert!(p3.max_face_amount.is_none());
        assert!(p3.is_active);
    }

    #[test]
    fn test_unknown_product_type_rejected() {
        let csv = "\
product_id,product_name,carrier_id,carrier_name,product_type,min_age,max_age,min_face_amount,max_face_amount
p1,Annuity,c1,Acme,fixed_annuity,,,,
";
        let err = load_products_from_reader(csv.as_bytes()).unwrap_err();
        assert!(matches!(err, EngineError::UnknownValue { kind: "product type", .. }));
    }

    #[test]
    fn test_non_finite_face_limits_rejected() {
        let header = "product_id,product_name,carrier_id,carrier_name,product_type,min_age,max_age,min_face_amount,max_face_amount\n";
        for bad in [
            "p1,Term,c1,Acme,term_life,,,NaN,",
            "p1,Term,c1,Acme,term_life,,,,inf",
            "p1,Term,c1,Acme,term_life,,,-5000,",
        ] {
            let csv = format!("{}{}\n", header, bad);
            let err = load_products_from_reader(csv.as_bytes()).unwrap_err();
            assert!(matches!(err, EngineError::InvalidInput(_)), "{} loaded", bad);
        }
    }
}
