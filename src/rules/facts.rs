//! Canonical fact map the rule evaluator reads from

use crate::client::{ClientProfile, Gender};
use chrono::NaiveDate;
use serde_json::Value;
use std::collections::BTreeMap;

/// Flat `key -> value` view of a client.
///
/// Keys are `client.age`, `client.gender`, `client.tobacco`, `conditions`,
/// the optional `client.bmi` and `client.state`, and `{condition}.{field}` for
/// every follow-up answer. Absent keys evaluate as missing data.
#[derive(Debug, Clone, PartialEq)]
pub struct FactMap {
    values: BTreeMap<String, Value>,
    age: u32,
    gender: Gender,
    as_of: NaiveDate,
}

impl FactMap {
    /// `as_of` is the reference date for `years_since`/`months_since` tests
    pub fn build(client: &ClientProfile, as_of: NaiveDate) -> Self {
        let mut values = BTreeMap::new();
        values.insert("client.age".to_string(), Value::from(client.age));
        values.insert("client.gender".to_string(), Value::from(client.gender.as_str()));
        values.insert("client.tobacco".to_string(), Value::from(client.tobacco));
        values.insert(
            "conditions".to_string(),
            Value::from(client.health_conditions.clone()),
        );

        if let Some(bmi) = client.bmi.filter(|b| *b > 0.0) {
            values.insert("client.bmi".to_string(), Value::from(bmi));
        }
        if let Some(state) = client.state.as_deref().filter(|s| !s.is_empty()) {
            values.insert("client.state".to_string(), Value::from(state));
        }

        for (code, responses) in &client.condition_responses {
            for (field, value) in responses {
                values.insert(format!("{}.{}", code, field), value.clone());
            }
        }

        Self {
            values,
            age: client.age,
            gender: client.gender,
            as_of,
        }
    }

    /// Fact value; JSON `null` counts as missing
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.values.get(field).filter(|v| !v.is_null())
    }

    pub fn insert(&mut self, field: impl Into<String>, value: Value) {
        self.values.insert(field.into(), value);
    }

    pub fn conditions(&self) -> Vec<&str> {
        self.values
            .get("conditions")
            .and_then(Value::as_array)
            .map(|codes| codes.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }

    pub fn age(&self) -> u32 {
        self.age
    }

    pub fn gender(&self) -> Gender {
        self.gender
    }

    pub fn as_of(&self) -> NaiveDate {
        self.as_of
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }
}

/// Render a scalar the way a browser would stringify it (`45`, not `45.0`)
fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => match n.as_f64() {
            Some(f) if f.fract() == 0.0 && f.abs() < 1e21 => format!("{}", f as i64),
            _ => n.to_string(),
        },
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

/// Stable, non-reversible fingerprint of a fact map for audit logs.
///
/// Sorted `key:value` pairs joined by `|`, folded with the 32-bit
/// `h = h * 31 + c` string hash over UTF-16 code units, rendered as the
/// absolute value in hex padded to 8 digits.
pub fn generate_input_hash(facts: &FactMap) -> String {
    let joined = facts
        .iter()
        .map(|(k, v)| format!("{}:{}", k, display_value(v)))
        .collect::<Vec<_>>()
        .join("|");

    let hash = joined
        .encode_utf16()
        .fold(0i32, |h, unit| (h << 5).wrapping_sub(h).wrapping_add(unit as i32));

    format!("{:08x}", (hash as i64).abs())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn as_of() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 15).unwrap()
    }

    #[test]
    fn test_build_fact_map() {
        let mut client = ClientProfile::new(52, Gender::Female);
        client.tobacco = true;
        client.health_conditions = vec!["diabetes".into()];
        client
            .condition_responses
            .insert("diabetes".into(), json!({"a1c_level": 6.9}).as_object().cloned().unwrap());

        let facts = FactMap::build(&client, as_of());
        assert_eq!(facts.get("client.age"), Some(&json!(52)));
        assert_eq!(facts.get("client.gender"), Some(&json!("female")));
        assert_eq!(facts.get("client.tobacco"), Some(&json!(true)));
        assert_eq!(facts.get("diabetes.a1c_level"), Some(&json!(6.9)));
        assert_eq!(facts.conditions(), vec!["diabetes"]);
        // optional facts stay absent
        assert!(facts.get("client.bmi").is_none());
        assert!(facts.get("client.state").is_none());
    }

    #[test]
    fn test_zero_bmi_and_blank_state_are_absent() {
        let mut client = ClientProfile::new(40, Gender::Male);
        client.bmi = Some(0.0);
        client.state = Some(String::new());
        let facts = FactMap::build(&client, as_of());
        assert!(facts.get("client.bmi").is_none());
        assert!(facts.get("client.state").is_none());
    }

    #[test]
    fn test_input_hash_is_stable_and_padded() {
        let client = ClientProfile::new(40, Gender::Male);
        let a = generate_input_hash(&FactMap::build(&client, as_of()));
        let b = generate_input_hash(&FactMap::build(&client, as_of()));
        assert_eq!(a, b);
        assert_eq!(a.len(), 8);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));

        let older = ClientProfile::new(41, Gender::Male);
        assert_ne!(a, generate_input_hash(&FactMap::build(&older, as_of())));
    }

    #[test]
    fn test_display_value_matches_js_stringify() {
        assert_eq!(display_value(&json!(45.0)), "45");
        assert_eq!(display_value(&json!(6.5)), "6.5");
        assert_eq!(display_value(&json!(["a", "b"])), r#"["a","b"]"#);
        assert_eq!(display_value(&json!("TX")), "TX");
    }
}
