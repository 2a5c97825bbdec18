//! Underwriting rule language.
//!
//! A rule is a predicate tree over a fact map plus the outcome it produces
//! when the predicate matches. Predicates are stored as JSON, either bare
//! (`{"all": [...]}`) or versioned (`{"version": 2, "root": {...}}`).
//!
//! Each group carries at most one of `all`, `any` or `not`; an empty group
//! always matches and is how fallback rules are written.

use crate::client::Gender;
use crate::error::{EngineError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Substandard table rating, A (1 unit) through P (16 units)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TableRating {
    #[default]
    #[serde(rename = "none")]
    None,
    A,
    B,
    C,
    D,
    E,
    F,
    G,
    H,
    I,
    J,
    K,
    L,
    M,
    N,
    O,
    P,
}

const TABLE_LETTERS: [TableRating; 16] = [
    TableRating::A,
    TableRating::B,
    TableRating::C,
    TableRating::D,
    TableRating::E,
    TableRating::F,
    TableRating::G,
    TableRating::H,
    TableRating::I,
    TableRating::J,
    TableRating::K,
    TableRating::L,
    TableRating::M,
    TableRating::N,
    TableRating::O,
    TableRating::P,
];

impl TableRating {
    pub fn units(&self) -> u32 {
        match self {
            TableRating::None => 0,
            letter => TABLE_LETTERS.iter().position(|l| l == letter).map_or(0, |i| i as u32 + 1),
        }
    }

    /// Clamps: zero or less is `None`, 16 or more is `P`
    pub fn from_units(units: i64) -> Self {
        if units <= 0 {
            TableRating::None
        } else if units >= 16 {
            TableRating::P
        } else {
            TABLE_LETTERS[units as usize - 1]
        }
    }
}

/// Health class a rule can assign. Ranked 1 (best) to 8 (worst).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleHealthClass {
    PreferredPlus,
    Preferred,
    StandardPlus,
    Standard,
    Substandard,
    Refer,
    Decline,
    Unknown,
}

impl RuleHealthClass {
    pub fn rank(&self) -> u8 {
        match self {
            RuleHealthClass::PreferredPlus => 1,
            RuleHealthClass::Preferred => 2,
            RuleHealthClass::StandardPlus => 3,
            RuleHealthClass::Standard => 4,
            RuleHealthClass::Substandard => 5,
            RuleHealthClass::Refer => 6,
            RuleHealthClass::Unknown => 7,
            RuleHealthClass::Decline => 8,
        }
    }

    /// Inverse of [`rank`](Self::rank); ranks outside 1..=8 are `Unknown`
    pub fn from_rank(rank: u8) -> Self {
        match rank {
            1 => RuleHealthClass::PreferredPlus,
            2 => RuleHealthClass::Preferred,
            3 => RuleHealthClass::StandardPlus,
            4 => RuleHealthClass::Standard,
            5 => RuleHealthClass::Substandard,
            6 => RuleHealthClass::Refer,
            8 => RuleHealthClass::Decline,
            _ => RuleHealthClass::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RuleHealthClass::PreferredPlus => "preferred_plus",
            RuleHealthClass::Preferred => "preferred",
            RuleHealthClass::StandardPlus => "standard_plus",
            RuleHealthClass::Standard => "standard",
            RuleHealthClass::Substandard => "substandard",
            RuleHealthClass::Refer => "refer",
            RuleHealthClass::Decline => "decline",
            RuleHealthClass::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleEligibility {
    Eligible,
    Ineligible,
    Refer,
    Unknown,
}

impl RuleEligibility {
    fn rank(&self) -> u8 {
        match self {
            RuleEligibility::Eligible => 1,
            RuleEligibility::Refer => 2,
            RuleEligibility::Unknown => 3,
            RuleEligibility::Ineligible => 4,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RuleEligibility::Eligible => "eligible",
            RuleEligibility::Ineligible => "ineligible",
            RuleEligibility::Refer => "refer",
            RuleEligibility::Unknown => "unknown",
        }
    }

    /// The worse of two statuses; ties keep `self`
    pub fn worse(self, other: Self) -> Self {
        if self.rank() >= other.rank() {
            self
        } else {
            other
        }
    }
}

/// How flat extras from several conditions combine
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlatExtraComposition {
    /// Add per-thousand rates, keep the longest duration
    Sum,
    /// Keep the largest per-thousand rate
    #[default]
    Max,
    /// Keep the extra with the largest rate x years
    WorstOnly,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NullHandling {
    Fail,
    #[default]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NumericOperator {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
    Between,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NumericValue {
    Single(f64),
    Range(f64, f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateOperator {
    YearsSinceGte,
    YearsSinceLte,
    MonthsSinceGte,
    MonthsSinceLte,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArrayOperator {
    IncludesAny,
    IncludesAll,
    IsEmpty,
    IsNotEmpty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BooleanOperator {
    Eq,
    Neq,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StringOperator {
    Eq,
    Neq,
    Contains,
    StartsWith,
    EndsWith,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SetOperator {
    In,
    NotIn,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SetValue {
    Number(f64),
    Text(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NullOperator {
    IsNull,
    IsNotNull,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresenceOperator {
    IncludesAny,
    IncludesAll,
}

/// Typed test applied to one fact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConditionTest {
    Numeric {
        operator: NumericOperator,
        value: NumericValue,
    },
    Date {
        operator: DateOperator,
        value: u32,
    },
    Array {
        operator: ArrayOperator,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        value: Vec<String>,
    },
    Boolean {
        operator: BooleanOperator,
        value: bool,
    },
    String {
        operator: StringOperator,
        value: String,
    },
    Set {
        operator: SetOperator,
        value: Vec<SetValue>,
    },
    NullCheck {
        operator: NullOperator,
    },
    /// Only valid on the `conditions` fact
    ConditionPresence {
        operator: PresenceOperator,
        value: Vec<String>,
    },
}

/// Leaf of a predicate tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldCondition {
    pub field: String,
    #[serde(rename = "treatNullAs", default, skip_serializing_if = "Option::is_none")]
    pub treat_null_as: Option<NullHandling>,
    #[serde(flatten)]
    pub test: ConditionTest,
}

impl FieldCondition {
    pub fn new(field: impl Into<String>, test: ConditionTest) -> Self {
        Self {
            field: field.into(),
            treat_null_as: None,
            test,
        }
    }

    pub fn treat_null_as(mut self, handling: NullHandling) -> Self {
        self.treat_null_as = Some(handling);
        self
    }

    fn validate(&self, path: &str) -> Result<()> {
        let invalid = |msg: &str| Err(EngineError::InvalidPredicate(format!("{}: {}", path, msg)));

        if self.field.trim().is_empty() {
            return invalid("field must not be empty");
        }
        match &self.test {
            ConditionTest::Numeric { operator, value } => match (operator, value) {
                (NumericOperator::Between, NumericValue::Single(_)) => invalid("between requires [min, max]"),
                (NumericOperator::Between, NumericValue::Range(..)) => Ok(()),
                (_, NumericValue::Range(..)) => invalid("only between takes a [min, max] value"),
                _ => Ok(()),
            },
            ConditionTest::Array { operator, value }
                if matches!(operator, ArrayOperator::IncludesAny | ArrayOperator::IncludesAll)
                    && value.is_empty() =>
            {
                invalid("includes_any/includes_all require a non-empty value")
            }
            ConditionTest::ConditionPresence { value, .. } => {
                if self.field != "conditions" {
                    invalid("condition_presence must use the field \"conditions\"")
                } else if value.is_empty() {
                    invalid("condition_presence requires at least one condition code")
                } else {
                    Ok(())
                }
            }
            _ => Ok(()),
        }
    }
}

/// Child of a predicate group: a field test or a nested group
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PredicateNode {
    Condition(FieldCondition),
    Group(PredicateGroup),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value")]
pub struct PredicateGroup {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub all: Option<Vec<PredicateNode>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub any: Option<Vec<PredicateNode>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub not: Option<Box<PredicateNode>>,
}

impl PredicateGroup {
    pub fn all(nodes: Vec<PredicateNode>) -> Self {
        Self {
            all: Some(nodes),
            ..Default::default()
        }
    }

    pub fn any(nodes: Vec<PredicateNode>) -> Self {
        Self {
            any: Some(nodes),
            ..Default::default()
        }
    }

    pub fn not(node: PredicateNode) -> Self {
        Self {
            not: Some(Box::new(node)),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.all.is_none() && self.any.is_none() && self.not.is_none()
    }
}

impl From<FieldCondition> for PredicateNode {
    fn from(condition: FieldCondition) -> Self {
        PredicateNode::Condition(condition)
    }
}

impl From<PredicateGroup> for PredicateNode {
    fn from(group: PredicateGroup) -> Self {
        PredicateNode::Group(group)
    }
}

impl TryFrom<Value> for PredicateGroup {
    type Error = EngineError;

    fn try_from(value: Value) -> Result<Self> {
        parse_predicate(&value)
    }
}

fn is_field_condition(value: &Value) -> bool {
    value
        .as_object()
        .is_some_and(|obj| obj.contains_key("type") && obj.contains_key("field"))
}

fn parse_node(value: &Value, path: &str) -> Result<PredicateNode> {
    if is_field_condition(value) {
        let condition: FieldCondition = serde_json::from_value(value.clone())
            .map_err(|e| EngineError::InvalidPredicate(format!("{}: {}", path, e)))?;
        condition.validate(path)?;
        Ok(PredicateNode::Condition(condition))
    } else {
        parse_group(value, path).map(PredicateNode::Group)
    }
}

fn parse_children(value: &Value, path: &str) -> Result<Vec<PredicateNode>> {
    let items = value
        .as_array()
        .ok_or_else(|| EngineError::InvalidPredicate(format!("{}: expected an array", path)))?;
    items
        .iter()
        .enumerate()
        .map(|(i, item)| parse_node(item, &format!("{}.{}", path, i)))
        .collect()
}

fn parse_group(value: &Value, path: &str) -> Result<PredicateGroup> {
    let obj = value
        .as_object()
        .ok_or_else(|| EngineError::InvalidPredicate(format!("{}: expected a predicate group", path)))?;

    let all = obj.get("all").map(|v| parse_children(v, &format!("{}.all", path))).transpose()?;
    let any = obj.get("any").map(|v| parse_children(v, &format!("{}.any", path))).transpose()?;
    let not = obj
        .get("not")
        .map(|v| parse_node(v, &format!("{}.not", path)).map(Box::new))
        .transpose()?;

    let operators = [all.is_some(), any.is_some(), not.is_some()]
        .iter()
        .filter(|present| **present)
        .count();
    if operators > 1 {
        return Err(EngineError::InvalidPredicate(format!(
            "{}: At most one of all, any, or not may be specified per group",
            path
        )));
    }

    Ok(PredicateGroup { all, any, not })
}

/// Parse stored predicate JSON. `null` is the empty (always matching) group.
pub fn parse_predicate(value: &Value) -> Result<PredicateGroup> {
    match value {
        Value::Null => Ok(PredicateGroup::default()),
        Value::Object(obj) => match (obj.get("version"), obj.get("root")) {
            (Some(version), Some(root)) if version.as_u64() == Some(2) => parse_group(root, "root"),
            _ => parse_group(value, "root"),
        },
        _ => Err(EngineError::InvalidPredicate(
            "root: predicate must be a JSON object".into(),
        )),
    }
}

/// `diabetes.a1c_level` -> `diabetes`; client facts and `conditions` have no code
pub fn extract_condition_code(field: &str) -> Option<&str> {
    if field.starts_with("client.") || field == "conditions" {
        return None;
    }
    field.split_once('.').map(|(code, _)| code)
}

/// What a rule (or a rule set's default) decides
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleOutcome {
    pub eligibility: RuleEligibility,
    pub health_class: RuleHealthClass,
    #[serde(default)]
    pub table_rating: TableRating,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flat_extra_per_thousand: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flat_extra_years: Option<u32>,
    pub reason: String,
    #[serde(default)]
    pub concerns: Vec<String>,
}

pub const DEFAULT_SAFE_REASON: &str = "No matching rule - manual review required";

impl RuleOutcome {
    /// Outcome when no rule matched and the set has no default: refer for review
    pub fn default_safe() -> Self {
        Self {
            eligibility: RuleEligibility::Refer,
            health_class: RuleHealthClass::Unknown,
            table_rating: TableRating::None,
            flat_extra_per_thousand: None,
            flat_extra_years: None,
            reason: DEFAULT_SAFE_REASON.to_string(),
            concerns: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleSetScope {
    Condition,
    Global,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    Draft,
    PendingReview,
    Approved,
    Rejected,
}

fn default_variant() -> String {
    "default".to_string()
}

fn default_version() -> u32 {
    1
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnderwritingRule {
    pub id: String,
    pub priority: i32,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub age_band_min: Option<u32>,
    #[serde(default)]
    pub age_band_max: Option<u32>,
    #[serde(default)]
    pub gender: Option<Gender>,
    #[serde(default)]
    pub predicate: PredicateGroup,
    pub outcome_eligibility: RuleEligibility,
    pub outcome_health_class: RuleHealthClass,
    #[serde(default)]
    pub outcome_table_rating: TableRating,
    #[serde(default)]
    pub outcome_flat_extra_per_thousand: Option<f64>,
    #[serde(default)]
    pub outcome_flat_extra_years: Option<u32>,
    pub outcome_reason: String,
    #[serde(default)]
    pub outcome_concerns: Vec<String>,
}

impl UnderwritingRule {
    /// Age band and gender filter
    pub fn applies_to(&self, age: u32, gender: Gender) -> bool {
        if self.age_band_min.is_some_and(|min| age < min) {
            return false;
        }
        if self.age_band_max.is_some_and(|max| age > max) {
            return false;
        }
        self.gender.map_or(true, |g| g == gender)
    }

    pub fn outcome(&self) -> RuleOutcome {
        RuleOutcome {
            eligibility: self.outcome_eligibility,
            health_class: self.outcome_health_class,
            table_rating: self.outcome_table_rating,
            flat_extra_per_thousand: self.outcome_flat_extra_per_thousand,
            flat_extra_years: self.outcome_flat_extra_years,
            reason: self.outcome_reason.clone(),
            concerns: self.outcome_concerns.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnderwritingRuleSet {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub imo_id: Option<String>,
    pub carrier_id: String,
    /// `None` applies carrier-wide
    #[serde(default)]
    pub product_id: Option<String>,
    pub scope: RuleSetScope,
    #[serde(default)]
    pub condition_code: Option<String>,
    #[serde(default = "default_variant")]
    pub variant: String,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub default_outcome: Option<RuleOutcome>,
    pub review_status: ReviewStatus,
    #[serde(default)]
    pub rules: Vec<UnderwritingRule>,
}

impl UnderwritingRuleSet {
    /// Approved, active, same carrier, and either carrier-wide or for this product
    pub fn is_applicable(&self, carrier_id: &str, product_id: &str) -> bool {
        self.is_active
            && self.review_status == ReviewStatus::Approved
            && self.carrier_id == carrier_id
            && self.product_id.as_deref().map_or(true, |p| p == product_id)
    }
}
