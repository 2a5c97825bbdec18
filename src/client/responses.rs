//! Condition follow-up answers -> rule-engine facts
//!
//! Wizard answers arrive as display strings ("Insulin only", "130/85",
//! ["Retinopathy (eye)"]). Rule predicates test normalized keys such as
//! `insulin_use` or `is_stage2_or_higher`, so each known condition gets a
//! dedicated transformer.
//!
//! A missing or blank answer never produces `false`, `0` or `[]`: the key is
//! simply absent so the evaluator reports it as unknown rather than failing a
//! predicate on data the client never gave.

use super::wizard::ConditionResponse;
use super::ConditionResponses;
use chrono::{DateTime, NaiveDate};
use serde_json::{Map, Value};

/// A1C below this counts as controlled diabetes
pub const DIABETES_CONTROLLED_A1C_THRESHOLD: f64 = 7.5;

const EJECTION_FRACTION_NORMAL: f64 = 55.0;
const EJECTION_FRACTION_SEVERELY_REDUCED: f64 = 35.0;

const BP_STAGE2_SYSTOLIC: i64 = 140;
const BP_STAGE2_DIASTOLIC: i64 = 90;
const BP_CRISIS_SYSTOLIC: i64 = 180;
const BP_CRISIS_DIASTOLIC: i64 = 120;

const CANCER_HIGH_RISK_TYPES: [&str; 5] = ["pancreatic", "lung", "brain", "leukemia", "lymphoma"];

/// Explicit treatment label -> insulin use. Checked before any substring
/// heuristic so "No insulin" never reads as insulin use.
const DIABETES_TREATMENT_INSULIN: [(&str, bool); 10] = [
    ("Insulin only", true),
    ("Insulin pump", true),
    ("Oral medication + Insulin", true),
    ("Oral medication and Insulin", true),
    ("Oral medication only", false),
    ("Diet and exercise only", false),
    ("Diet only", false),
    ("No medication", false),
    ("No insulin", false),
    ("No treatment", false),
];

type Facts = Map<String, Value>;

/// Transform every wizard condition into rule facts keyed by condition code.
///
/// `as_of` anchors date answers such as `diagnosis_date`.
pub fn transform_condition_responses(
    conditions: &[ConditionResponse],
    client_age: u32,
    as_of: NaiveDate,
) -> ConditionResponses {
    let mut result = ConditionResponses::new();
    for condition in conditions {
        let code = condition.condition_code.as_str();
        let transformed = match code {
            "diabetes" => transform_diabetes(&condition.responses, client_age),
            "heart_disease" => transform_heart_disease(&condition.responses, as_of),
            "heart_attack" => transform_heart_attack(&condition.responses, as_of),
            "stroke" => transform_stroke(&condition.responses, as_of),
            "high_blood_pressure" => transform_high_blood_pressure(&condition.responses, as_of),
            "cancer" => transform_cancer(&condition.responses, as_of),
            "copd" => transform_copd(&condition.responses, as_of),
            "depression" | "anxiety" | "bipolar" => {
                transform_mental_health(code, &condition.responses, as_of)
            }
            _ => {
                log::warn!(
                    "No transformer for condition \"{}\"; raw wizard data passed through, rule predicates may not match",
                    code
                );
                condition.responses.clone()
            }
        };
        result.insert(code.to_string(), transformed);
    }
    result
}

// ---------------------------------------------------------------------------
// Value normalization
// ---------------------------------------------------------------------------

fn as_non_empty_string(value: Option<&Value>) -> Option<&str> {
    match value {
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then_some(trimmed)
        }
        _ => None,
    }
}

fn as_finite_number(value: Option<&Value>) -> Option<f64> {
    match value {
        Some(Value::Number(n)) => n.as_f64().filter(|v| v.is_finite()),
        Some(Value::String(s)) => parse_leading_float(s.trim()),
        _ => None,
    }
}

/// Parse the numeric prefix of a string ("7.5%" -> 7.5)
fn parse_leading_float(text: &str) -> Option<f64> {
    let mut end = 0;
    let mut seen_digit = false;
    let mut seen_dot = false;
    for (i, c) in text.char_indices() {
        match c {
            '+' | '-' if i == 0 => {}
            '0'..='9' => seen_digit = true,
            '.' if !seen_dot => seen_dot = true,
            _ => break,
        }
        end = i + c.len_utf8();
    }
    if !seen_digit {
        return None;
    }
    text[..end].parse::<f64>().ok().filter(|v| v.is_finite())
}

/// String array answer; empty arrays are kept so callers can tell
/// "unanswered" from an explicit "None"
fn as_string_array(value: Option<&Value>) -> Option<Vec<String>> {
    let items = value?.as_array()?;
    items
        .iter()
        .map(|item| item.as_str().map(str::to_string))
        .collect()
}

pub(crate) fn parse_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.date_naive());
    }
    if let Ok(date) = NaiveDate::parse_from_str(&format!("{}-01", text), "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(date) = NaiveDate::parse_from_str(text, "%m/%d/%Y") {
        return Some(date);
    }
    text.parse::<i32>()
        .ok()
        .and_then(|year| NaiveDate::from_ymd_opt(year, 1, 1))
}

/// Years between `date_text` and `as_of`, floored to one decimal.
/// Future or unparseable dates yield `None`.
fn years_since_date(date_text: &str, as_of: NaiveDate) -> Option<f64> {
    let date = parse_date(date_text)?;
    let days = (as_of - date).num_days() as f64;
    let years = days / 365.25;
    (years >= 0.0).then(|| (years * 10.0).floor() / 10.0)
}

fn leading_integer(text: &str) -> Option<i64> {
    let digits: String = text.trim().chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

/// "2", "3 or more", "5+" -> count
fn parse_event_count(text: &str) -> Option<i64> {
    if let Some(n) = leading_integer(text) {
        return Some(n);
    }
    let lower = text.to_lowercase();
    let start = lower.find(|c: char| c.is_ascii_digit())?;
    let digits: String = lower[start..].chars().take_while(|c| c.is_ascii_digit()).collect();
    let rest = lower[start + digits.len()..].trim_start();
    if rest.starts_with('+') || rest.starts_with("or more") || rest.starts_with("ormore") {
        digits.parse().ok()
    } else {
        None
    }
}

/// "130/85" -> (systolic, diastolic) within plausible bounds
fn parse_blood_pressure(reading: &str) -> Option<(i64, i64)> {
    let (left, right) = reading.trim().split_once('/')?;
    let systolic_digits: String = left
        .trim_end()
        .chars()
        .rev()
        .take_while(|c| c.is_ascii_digit())
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    let systolic: i64 = systolic_digits.parse().ok()?;
    let diastolic = leading_integer(right.trim_start())?;

    if !(60..=250).contains(&systolic) || !(30..=150).contains(&diastolic) {
        return None;
    }
    Some((systolic, diastolic))
}

/// Stage label ("Stage III", "in situ", "2") -> 0..=4
fn parse_cancer_stage(stage: &str) -> Option<i64> {
    let lower = stage.to_lowercase();
    if lower.contains('0') || lower.contains("in situ") {
        Some(0)
    } else if lower.contains("iv") || lower.contains('4') {
        Some(4)
    } else if lower.contains("iii") || lower.contains('3') {
        Some(3)
    } else if lower.contains("ii") || lower.contains('2') {
        Some(2)
    } else if lower.contains('i') || lower.contains('1') {
        Some(1)
    } else {
        None
    }
}

/// Lowercase and replace every non-letter with `_`
fn slug(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_lowercase() { c } else { '_' })
        .collect()
}

fn normalize_list(items: &[String], mapping: &[(&str, &str)]) -> Vec<String> {
    items
        .iter()
        .map(|item| {
            mapping
                .iter()
                .find(|(label, _)| *label == item.as_str())
                .map(|(_, code)| code.to_string())
                .unwrap_or_else(|| slug(item))
        })
        .filter(|item| !item.is_empty())
        .collect()
}

fn words(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}

fn contains_pair(words: &[String], first: &str, second: &str) -> bool {
    words.windows(2).any(|w| w[0] == first && w[1] == second)
}

fn put(out: &mut Facts, key: &str, value: impl Into<Value>) {
    out.insert(key.to_string(), value.into());
}

fn strings(values: Vec<String>) -> Value {
    Value::Array(values.into_iter().map(Value::String).collect())
}

// ---------------------------------------------------------------------------
// Diabetes
// ---------------------------------------------------------------------------

fn derive_insulin_use(treatment: &str) -> bool {
    if let Some((_, uses)) = DIABETES_TREATMENT_INSULIN.iter().find(|(label, _)| *label == treatment) {
        return *uses;
    }
    let lower = treatment.to_lowercase();
    if let Some((_, uses)) = DIABETES_TREATMENT_INSULIN
        .iter()
        .find(|(label, _)| label.to_lowercase() == lower)
    {
        return *uses;
    }

    log::warn!("Unknown diabetes treatment \"{}\"; using substring heuristic", treatment);

    let tokens = words(treatment);
    let negated = contains_pair(&tokens, "no", "insulin")
        || contains_pair(&tokens, "without", "insulin")
        || contains_pair(&tokens, "non", "insulin")
        || tokens.iter().any(|w| w == "noninsulin");
    if negated {
        return false;
    }
    tokens.iter().any(|w| w == "insulin" || w == "pump")
}

fn strip_parentheticals(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut depth = 0usize;
    for c in text.chars() {
        match c {
            '(' => depth += 1,
            ')' if depth > 0 => depth -= 1,
            _ if depth == 0 => out.push(c),
            _ => {}
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn normalize_diabetes_complications(complications: &[String]) -> Vec<String> {
    complications
        .iter()
        .map(|c| match c.as_str() {
            "Retinopathy (eye)" => "retinopathy".to_string(),
            "Neuropathy (nerve)" => "neuropathy".to_string(),
            "Nephropathy (kidney)" => "nephropathy".to_string(),
            "Amputation" => "amputation".to_string(),
            "Heart disease" => "heart_disease".to_string(),
            "None" => String::new(),
            other => strip_parentheticals(&other.to_lowercase()),
        })
        .filter(|c| !c.is_empty())
        .collect()
}

fn transform_diabetes(responses: &Facts, client_age: u32) -> Facts {
    let mut out = Facts::new();

    if let Some(treatment) = as_non_empty_string(responses.get("treatment")) {
        put(&mut out, "insulin_use", derive_insulin_use(treatment));
    }

    if let Some(a1c) = as_finite_number(responses.get("a1c_level")) {
        let controlled = a1c < DIABETES_CONTROLLED_A1C_THRESHOLD;
        put(&mut out, "is_controlled", controlled);
        put(&mut out, "good_control", controlled);
        put(&mut out, "a1c_level", a1c);
    }

    if let Some(raw) = as_string_array(responses.get("complications")) {
        // Empty without an explicit "None" means unanswered
        if !raw.is_empty() {
            put(&mut out, "complications", strings(normalize_diabetes_complications(&raw)));
        }
    }

    if let Some(diagnosis_age) = as_finite_number(responses.get("diagnosis_age")) {
        let age = client_age as f64;
        if diagnosis_age >= 0.0 && age >= diagnosis_age {
            put(&mut out, "years_since_diagnosis", age - diagnosis_age);
        }
    }

    if let Some(kind) = as_non_empty_string(responses.get("type")) {
        put(&mut out, "type", kind);
    }

    out
}

// ---------------------------------------------------------------------------
// Cardiac
// ---------------------------------------------------------------------------

fn put_years_since(out: &mut Facts, responses: &Facts, source: &str, key: &str, as_of: NaiveDate) {
    if let Some(years) = as_non_empty_string(responses.get(source)).and_then(|d| years_since_date(d, as_of)) {
        put(out, key, years);
    }
}

fn put_event_count(out: &mut Facts, responses: &Facts) {
    if let Some(count) = as_non_empty_string(responses.get("number_of_events")).and_then(parse_event_count) {
        put(out, "event_count", count);
        put(out, "multiple_events", count > 1);
    }
}

fn transform_heart_disease(responses: &Facts, as_of: NaiveDate) -> Facts {
    let mut out = Facts::new();

    if let Some(kind) = as_non_empty_string(responses.get("type")) {
        put(&mut out, "type", kind);
    }
    put_years_since(&mut out, responses, "diagnosis_date", "years_since_diagnosis", as_of);

    if let Some(procedures) = as_string_array(responses.get("procedures")).filter(|p| !p.is_empty()) {
        let normalized = normalize_list(
            &procedures,
            &[
                ("Angioplasty/Stent", "angioplasty_stent"),
                ("Bypass Surgery (CABG)", "bypass_cabg"),
                ("Valve Replacement", "valve_replacement"),
                ("Pacemaker", "pacemaker"),
                ("Defibrillator (ICD)", "defibrillator"),
                ("None", "none"),
            ],
        );
        let has = |code: &str| normalized.iter().any(|p| p == code);
        put(&mut out, "has_stent", has("angioplasty_stent"));
        put(&mut out, "has_bypass", has("bypass_cabg"));
        put(&mut out, "has_valve_replacement", has("valve_replacement"));
        put(&mut out, "has_pacemaker", has("pacemaker"));
        put(&mut out, "has_defibrillator", has("defibrillator"));
        put(&mut out, "no_procedures", normalized.is_empty() || has("none"));
        put(&mut out, "procedures", strings(normalized));
    }

    if let Some(ef) = as_finite_number(responses.get("ejection_fraction")) {
        put(&mut out, "ejection_fraction", ef);
        put(&mut out, "ef_normal", ef >= EJECTION_FRACTION_NORMAL);
        put(&mut out, "ef_severely_reduced", ef < EJECTION_FRACTION_SEVERELY_REDUCED);
    }

    if let Some(status) = as_non_empty_string(responses.get("symptoms_controlled")) {
        put(
            &mut out,
            "symptoms_controlled",
            status == "Yes, fully controlled" || status == "Mostly controlled",
        );
        put(&mut out, "symptoms_controlled_raw", status);
    }

    if let Some(medications) = as_string_array(responses.get("medications")).filter(|m| !m.is_empty()) {
        let normalized = normalize_list(
            &medications,
            &[
                ("Beta Blocker", "beta_blocker"),
                ("ACE Inhibitor/ARB", "ace_inhibitor_arb"),
                ("Statin", "statin"),
                ("Blood Thinner", "blood_thinner"),
                ("Diuretic", "diuretic"),
                ("Nitrate", "nitrate"),
                ("Other", "other"),
                ("None", "none"),
            ],
        );
        let has = |code: &str| normalized.iter().any(|m| m == code);
        put(&mut out, "on_blood_thinner", has("blood_thinner"));
        put(&mut out, "on_beta_blocker", has("beta_blocker"));
        put(&mut out, "on_statin", has("statin"));
        put(&mut out, "on_ace_inhibitor", has("ace_inhibitor_arb"));
        put(&mut out, "medications", strings(normalized));
    }

    out
}

fn transform_heart_attack(responses: &Facts, as_of: NaiveDate) -> Facts {
    let mut out = Facts::new();

    put_years_since(&mut out, responses, "date_of_event", "years_since_event", as_of);
    put_event_count(&mut out, responses);

    if let Some(treatment) = as_string_array(responses.get("treatment")).filter(|t| !t.is_empty()) {
        let lower: Vec<String> = treatment.iter().map(|t| t.to_lowercase()).collect();
        let had_stent = lower.iter().any(|t| t.contains("angioplasty") || t.contains("stent"));
        let had_bypass = lower.iter().any(|t| t.contains("bypass") || t.contains("cabg"));
        put(&mut out, "had_stent", had_stent);
        put(&mut out, "had_bypass", had_bypass);
        put(
            &mut out,
            "medication_only",
            !had_stent && !had_bypass && lower.iter().any(|t| t.contains("medication only")),
        );
        put(&mut out, "treatment", strings(treatment.iter().map(|t| slug(t)).collect()));
    }

    if let Some(ef) = as_finite_number(responses.get("ejection_fraction_post")) {
        put(&mut out, "ejection_fraction_post", ef);
        put(&mut out, "ef_normal", ef >= EJECTION_FRACTION_NORMAL);
        put(&mut out, "ef_severely_reduced", ef < EJECTION_FRACTION_SEVERELY_REDUCED);
    }

    if let Some(complications) = as_string_array(responses.get("complications")).filter(|c| !c.is_empty()) {
        let normalized = normalize_list(
            &complications,
            &[
                ("Heart failure", "heart_failure"),
                ("Arrhythmia", "arrhythmia"),
                ("Cardiogenic shock", "cardiogenic_shock"),
                ("None", "none"),
            ],
        );
        let has = |code: &str| normalized.iter().any(|c| c == code);
        put(&mut out, "has_heart_failure", has("heart_failure"));
        put(&mut out, "has_arrhythmia", has("arrhythmia"));
        put(&mut out, "has_cardiogenic_shock", has("cardiogenic_shock"));
        put(&mut out, "has_complications", !normalized.is_empty() && !has("none"));
        put(&mut out, "complications", strings(normalized));
    }

    if let Some(recovery) = as_non_empty_string(responses.get("full_recovery")) {
        put(&mut out, "full_recovery", recovery == "Yes");
        put(&mut out, "partial_recovery", recovery == "Partial" || recovery == "Mostly");
        put(&mut out, "recovery_status", recovery.to_lowercase());
    }

    out
}

fn transform_stroke(responses: &Facts, as_of: NaiveDate) -> Facts {
    let mut out = Facts::new();

    if let Some(kind) = as_non_empty_string(responses.get("type")) {
        let lower = kind.to_lowercase();
        put(&mut out, "is_tia", lower.contains("tia") || lower.contains("mini"));
        put(&mut out, "is_ischemic", lower.contains("ischemic"));
        put(&mut out, "is_hemorrhagic", lower.contains("hemorrhagic"));
        put(&mut out, "type", lower);
    }

    put_years_since(&mut out, responses, "date_of_event", "years_since_event", as_of);
    put_event_count(&mut out, responses);

    if let Some(effects) = as_string_array(responses.get("residual_effects")).filter(|e| !e.is_empty()) {
        let normalized = normalize_list(
            &effects,
            &[
                ("Speech difficulty", "speech_difficulty"),
                ("Paralysis/weakness", "paralysis_weakness"),
                ("Vision problems", "vision_problems"),
                ("Cognitive changes", "cognitive_changes"),
                ("None", "none"),
            ],
        );
        let has = |code: &str| normalized.iter().any(|e| e == code);
        put(&mut out, "has_residual_effects", !normalized.is_empty() && !has("none"));
        put(&mut out, "has_paralysis", has("paralysis_weakness"));
        put(&mut out, "has_speech_difficulty", has("speech_difficulty"));
        put(&mut out, "has_cognitive_changes", has("cognitive_changes"));
        put(&mut out, "has_vision_problems", has("vision_problems"));
        put(&mut out, "residual_effects", strings(normalized));
    }

    if let Some(cause) = as_non_empty_string(responses.get("cause_identified")) {
        let lower = cause.to_lowercase();
        put(&mut out, "cause", slug(cause));
        put(&mut out, "cause_is_afib", lower.contains("afib") || lower.contains("atrial"));
    }

    if let Some(thinners) = as_non_empty_string(responses.get("on_blood_thinners")) {
        put(&mut out, "on_blood_thinners", thinners == "Yes");
    }

    out
}

fn transform_high_blood_pressure(responses: &Facts, as_of: NaiveDate) -> Facts {
    let mut out = Facts::new();

    put_years_since(&mut out, responses, "diagnosis_date", "years_since_diagnosis", as_of);

    if let Some((systolic, diastolic)) =
        as_non_empty_string(responses.get("current_reading")).and_then(parse_blood_pressure)
    {
        put(&mut out, "systolic", systolic);
        put(&mut out, "diastolic", diastolic);
        put(
            &mut out,
            "is_stage2_or_higher",
            systolic >= BP_STAGE2_SYSTOLIC || diastolic >= BP_STAGE2_DIASTOLIC,
        );
        put(
            &mut out,
            "is_crisis",
            systolic > BP_CRISIS_SYSTOLIC || diastolic > BP_CRISIS_DIASTOLIC,
        );
    }

    if let Some(controlled) = as_non_empty_string(responses.get("controlled")) {
        put(
            &mut out,
            "bp_controlled",
            controlled == "Yes, consistently normal" || controlled == "Mostly controlled",
        );
        put(&mut out, "well_controlled", controlled == "Yes, consistently normal");
        put(&mut out, "poorly_controlled", controlled == "Poorly controlled");
        put(&mut out, "control_status", controlled);
    }

    if let Some(count) = as_non_empty_string(responses.get("medication_count")).and_then(leading_integer) {
        put(&mut out, "medication_count", count);
        put(&mut out, "on_multiple_medications", count >= 2);
        put(&mut out, "diet_only", count == 0);
    }

    if let Some(complications) = as_string_array(responses.get("complications")).filter(|c| !c.is_empty()) {
        let normalized = normalize_list(
            &complications,
            &[
                ("Heart disease", "heart_disease"),
                ("Kidney problems", "kidney_problems"),
                ("Eye problems", "eye_problems"),
                ("None", "none"),
            ],
        );
        let has = |code: &str| normalized.iter().any(|c| c == code);
        put(&mut out, "has_complications", !normalized.is_empty() && !has("none"));
        put(&mut out, "has_heart_complications", has("heart_disease"));
        put(&mut out, "has_kidney_complications", has("kidney_problems"));
        put(&mut out, "has_eye_complications", has("eye_problems"));
        put(&mut out, "complications", strings(normalized));
    }

    out
}

// ---------------------------------------------------------------------------
// Cancer, respiratory, mental health
// ---------------------------------------------------------------------------

fn transform_cancer(responses: &Facts, as_of: NaiveDate) -> Facts {
    let mut out = Facts::new();

    if let Some(kind) = as_non_empty_string(responses.get("cancer_type")) {
        let normalized = slug(kind);
        put(
            &mut out,
            "is_high_risk_type",
            CANCER_HIGH_RISK_TYPES.iter().any(|t| normalized.contains(t)),
        );
        let non_melanoma = normalized.contains("non_melanoma") || normalized.contains("nonmelanoma");
        let skin = normalized.contains("skin");
        put(&mut out, "is_skin_cancer", skin);
        put(&mut out, "is_melanoma", normalized.contains("melanoma") && !non_melanoma);
        put(
            &mut out,
            "is_non_melanoma_skin",
            skin && (non_melanoma || (normalized.contains("non") && !normalized.contains("melanoma"))),
        );
        put(&mut out, "cancer_type", normalized);
    }

    put_years_since(&mut out, responses, "diagnosis_date", "years_since_diagnosis", as_of);

    if let Some(stage_text) = as_non_empty_string(responses.get("stage_at_diagnosis")) {
        put(&mut out, "stage_raw", stage_text);
        if let Some(stage) = parse_cancer_stage(stage_text) {
            put(&mut out, "stage", stage);
            put(&mut out, "is_early_stage", stage <= 1);
            put(&mut out, "is_advanced_stage", stage >= 3);
            put(&mut out, "is_metastatic", stage == 4);
        }
    }

    if let Some(treatment) = as_string_array(responses.get("treatment")).filter(|t| !t.is_empty()) {
        let lower: Vec<String> = treatment.iter().map(|t| t.to_lowercase()).collect();
        let any = |needle: &str| lower.iter().any(|t| t.contains(needle));
        put(&mut out, "had_surgery", any("surgery"));
        put(&mut out, "had_chemo", any("chemo"));
        put(&mut out, "had_radiation", any("radiation"));
        put(&mut out, "had_immunotherapy", any("immunotherapy"));
        put(&mut out, "watchful_waiting", any("watchful"));
        put(&mut out, "treatment", strings(treatment.iter().map(|t| slug(t)).collect()));
    }

    if let Some(status) = as_non_empty_string(responses.get("current_status")) {
        let lower = status.to_lowercase();
        put(&mut out, "current_status", slug(status));
        put(
            &mut out,
            "in_remission",
            lower.contains("remission") || lower.contains("no evidence"),
        );
        put(&mut out, "in_treatment", lower.contains("in treatment"));
        put(&mut out, "has_recurrence", lower.contains("recurrence"));
        put(&mut out, "is_stable", lower.contains("stable"));
    }

    put_years_since(&mut out, responses, "remission_date", "years_in_remission", as_of);

    out
}

fn transform_copd(responses: &Facts, as_of: NaiveDate) -> Facts {
    let mut out = Facts::new();

    put_years_since(&mut out, responses, "diagnosis_date", "years_since_diagnosis", as_of);

    if let Some(severity) = as_non_empty_string(responses.get("severity")) {
        let lower = severity.to_lowercase();
        put(&mut out, "is_mild", lower == "mild");
        put(&mut out, "is_moderate", lower == "moderate");
        put(&mut out, "is_severe", lower == "severe" || lower.contains("very severe"));
        put(&mut out, "severity", lower);
    }

    if let Some(oxygen) = as_non_empty_string(responses.get("oxygen_use")) {
        let lower = oxygen.to_lowercase();
        put(&mut out, "oxygen_use_raw", oxygen);
        put(&mut out, "requires_oxygen", oxygen != "No");
        put(&mut out, "continuous_oxygen", lower.contains("continuously"));
        put(&mut out, "nighttime_oxygen", lower.contains("night"));
    }

    if let Some(count) = as_non_empty_string(responses.get("hospitalizations")).and_then(parse_event_count) {
        put(&mut out, "hospitalizations", count);
        put(&mut out, "hospitalized_past_year", count >= 1);
        put(&mut out, "multiple_hospitalizations", count >= 2);
    }

    if let Some(smoking) = as_non_empty_string(responses.get("smoking_status")) {
        let lower = smoking.to_lowercase();
        put(&mut out, "smoking_status", slug(smoking));
        put(&mut out, "is_current_smoker", lower.contains("current"));
        put(&mut out, "is_former_smoker", lower.contains("former"));
        put(&mut out, "never_smoked", lower.contains("never"));
    }

    if let Some(count) = as_non_empty_string(responses.get("inhalers")).and_then(parse_event_count) {
        put(&mut out, "inhaler_count", count);
        put(&mut out, "on_multiple_inhalers", count >= 2);
    }

    out
}

fn transform_mental_health(code: &str, responses: &Facts, as_of: NaiveDate) -> Facts {
    let mut out = Facts::new();

    put_years_since(&mut out, responses, "diagnosis_date", "years_since_diagnosis", as_of);

    let mut is_severe = false;
    if let Some(severity) = as_non_empty_string(responses.get("severity")) {
        let lower = severity.to_lowercase();
        is_severe = lower == "severe";
        put(&mut out, "is_mild", lower == "mild");
        put(&mut out, "is_moderate", lower == "moderate");
        put(&mut out, "is_severe", is_severe);
        put(&mut out, "in_remission", lower.contains("remission"));
        put(&mut out, "severity", lower);
    }

    if let Some(treatment) = as_string_array(responses.get("treatment")).filter(|t| !t.is_empty()) {
        let lower: Vec<String> = treatment.iter().map(|t| t.to_lowercase()).collect();
        let any = |needles: &[&str]| lower.iter().any(|t| needles.iter().any(|n| t.contains(n)));
        let on_medication = any(&["medication", "antidepressant", "ssri", "snri", "benzodiazepine"]);
        put(&mut out, "on_medication", on_medication);
        put(&mut out, "in_therapy", any(&["therapy", "counseling"]));
        put(&mut out, "no_treatment", any(&["no current treatment"]));
        put(&mut out, "stable_on_treatment", on_medication && !is_severe);
        put(&mut out, "treatment", strings(treatment.iter().map(|t| slug(t)).collect()));
    }

    if let Some(hospitalizations) = as_non_empty_string(responses.get("hospitalizations")) {
        put(&mut out, "hospitalized", hospitalizations != "No" && hospitalizations != "0");
        put(
            &mut out,
            "multiple_hospitalizations",
            hospitalizations.contains("more than once")
                || hospitalizations == "2"
                || hospitalizations.contains('3')
                || hospitalizations.contains("more"),
        );
    }

    match code {
        "depression" => {
            if let Some(attempt) = as_non_empty_string(responses.get("suicide_attempt")) {
                put(&mut out, "suicide_history", attempt == "Yes");
            }
            if let Some(impact) = as_non_empty_string(responses.get("work_impact")) {
                let lower = impact.to_lowercase();
                put(&mut out, "work_impact", slug(impact));
                put(
                    &mut out,
                    "work_disabled",
                    lower.contains("disability") || lower.contains("unable to work"),
                );
            }
        }
        "anxiety" => {
            if let Some(kind) = as_non_empty_string(responses.get("type")) {
                let lower = kind.to_lowercase();
                put(&mut out, "anxiety_type", slug(kind));
                put(&mut out, "is_ptsd", lower.contains("ptsd"));
                put(&mut out, "is_ocd", lower.contains("ocd"));
                put(&mut out, "is_panic_disorder", lower.contains("panic"));
            }
            if let Some(panic) = as_non_empty_string(responses.get("panic_attacks")) {
                let lower = panic.to_lowercase();
                put(&mut out, "has_panic_attacks", lower != "never");
                put(
                    &mut out,
                    "frequent_panic_attacks",
                    lower.contains("weekly") || lower.contains("daily"),
                );
                put(&mut out, "panic_frequency", lower);
            }
        }
        "bipolar" => {
            if let Some(kind) = as_non_empty_string(responses.get("type")) {
                let tokens = words(kind);
                let type_two = tokens.iter().any(|w| w == "ii" || w == "2");
                let type_one = !type_two && tokens.iter().any(|w| w == "i" || w == "1");
                put(&mut out, "bipolar_type", slug(kind));
                put(&mut out, "is_bipolar_1", type_one);
                put(&mut out, "is_bipolar_2", type_two);
            }
            if let Some(state) = as_non_empty_string(responses.get("current_state")) {
                let lower = state.to_lowercase();
                put(&mut out, "current_state", slug(state));
                put(&mut out, "is_stable", lower.contains("stable"));
                put(
                    &mut out,
                    "in_episode",
                    lower.contains("manic") || lower.contains("depressive") || lower.contains("mixed"),
                );
            }
            if let Some(medications) = as_string_array(responses.get("medications")).filter(|m| !m.is_empty()) {
                let lower: Vec<String> = medications.iter().map(|m| m.to_lowercase()).collect();
                put(&mut out, "on_lithium", lower.iter().any(|m| m.contains("lithium")));
                put(&mut out, "on_antipsychotic", lower.iter().any(|m| m.contains("antipsychotic")));
            }
            if let Some(compliance) = as_non_empty_string(responses.get("compliance")) {
                let lower = compliance.to_lowercase();
                put(&mut out, "compliance_level", slug(compliance));
                put(
                    &mut out,
                    "is_compliant",
                    lower.contains("always") || lower.contains("mostly"),
                );
                put(&mut out, "often_non_compliant", lower.contains("often non"));
            }
        }
        _ => {}
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn as_of() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()
    }

    fn condition(code: &str, responses: Value) -> ConditionResponse {
        ConditionResponse {
            condition_code: code.to_string(),
            condition_name: code.to_string(),
            responses: responses.as_object().cloned().unwrap_or_default(),
        }
    }

    fn transform_one(code: &str, responses: Value, age: u32) -> Facts {
        let out = transform_condition_responses(&[condition(code, responses)], age, as_of());
        out.get(code).cloned().unwrap()
    }

    #[test]
    fn test_diabetes_explicit_insulin_map() {
        let facts = transform_one("diabetes", json!({"treatment": "Insulin only"}), 50);
        assert_eq!(facts["insulin_use"], json!(true));
        let facts = transform_one("diabetes", json!({"treatment": "No insulin"}), 50);
        assert_eq!(facts["insulin_use"], json!(false));
        let facts = transform_one("diabetes", json!({"treatment": "oral medication only"}), 50);
        assert_eq!(facts["insulin_use"], json!(false));
    }

    #[test]
    fn test_diabetes_insulin_heuristic_respects_negation() {
        let facts = transform_one("diabetes", json!({"treatment": "Metformin, without insulin"}), 50);
        assert_eq!(facts["insulin_use"], json!(false));
        let facts = transform_one("diabetes", json!({"treatment": "Non-insulin injectable"}), 50);
        assert_eq!(facts["insulin_use"], json!(false));
        let facts = transform_one("diabetes", json!({"treatment": "Basal insulin nightly"}), 50);
        assert_eq!(facts["insulin_use"], json!(true));
        let facts = transform_one("diabetes", json!({"treatment": "Metformin"}), 50);
        assert_eq!(facts["insulin_use"], json!(false));
    }

    #[test]
    fn test_diabetes_missing_sources_stay_absent() {
        let facts = transform_one("diabetes", json!({"treatment": "  ", "complications": []}), 50);
        assert!(facts.get("insulin_use").is_none());
        assert!(facts.get("is_controlled").is_none());
        assert!(facts.get("complications").is_none());
        assert!(facts.get("years_since_diagnosis").is_none());
    }

    #[test]
    fn test_diabetes_a1c_and_diagnosis_age() {
        let facts = transform_one(
            "diabetes",
            json!({"a1c_level": "7.2", "diagnosis_age": 38, "type": "Type 2"}),
            50,
        );
        assert_eq!(facts["is_controlled"], json!(true));
        assert_eq!(facts["good_control"], json!(true));
        assert_eq!(facts["a1c_level"], json!(7.2));
        assert_eq!(facts["years_since_diagnosis"], json!(12.0));
        assert_eq!(facts["type"], json!("Type 2"));

        let facts = transform_one("diabetes", json!({"a1c_level": 7.5, "diagnosis_age": 60}), 50);
        assert_eq!(facts["is_controlled"], json!(false));
        assert!(facts.get("years_since_diagnosis").is_none());
    }

    #[test]
    fn test_diabetes_complications_normalized() {
        let facts = transform_one(
            "diabetes",
            json!({"complications": ["Retinopathy (eye)", "Heart disease", "Foot ulcer (left)"]}),
            50,
        );
        assert_eq!(
            facts["complications"],
            json!(["retinopathy", "heart_disease", "foot ulcer"])
        );

        let facts = transform_one("diabetes", json!({"complications": ["None"]}), 50);
        assert_eq!(facts["complications"], json!([]));
    }

    #[test]
    fn test_blood_pressure_reading_and_flags() {
        let facts = transform_one(
            "high_blood_pressure",
            json!({
                "current_reading": "142 / 85",
                "controlled": "Mostly controlled",
                "medication_count": "2 medications",
                "complications": ["Kidney problems"],
                "diagnosis_date": "2020-01-01"
            }),
            55,
        );
        assert_eq!(facts["systolic"], json!(142));
        assert_eq!(facts["diastolic"], json!(85));
        assert_eq!(facts["is_stage2_or_higher"], json!(true));
        assert_eq!(facts["is_crisis"], json!(false));
        assert_eq!(facts["bp_controlled"], json!(true));
        assert_eq!(facts["well_controlled"], json!(false));
        assert_eq!(facts["on_multiple_medications"], json!(true));
        assert_eq!(facts["diet_only"], json!(false));
        assert_eq!(facts["has_kidney_complications"], json!(true));
        assert_eq!(facts["has_complications"], json!(true));
        assert_eq!(facts["years_since_diagnosis"], json!(5.0));
    }

    #[test]
    fn test_blood_pressure_out_of_bounds_reading_ignored() {
        let facts = transform_one("high_blood_pressure", json!({"current_reading": "300/85"}), 55);
        assert!(facts.get("systolic").is_none());
        assert!(facts.get("is_crisis").is_none());
    }

    #[test]
    fn test_cancer_stage_and_status() {
        let facts = transform_one(
            "cancer",
            json!({
                "cancer_type": "Skin (non-melanoma)",
                "stage_at_diagnosis": "Stage III",
                "current_status": "In remission",
                "treatment": ["Surgery", "Radiation"]
            }),
            60,
        );
        assert_eq!(facts["is_non_melanoma_skin"], json!(true));
        assert_eq!(facts["is_melanoma"], json!(false));
        assert_eq!(facts["stage"], json!(3));
        assert_eq!(facts["is_advanced_stage"], json!(true));
        assert_eq!(facts["in_remission"], json!(true));
        assert_eq!(facts["had_surgery"], json!(true));
        assert_eq!(facts["had_chemo"], json!(false));
    }

    #[test]
    fn test_heart_disease_procedures_and_ejection_fraction() {
        let facts = transform_one(
            "heart_disease",
            json!({
                "type": "Coronary artery disease",
                "diagnosis_date": "2020-01-01",
                "procedures": ["Angioplasty/Stent"],
                "ejection_fraction": 30,
                "symptoms_controlled": "Mostly controlled",
                "medications": ["Blood Thinner", "Statin"]
            }),
            62,
        );
        assert_eq!(facts["years_since_diagnosis"], json!(5.0));
        assert_eq!(facts["has_stent"], json!(true));
        assert_eq!(facts["has_bypass"], json!(false));
        assert_eq!(facts["no_procedures"], json!(false));
        assert_eq!(facts["ef_severely_reduced"], json!(true));
        assert_eq!(facts["ef_normal"], json!(false));
        assert_eq!(facts["symptoms_controlled"], json!(true));
        assert_eq!(facts["on_blood_thinner"], json!(true));
        assert_eq!(facts["on_beta_blocker"], json!(false));

        let facts = transform_one("heart_disease", json!({"procedures": [], "ejection_fraction": ""}), 62);
        assert!(facts.get("has_stent").is_none());
        assert!(facts.get("ef_severely_reduced").is_none());
        assert!(facts.get("years_since_diagnosis").is_none());
        assert!(facts.get("on_blood_thinner").is_none());
    }

    #[test]
    fn test_heart_attack_treatment_and_recovery() {
        let facts = transform_one(
            "heart_attack",
            json!({
                "date_of_event": "2022-01-01",
                "number_of_events": "2",
                "treatment": ["Angioplasty/Stent", "Medication only"],
                "ejection_fraction_post": "60%",
                "complications": ["Arrhythmia"],
                "full_recovery": "Partial"
            }),
            58,
        );
        assert_eq!(facts["years_since_event"], json!(3.0));
        assert_eq!(facts["event_count"], json!(2));
        assert_eq!(facts["multiple_events"], json!(true));
        assert_eq!(facts["had_stent"], json!(true));
        assert_eq!(facts["had_bypass"], json!(false));
        assert_eq!(facts["medication_only"], json!(false));
        assert_eq!(facts["ef_normal"], json!(true));
        assert_eq!(facts["has_arrhythmia"], json!(true));
        assert_eq!(facts["has_complications"], json!(true));
        assert_eq!(facts["full_recovery"], json!(false));
        assert_eq!(facts["partial_recovery"], json!(true));

        let facts = transform_one("heart_attack", json!({"treatment": [], "full_recovery": " "}), 58);
        assert!(facts.get("had_stent").is_none());
        assert!(facts.get("full_recovery").is_none());
        assert!(facts.get("years_since_event").is_none());
        assert!(facts.get("multiple_events").is_none());
    }

    #[test]
    fn test_stroke_type_and_residual_effects() {
        let facts = transform_one(
            "stroke",
            json!({
                "type": "TIA (mini-stroke)",
                "date_of_event": "2023-07-01",
                "residual_effects": ["None"],
                "cause_identified": "Atrial fibrillation",
                "on_blood_thinners": "Yes"
            }),
            66,
        );
        assert_eq!(facts["is_tia"], json!(true));
        assert_eq!(facts["is_hemorrhagic"], json!(false));
        assert_eq!(facts["years_since_event"], json!(1.5));
        assert_eq!(facts["has_residual_effects"], json!(false));
        assert_eq!(facts["has_paralysis"], json!(false));
        assert_eq!(facts["cause_is_afib"], json!(true));
        assert_eq!(facts["on_blood_thinners"], json!(true));
        assert!(facts.get("event_count").is_none());

        let facts = transform_one("stroke", json!({"date_of_event": "2026-01-01"}), 66);
        assert!(facts.get("years_since_event").is_none());
        assert!(facts.get("is_tia").is_none());
        assert!(facts.get("has_residual_effects").is_none());
    }

    #[test]
    fn test_copd_oxygen_and_hospitalizations() {
        let facts = transform_one(
            "copd",
            json!({
                "severity": "Moderate",
                "oxygen_use": "At night only",
                "hospitalizations": "2",
                "smoking_status": "Former smoker",
                "inhalers": "3 or more"
            }),
            64,
        );
        assert_eq!(facts["is_moderate"], json!(true));
        assert_eq!(facts["is_severe"], json!(false));
        assert_eq!(facts["requires_oxygen"], json!(true));
        assert_eq!(facts["nighttime_oxygen"], json!(true));
        assert_eq!(facts["continuous_oxygen"], json!(false));
        assert_eq!(facts["hospitalized_past_year"], json!(true));
        assert_eq!(facts["multiple_hospitalizations"], json!(true));
        assert_eq!(facts["is_former_smoker"], json!(true));
        assert_eq!(facts["inhaler_count"], json!(3));
        assert_eq!(facts["on_multiple_inhalers"], json!(true));

        let facts = transform_one("copd", json!({"oxygen_use": "No", "hospitalizations": "None"}), 64);
        assert_eq!(facts["requires_oxygen"], json!(false));
        assert!(facts.get("hospitalized_past_year").is_none());
        assert!(facts.get("is_severe").is_none());
    }

    #[test]
    fn test_depression_treatment_and_history() {
        let facts = transform_one(
            "depression",
            json!({
                "diagnosis_date": "2019-01-01",
                "severity": "Moderate",
                "treatment": ["Medication (antidepressant)", "Therapy/counseling"],
                "hospitalizations": "No",
                "suicide_attempt": "No",
                "work_impact": "Unable to work"
            }),
            44,
        );
        assert_eq!(facts["years_since_diagnosis"], json!(6.0));
        assert_eq!(facts["is_moderate"], json!(true));
        assert_eq!(facts["on_medication"], json!(true));
        assert_eq!(facts["in_therapy"], json!(true));
        assert_eq!(facts["stable_on_treatment"], json!(true));
        assert_eq!(facts["hospitalized"], json!(false));
        assert_eq!(facts["multiple_hospitalizations"], json!(false));
        assert_eq!(facts["suicide_history"], json!(false));
        assert_eq!(facts["work_disabled"], json!(true));

        let facts = transform_one("depression", json!({"severity": "Mild"}), 44);
        assert!(facts.get("suicide_history").is_none());
        assert!(facts.get("hospitalized").is_none());
        assert!(facts.get("on_medication").is_none());
    }

    #[test]
    fn test_anxiety_type_and_panic_frequency() {
        let facts = transform_one(
            "anxiety",
            json!({
                "type": "Panic disorder",
                "panic_attacks": "Weekly",
                "hospitalizations": "2"
            }),
            35,
        );
        assert_eq!(facts["is_panic_disorder"], json!(true));
        assert_eq!(facts["is_ptsd"], json!(false));
        assert_eq!(facts["has_panic_attacks"], json!(true));
        assert_eq!(facts["frequent_panic_attacks"], json!(true));
        assert_eq!(facts["hospitalized"], json!(true));
        assert_eq!(facts["multiple_hospitalizations"], json!(true));
        assert!(facts.get("is_severe").is_none());
        assert!(facts.get("suicide_history").is_none());
    }

    #[test]
    fn test_bipolar_type_state_and_compliance() {
        let facts = transform_one(
            "bipolar",
            json!({
                "type": "Bipolar II",
                "severity": "Severe",
                "treatment": ["Medication"],
                "current_state": "Stable",
                "medications": ["Lithium"],
                "compliance": "Always take as prescribed"
            }),
            41,
        );
        assert_eq!(facts["is_bipolar_2"], json!(true));
        assert_eq!(facts["is_bipolar_1"], json!(false));
        assert_eq!(facts["stable_on_treatment"], json!(false));
        assert_eq!(facts["is_stable"], json!(true));
        assert_eq!(facts["in_episode"], json!(false));
        assert_eq!(facts["on_lithium"], json!(true));
        assert_eq!(facts["on_antipsychotic"], json!(false));
        assert_eq!(facts["is_compliant"], json!(true));
        assert_eq!(facts["often_non_compliant"], json!(false));
        assert!(facts.get("has_panic_attacks").is_none());
        assert!(facts.get("years_since_diagnosis").is_none());
    }

    #[test]
    fn test_unknown_condition_passes_through() {
        let facts = transform_one("gout", json!({"flares_per_year": 2}), 40);
        assert_eq!(facts["flares_per_year"], json!(2));
    }

    #[test]
    fn test_years_since_date_floors_to_tenth() {
        let years = years_since_date("2023-07-01", as_of()).unwrap();
        assert_eq!(years, 1.5);
        assert!(years_since_date("2026-01-01", as_of()).is_none());
        assert!(years_since_date("not a date", as_of()).is_none());
    }

    #[test]
    fn test_event_count_forms() {
        assert_eq!(parse_event_count("2"), Some(2));
        assert_eq!(parse_event_count("3 or more"), Some(3));
        assert_eq!(parse_event_count("More than 4+"), Some(4));
        assert_eq!(parse_event_count("None"), None);
    }
}
