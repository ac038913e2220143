//! Normalization of ML service responses.
//!
//! The prediction service has shipped several response shapes over time.
//! Each shape gets a matcher; matchers are tried in order and the first one
//! that recognizes the payload produces the [`RiskAssessment`]. Garbage input
//! never fails, it degrades to [`RiskAssessment::unknown`].

use serde_json::{Map, Value as JsonValue};

use crate::prediction::{
    LABEL_HIGH_RISK, LABEL_LOW_RISK, LABEL_MEDIUM_RISK, LABEL_UNKNOWN, RiskAssessment,
};

type Fields = Map<String, JsonValue>;
type Matcher = fn(&Fields) -> Option<RiskAssessment>;

/// Shape matchers in precedence order. The last one always matches.
const MATCHERS: &[Matcher] = &[native_shape, classifier_shape, fallback_shape];

/// Probability at or above which a classifier output is "High Risk"
pub const HIGH_RISK_THRESHOLD: f64 = 0.8;
/// Probability at or above which a classifier output is "Medium Risk"
pub const MEDIUM_RISK_THRESHOLD: f64 = 0.5;

/// Map an arbitrary upstream payload to the canonical risk triple
pub fn normalize(raw: &JsonValue) -> RiskAssessment {
    let Some(fields) = raw.as_object() else {
        return RiskAssessment::unknown();
    };

    MATCHERS
        .iter()
        .find_map(|matcher| matcher(fields))
        .unwrap_or_else(RiskAssessment::unknown)
}

/// `{riskLabel, riskScore | score, confidence | probability}`
///
/// Selected by presence: a truthy `riskLabel` or a non-null `riskScore` or
/// `score`. Values of the wrong type then read as absent.
fn native_shape(fields: &Fields) -> Option<RiskAssessment> {
    let label = fields.get("riskLabel").filter(|v| truthy(v));
    let score = present(fields, &["riskScore", "score"]);

    if label.is_none() && score.is_none() {
        return None;
    }

    // A missing confidence falls back to riskScore (not `score`)
    let confidence = present(fields, &["confidence", "probability", "riskScore"]);

    Some(RiskAssessment::new(
        label
            .and_then(JsonValue::as_str)
            .unwrap_or(LABEL_UNKNOWN),
        score.and_then(JsonValue::as_f64),
        confidence.and_then(JsonValue::as_f64),
    ))
}

/// Binary classifier output: `{prediction, probability | risk_percent}`
fn classifier_shape(fields: &Fields) -> Option<RiskAssessment> {
    present(fields, &["prediction"])?;

    let probability = match present(fields, &["probability"]) {
        Some(value) => value.as_f64(),
        None => number(fields, "risk_percent").map(|percent| percent / 100.0),
    };

    let label = probability.map_or(LABEL_UNKNOWN, band);
    Some(RiskAssessment::new(label, probability, probability))
}

/// Anything else: `{label, proba | probability}`
fn fallback_shape(fields: &Fields) -> Option<RiskAssessment> {
    let probability = present(fields, &["proba", "probability"]).and_then(JsonValue::as_f64);

    Some(RiskAssessment::new(
        text(fields, "label").unwrap_or_else(|| LABEL_UNKNOWN.to_string()),
        probability,
        probability,
    ))
}

fn band(probability: f64) -> &'static str {
    if probability >= HIGH_RISK_THRESHOLD {
        LABEL_HIGH_RISK
    } else if probability >= MEDIUM_RISK_THRESHOLD {
        LABEL_MEDIUM_RISK
    } else {
        LABEL_LOW_RISK
    }
}

/// Non-empty string field. Other JSON types carry no label.
fn text(fields: &Fields, key: &str) -> Option<String> {
    fields
        .get(key)
        .and_then(JsonValue::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
}

/// Numeric field. Strings, booleans and nulls are treated as absent.
fn number(fields: &Fields, key: &str) -> Option<f64> {
    fields.get(key).and_then(JsonValue::as_f64)
}

/// First of `keys` holding a non-null value, whatever its type
fn present<'a>(fields: &'a Fields, keys: &[&str]) -> Option<&'a JsonValue> {
    keys.iter()
        .find_map(|key| fields.get(*key).filter(|value| !value.is_null()))
}

/// JSON truthiness: null, false, 0, NaN and "" are falsy
fn truthy(value: &JsonValue) -> bool {
    match value {
        JsonValue::Null => false,
        JsonValue::Bool(b) => *b,
        JsonValue::Number(n) => n.as_f64().is_some_and(|x| x != 0.0),
        JsonValue::String(s) => !s.is_empty(),
        JsonValue::Array(_) | JsonValue::Object(_) => true,
    }
}


#[cfg(test)]
mod proptest_tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    /// Keys that no matcher looks at
    fn unrelated_key() -> impl Strategy<Value = String> {
        prop::sample::select(vec![
            "age", "bmi", "gender", "HbA1c_level", "blood_glucose_level", "status", "model",
        ])
        .prop_map(str::to_owned)
    }

    fn scalar() -> impl Strategy<Value = JsonValue> {
        prop_oneof![
            Just(JsonValue::Null),
            any::<bool>().prop_map(JsonValue::from),
            (-1000.0..1000.0f64).prop_map(JsonValue::from),
            "[a-z]{0,8}".prop_map(JsonValue::from),
        ]
    }

    proptest! {
        /// Payloads without any recognized field are always Unknown with null scores
        #[test]
        fn unrecognized_shapes_are_unknown(
            entries in prop::collection::vec((unrelated_key(), scalar()), 0..6)
        ) {
            let raw = JsonValue::Object(entries.into_iter().collect());
            let result = normalize(&raw);
            prop_assert_eq!(result.risk_label, "Unknown");
            prop_assert_eq!(result.risk_score, None);
            prop_assert_eq!(result.confidence, None);
        }

        /// riskScore is passed through untouched
        #[test]
        fn risk_score_passthrough(score in -1.0e6..1.0e6f64, label in "[A-Za-z ]{0,10}") {
            let result = normalize(&json!({"riskScore": score, "riskLabel": label}));
            prop_assert_eq!(result.risk_score, Some(score));
        }

        #[test]
        fn high_band(p in 0.8..=1.0f64) {
            let result = normalize(&json!({"prediction": 1, "probability": p}));
            prop_assert_eq!(result.risk_label, "High Risk");
        }

        #[test]
        fn medium_band(p in 0.5..0.8f64) {
            let result = normalize(&json!({"prediction": 1, "probability": p}));
            prop_assert_eq!(result.risk_label, "Medium Risk");
        }

        #[test]
        fn low_band(p in -10.0..0.5f64) {
            let result = normalize(&json!({"prediction": 0, "probability": p}));
            prop_assert_eq!(result.risk_label, "Low Risk");
        }

        /// Same input, same bytes out
        #[test]
        fn deterministic(
            entries in prop::collection::vec(
                (
                    prop::sample::select(vec![
                        "riskLabel", "riskScore", "score", "confidence", "probability",
                        "prediction", "risk_percent", "label", "proba", "bmi",
                    ]).prop_map(str::to_owned),
                    scalar(),
                ),
                0..8,
            )
        ) {
            let raw = JsonValue::Object(entries.into_iter().collect());
            let first = serde_json::to_vec(&normalize(&raw)).unwrap();
            let second = serde_json::to_vec(&normalize(&raw)).unwrap();
            prop_assert_eq!(first, second);
        }
    }
}
