use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value as JsonValue;

/// Label used whenever the upstream payload carries no recognizable risk signal
pub const LABEL_UNKNOWN: &str = "Unknown";
pub const LABEL_HIGH_RISK: &str = "High Risk";
pub const LABEL_MEDIUM_RISK: &str = "Medium Risk";
pub const LABEL_LOW_RISK: &str = "Low Risk";

/// Canonical risk triple extracted from an ML service response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskAssessment {
    pub risk_label: String,
    pub risk_score: Option<f64>,
    pub confidence: Option<f64>,
}

impl RiskAssessment {
    pub fn new(risk_label: impl Into<String>, risk_score: Option<f64>, confidence: Option<f64>) -> Self {
        Self {
            risk_label: risk_label.into(),
            risk_score,
            confidence,
        }
    }

    /// The "no signal" assessment: `Unknown` with no score and no confidence
    pub fn unknown() -> Self {
        Self::new(LABEL_UNKNOWN, None, None)
    }
}

/// Whether a label names the high-risk band.
///
/// Both vocabularies are in circulation: native-shape services answer
/// `High`, classifier-shape services are mapped to `High Risk`.
pub fn is_high_risk_label(label: &str) -> bool {
    matches!(label, "High" | LABEL_HIGH_RISK)
}

/// Result of a prediction request, as returned to API clients
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionResult {
    #[serde(flatten)]
    pub assessment: RiskAssessment,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,

    pub model_version: String,

    #[serde(serialize_with = "serialize_millis")]
    pub predicted_at: DateTime<Utc>,

    /// Untouched upstream body, only populated outside production
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<JsonValue>,
}

/// ISO-8601 in UTC with millisecond precision, e.g. `2026-01-31T09:15:02.114Z`
fn serialize_millis<S: Serializer>(at: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&at.to_rfc3339_opts(SecondsFormat::Millis, true))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn result_flattens_assessment_and_formats_timestamp() {
        let result = PredictionResult {
            assessment: RiskAssessment::new("High", Some(0.91), Some(0.91)),
            explanation: None,
            model_version: "v1".to_string(),
            predicted_at: Utc.with_ymd_and_hms(2026, 3, 4, 5, 6, 7).unwrap(),
            raw: None,
        };

        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(
            value,
            json!({
                "riskLabel": "High",
                "riskScore": 0.91,
                "confidence": 0.91,
                "modelVersion": "v1",
                "predictedAt": "2026-03-04T05:06:07.000Z"
            })
        );
    }

    #[test]
    fn null_scores_are_serialized_not_skipped() {
        let value = serde_json::to_value(RiskAssessment::unknown()).unwrap();
        assert_eq!(
            value,
            json!({"riskLabel": "Unknown", "riskScore": null, "confidence": null})
        );
    }

    #[test]
    fn both_high_vocabularies_are_high() {
        assert!(is_high_risk_label("High"));
        assert!(is_high_risk_label("High Risk"));
        assert!(!is_high_risk_label("Medium Risk"));
        assert!(!is_high_risk_label("high"));
    }
}
