use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::prediction::{PredictionResult, is_high_risk_label};
use crate::validation::{MAX_NOTE_LENGTH, ValidationErrors, parse_datetime};

/// Clinical measurements taken at a visit
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitMetrics {
    #[serde(rename = "HbA1cLevel", default)]
    pub hba1c_level: Option<f64>,
    #[serde(default)]
    pub blood_glucose_level: Option<f64>,
    #[serde(default)]
    pub bmi: Option<f64>,
}

/// Prediction snapshot stored alongside a visit
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitPrediction {
    #[serde(default)]
    pub risk_label: Option<String>,
    #[serde(default)]
    pub risk_score: Option<f64>,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub model_version: Option<String>,
    #[serde(default)]
    pub predicted_at: Option<DateTime<Utc>>,
}

impl From<&PredictionResult> for VisitPrediction {
    fn from(result: &PredictionResult) -> Self {
        Self {
            risk_label: Some(result.assessment.risk_label.clone()),
            risk_score: result.assessment.risk_score,
            confidence: result.assessment.confidence,
            model_version: Some(result.model_version.clone()),
            predicted_at: Some(result.predicted_at),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Visit {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: String,
    pub visit_date: DateTime<Utc>,
    pub metrics: VisitMetrics,
    pub notes: String,
    pub recommendations: String,
    pub prediction: Option<VisitPrediction>,
    pub created_at: DateTime<Utc>,
}

/// Latest prediction in the shape the AI chat expects as context
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionContext {
    /// 1 when the stored label names the high-risk band
    pub prediction: u8,
    pub risk_percent: Option<f64>,
    pub confidence: Option<f64>,
    pub model_version: Option<String>,
    pub predicted_at: Option<DateTime<Utc>>,
    pub patient_data: PatientData,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatientData {
    pub metrics: VisitMetrics,
}

impl Visit {
    /// Chat context built from this visit, if it carries a scored prediction
    pub fn prediction_context(&self) -> Option<PredictionContext> {
        let prediction = self.prediction.as_ref()?;
        prediction.risk_score?;

        let high = prediction
            .risk_label
            .as_deref()
            .is_some_and(is_high_risk_label);

        Some(PredictionContext {
            prediction: u8::from(high),
            risk_percent: prediction.risk_score,
            confidence: prediction.confidence,
            model_version: prediction.model_version.clone(),
            predicted_at: prediction.predicted_at,
            patient_data: PatientData {
                metrics: self.metrics.clone(),
            },
        })
    }
}

/// Validated fields for a new visit
#[derive(Debug, Clone, PartialEq)]
pub struct NewVisit {
    pub visit_date: DateTime<Utc>,
    pub metrics: VisitMetrics,
    pub notes: String,
    pub recommendations: String,
    pub prediction: Option<VisitPrediction>,
}

/// Visit fields as they arrive over HTTP, before validation
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitInput {
    pub visit_date: Option<JsonValue>,
    pub metrics: Option<JsonValue>,
    pub notes: Option<JsonValue>,
    pub recommendations: Option<JsonValue>,
    pub prediction: Option<JsonValue>,
}

impl VisitInput {
    pub fn into_new_visit(self) -> Result<NewVisit, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let visit_date = match &self.visit_date {
            Some(JsonValue::String(raw)) => parse_datetime(raw),
            _ => None,
        };
        if visit_date.is_none() {
            errors.push("visitDate", "visitDate must be a valid date");
        }

        let metrics = match self.metrics {
            Some(value @ JsonValue::Object(_)) => match serde_json::from_value::<VisitMetrics>(value) {
                Ok(metrics) => Some(metrics),
                Err(_) => {
                    errors.push("metrics", "metrics values must be numbers");
                    None
                }
            },
            _ => {
                errors.push("metrics", "metrics object required");
                None
            }
        };

        if let Some(m) = &metrics {
            errors.check_range("metrics.HbA1cLevel", m.hba1c_level, 0.0, 20.0, "HbA1cLevel out of range");
            errors.check_range(
                "metrics.bloodGlucoseLevel",
                m.blood_glucose_level,
                0.0,
                600.0,
                "bloodGlucoseLevel out of range",
            );
            errors.check_range("metrics.bmi", m.bmi, 0.0, 100.0, "bmi out of range");
        }

        let notes = errors.string("notes", self.notes).unwrap_or_default();
        if notes.chars().count() > MAX_NOTE_LENGTH {
            errors.push("notes", "notes too long");
        }
        let recommendations = errors
            .string("recommendations", self.recommendations)
            .unwrap_or_default();
        if recommendations.chars().count() > MAX_NOTE_LENGTH {
            errors.push("recommendations", "recommendations too long");
        }

        let prediction = match self.prediction {
            None | Some(JsonValue::Null) => None,
            Some(value @ JsonValue::Object(_)) => match serde_json::from_value::<VisitPrediction>(value) {
                Ok(prediction) => Some(prediction),
                Err(_) => {
                    errors.push("prediction", "prediction must be object");
                    None
                }
            },
            Some(_) => {
                errors.push("prediction", "prediction must be object");
                None
            }
        };

        let (Some(visit_date), Some(metrics)) = (visit_date, metrics) else {
            return Err(errors);
        };

        errors.finish(NewVisit {
            visit_date,
            metrics,
            notes,
            recommendations,
            prediction,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn input(value: JsonValue) -> VisitInput {
        serde_json::from_value(value).unwrap()
    }

    fn visit_with(prediction: Option<VisitPrediction>) -> Visit {
        Visit {
            id: Uuid::new_v4(),
            patient_id: Uuid::new_v4(),
            doctor_id: "doc-1".to_string(),
            visit_date: Utc::now(),
            metrics: VisitMetrics {
                hba1c_level: Some(7.2),
                blood_glucose_level: Some(180.0),
                bmi: Some(29.4),
            },
            notes: String::new(),
            recommendations: String::new(),
            prediction,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn valid_visit_with_prediction() {
        let visit = input(json!({
            "visitDate": "2026-02-10",
            "metrics": {"HbA1cLevel": 6.8, "bmi": 27.0},
            "notes": "fasting sample",
            "prediction": {"riskLabel": "Medium Risk", "riskScore": 0.62, "modelVersion": "v1"}
        }))
        .into_new_visit()
        .unwrap();

        assert_eq!(visit.metrics.hba1c_level, Some(6.8));
        assert_eq!(visit.metrics.blood_glucose_level, None);
        assert_eq!(visit.notes, "fasting sample");
        assert_eq!(visit.recommendations, "");
        let prediction = visit.prediction.unwrap();
        assert_eq!(prediction.risk_label.as_deref(), Some("Medium Risk"));
        assert_eq!(prediction.confidence, None);
    }

    #[test]
    fn visit_requires_date_and_metrics_object() {
        let errors = input(json!({"metrics": [1, 2]})).into_new_visit().unwrap_err();
        let fields: Vec<&str> = errors.errors().iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["visitDate", "metrics"]);
    }

    #[test]
    fn visit_text_fields_must_be_strings() {
        let errors = input(json!({
            "visitDate": 20260210,
            "metrics": {"bmi": 27.0},
            "notes": ["a"],
            "recommendations": null
        }))
        .into_new_visit()
        .unwrap_err();
        let fields: Vec<&str> = errors.errors().iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["visitDate", "notes"]);
        assert_eq!(errors.errors()[1].message, "notes must be a string");
    }

    #[test]
    fn visit_rejects_long_notes_and_bad_prediction() {
        let errors = input(json!({
            "visitDate": "2026-02-10T09:00:00Z",
            "metrics": {"bloodGlucoseLevel": 601},
            "notes": "n".repeat(2001),
            "prediction": "High"
        }))
        .into_new_visit()
        .unwrap_err();

        let fields: Vec<&str> = errors.errors().iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["metrics.bloodGlucoseLevel", "notes", "prediction"]);
    }

    #[test]
    fn prediction_context_flags_both_high_vocabularies() {
        for label in ["High", "High Risk"] {
            let visit = visit_with(Some(VisitPrediction {
                risk_label: Some(label.to_string()),
                risk_score: Some(0.9),
                ..Default::default()
            }));
            assert_eq!(visit.prediction_context().unwrap().prediction, 1);
        }

        let visit = visit_with(Some(VisitPrediction {
            risk_label: Some("Medium Risk".to_string()),
            risk_score: Some(0.6),
            confidence: Some(0.6),
            ..Default::default()
        }));
        let context = visit.prediction_context().unwrap();
        assert_eq!(context.prediction, 0);
        assert_eq!(context.risk_percent, Some(0.6));
        assert_eq!(context.patient_data.metrics.bmi, Some(29.4));
    }

    #[test]
    fn prediction_context_requires_a_score() {
        assert!(visit_with(None).prediction_context().is_none());
        let unscored = visit_with(Some(VisitPrediction {
            risk_label: Some("Unknown".to_string()),
            ..Default::default()
        }));
        assert!(unscored.prediction_context().is_none());
    }
}
