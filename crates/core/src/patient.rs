use chrono::{DateTime, NaiveDate, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::{fmt, str::FromStr};
use uuid::Uuid;

use crate::validation::{ValidationErrors, nullable, parse_date};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Other,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
            Gender::Other => "other",
        }
    }
}

impl FromStr for Gender {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "male" => Ok(Gender::Male),
            "female" => Ok(Gender::Female),
            "other" => Ok(Gender::Other),
            other => Err(format!("unknown gender '{other}'")),
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Smoking history categories, matching the model's training vocabulary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SmokingHistory {
    #[serde(rename = "never")]
    Never,
    #[serde(rename = "former")]
    Former,
    #[serde(rename = "current")]
    Current,
    #[serde(rename = "not current")]
    NotCurrent,
    #[default]
    #[serde(rename = "no info")]
    NoInfo,
    #[serde(rename = "unknown")]
    Unknown,
}

impl SmokingHistory {
    pub fn as_str(&self) -> &'static str {
        match self {
            SmokingHistory::Never => "never",
            SmokingHistory::Former => "former",
            SmokingHistory::Current => "current",
            SmokingHistory::NotCurrent => "not current",
            SmokingHistory::NoInfo => "no info",
            SmokingHistory::Unknown => "unknown",
        }
    }
}

impl FromStr for SmokingHistory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "never" => Ok(SmokingHistory::Never),
            "former" => Ok(SmokingHistory::Former),
            "current" => Ok(SmokingHistory::Current),
            "not current" => Ok(SmokingHistory::NotCurrent),
            "no info" => Ok(SmokingHistory::NoInfo),
            "unknown" => Ok(SmokingHistory::Unknown),
            other => Err(format!("unknown smoking history '{other}'")),
        }
    }
}

/// A patient record owned by the doctor who created it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Patient {
    pub id: Uuid,
    /// Human-readable code shown to the patient, e.g. `P-7K2QX41023`
    #[serde(rename = "patientId")]
    pub patient_code: String,
    pub name: String,
    pub dob: NaiveDate,
    pub gender: Gender,
    pub hypertension: bool,
    pub heart_disease: bool,
    pub smoking_history: SmokingHistory,
    pub bmi: Option<f64>,
    #[serde(rename = "HbA1cLevel")]
    pub hba1c_level: Option<f64>,
    pub blood_glucose_level: Option<f64>,
    pub created_by_doctor_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Validated fields for a new patient
#[derive(Debug, Clone, PartialEq)]
pub struct NewPatient {
    pub name: String,
    pub dob: NaiveDate,
    pub gender: Gender,
    pub hypertension: bool,
    pub heart_disease: bool,
    pub smoking_history: SmokingHistory,
    pub bmi: Option<f64>,
    pub hba1c_level: Option<f64>,
    pub blood_glucose_level: Option<f64>,
}

/// Validated partial update. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PatientUpdate {
    pub name: Option<String>,
    pub dob: Option<NaiveDate>,
    pub gender: Option<Gender>,
    pub hypertension: Option<bool>,
    pub heart_disease: Option<bool>,
    pub smoking_history: Option<SmokingHistory>,
    pub bmi: Option<Option<f64>>,
    pub hba1c_level: Option<Option<f64>>,
    pub blood_glucose_level: Option<Option<f64>>,
}

impl PatientUpdate {
    pub fn apply(self, patient: &mut Patient) {
        if let Some(name) = self.name {
            patient.name = name;
        }
        if let Some(dob) = self.dob {
            patient.dob = dob;
        }
        if let Some(gender) = self.gender {
            patient.gender = gender;
        }
        if let Some(hypertension) = self.hypertension {
            patient.hypertension = hypertension;
        }
        if let Some(heart_disease) = self.heart_disease {
            patient.heart_disease = heart_disease;
        }
        if let Some(smoking_history) = self.smoking_history {
            patient.smoking_history = smoking_history;
        }
        if let Some(bmi) = self.bmi {
            patient.bmi = bmi;
        }
        if let Some(hba1c_level) = self.hba1c_level {
            patient.hba1c_level = hba1c_level;
        }
        if let Some(blood_glucose_level) = self.blood_glucose_level {
            patient.blood_glucose_level = blood_glucose_level;
        }
    }
}

/// Patient fields as they arrive over HTTP, before validation.
///
/// Values stay untyped so that a wrong JSON type is reported per field.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientInput {
    pub name: Option<JsonValue>,
    pub dob: Option<JsonValue>,
    pub gender: Option<JsonValue>,
    pub hypertension: Option<JsonValue>,
    pub heart_disease: Option<JsonValue>,
    pub smoking_history: Option<JsonValue>,
    #[serde(default, deserialize_with = "nullable")]
    pub bmi: Option<Option<JsonValue>>,
    #[serde(rename = "HbA1cLevel", default, deserialize_with = "nullable")]
    pub hba1c_level: Option<Option<JsonValue>>,
    #[serde(default, deserialize_with = "nullable")]
    pub blood_glucose_level: Option<Option<JsonValue>>,
}

/// Parse a text field; a non-string value gets the same message as bad text
fn parse_text<T>(
    errors: &mut ValidationErrors,
    field: &str,
    value: Option<JsonValue>,
    message: &str,
    parse: impl FnOnce(&str) -> Option<T>,
) -> Option<T> {
    let parsed = match value? {
        JsonValue::Null => return None,
        JsonValue::String(raw) => parse(&raw),
        _ => None,
    };
    if parsed.is_none() {
        errors.push(field, message);
    }
    parsed
}

impl PatientInput {
    /// Validate as a creation request: name, dob and gender are required
    pub fn into_new_patient(self) -> Result<NewPatient, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if self.name.as_ref().is_none_or(JsonValue::is_null) {
            errors.push("name", "name is required");
        }
        if self.dob.as_ref().is_none_or(JsonValue::is_null) {
            errors.push("dob", "dob must be a valid date (YYYY-MM-DD)");
        }
        if self.gender.as_ref().is_none_or(JsonValue::is_null) {
            errors.push("gender", "gender invalid");
        }

        let update = match self.into_update() {
            Ok(update) => update,
            Err(more) => {
                for e in more.into_errors() {
                    if !errors.errors().iter().any(|known| known.field == e.field) {
                        errors.push(&e.field, &e.message);
                    }
                }
                return Err(errors);
            }
        };

        let (Some(name), Some(dob), Some(gender)) = (update.name, update.dob, update.gender) else {
            return Err(errors);
        };

        errors.finish(NewPatient {
            name,
            dob,
            gender,
            hypertension: update.hypertension.unwrap_or(false),
            heart_disease: update.heart_disease.unwrap_or(false),
            smoking_history: update.smoking_history.unwrap_or_default(),
            bmi: update.bmi.flatten(),
            hba1c_level: update.hba1c_level.flatten(),
            blood_glucose_level: update.blood_glucose_level.flatten(),
        })
    }

    /// Validate as an update request: every field is optional
    pub fn into_update(self) -> Result<PatientUpdate, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let name = errors
            .string("name", self.name)
            .map(|n| n.trim().to_string());
        if name.as_deref().is_some_and(str::is_empty) {
            errors.push("name", "name is required");
        }

        let dob = parse_text(
            &mut errors,
            "dob",
            self.dob,
            "dob must be a valid date (YYYY-MM-DD)",
            parse_date,
        );
        let gender = parse_text(&mut errors, "gender", self.gender, "gender invalid", |raw| {
            raw.parse::<Gender>().ok()
        });
        let smoking_history = parse_text(
            &mut errors,
            "smokingHistory",
            self.smoking_history,
            "smokingHistory invalid",
            |raw| raw.parse::<SmokingHistory>().ok(),
        );

        let hypertension = errors.boolean("hypertension", self.hypertension);
        let heart_disease = errors.boolean("heartDisease", self.heart_disease);

        let bmi = errors.nullable_number("bmi", self.bmi, 0.0, 100.0);
        let hba1c_level = errors.nullable_number("HbA1cLevel", self.hba1c_level, 0.0, 20.0);
        let blood_glucose_level =
            errors.nullable_number("bloodGlucoseLevel", self.blood_glucose_level, 0.0, 600.0);

        errors.finish(PatientUpdate {
            name: name.filter(|n| !n.is_empty()),
            dob,
            gender,
            hypertension,
            heart_disease,
            smoking_history,
            bmi,
            hba1c_level,
            blood_glucose_level,
        })
    }
}

const CODE_ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Generate a patient code: `P-` + five random base-36 characters + the last
/// five digits of the creation time in epoch milliseconds
pub fn generate_patient_code(now: DateTime<Utc>) -> String {
    generate_patient_code_with(&mut rand::thread_rng(), now)
}

pub fn generate_patient_code_with<R: Rng + ?Sized>(rng: &mut R, now: DateTime<Utc>) -> String {
    let mut code = String::with_capacity(12);
    code.push_str("P-");
    for _ in 0..5 {
        code.push(CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char);
    }
    let millis = now.timestamp_millis().rem_euclid(100_000);
    code.push_str(&format!("{millis:05}"));
    code
}

/// Quick search query bounds for the patient list
pub fn validate_search_query(q: Option<&str>) -> Result<Option<String>, ValidationErrors> {
    let mut errors = ValidationErrors::new();
    let q = q.map(str::trim);
    if let Some(q) = q {
        if q.is_empty() || q.chars().count() > 50 {
            errors.push("q", "q invalid");
        }
    }
    errors.finish(q.map(str::to_owned))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn input(value: serde_json::Value) -> PatientInput {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn creation_applies_defaults() {
        let patient = input(json!({
            "name": "  Amina Bello ",
            "dob": "1984-09-30",
            "gender": "female"
        }))
        .into_new_patient()
        .unwrap();

        assert_eq!(patient.name, "Amina Bello");
        assert_eq!(patient.dob, NaiveDate::from_ymd_opt(1984, 9, 30).unwrap());
        assert!(!patient.hypertension);
        assert_eq!(patient.smoking_history, SmokingHistory::NoInfo);
        assert_eq!(patient.bmi, None);
    }

    #[test]
    fn creation_reports_every_missing_field_once() {
        let errors = input(json!({"gender": "robot"})).into_new_patient().unwrap_err();
        let fields: Vec<&str> = errors.errors().iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["name", "dob", "gender"]);
    }

    #[test]
    fn out_of_range_metrics_are_rejected() {
        let errors = input(json!({
            "name": "Jon",
            "dob": "1970-01-01",
            "gender": "male",
            "bmi": 140.0,
            "HbA1cLevel": 21,
            "bloodGlucoseLevel": -1
        }))
        .into_new_patient()
        .unwrap_err();

        let fields: Vec<&str> = errors.errors().iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["bmi", "HbA1cLevel", "bloodGlucoseLevel"]);
    }

    #[test]
    fn update_distinguishes_null_from_absent() {
        let update = input(json!({"bmi": null, "smokingHistory": "former"}))
            .into_update()
            .unwrap();
        assert_eq!(update.bmi, Some(None));
        assert_eq!(update.hba1c_level, None);
        assert_eq!(update.smoking_history, Some(SmokingHistory::Former));
    }

    #[test]
    fn wrong_json_types_are_field_errors() {
        let errors = input(json!({
            "name": "A",
            "dob": "1990-01-01",
            "gender": "male",
            "hypertension": "yes",
            "heartDisease": 1,
            "bmi": "abc",
            "smokingHistory": 3
        }))
        .into_new_patient()
        .unwrap_err();

        let pairs: Vec<(&str, &str)> = errors
            .errors()
            .iter()
            .map(|e| (e.field.as_str(), e.message.as_str()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("smokingHistory", "smokingHistory invalid"),
                ("hypertension", "hypertension must be boolean"),
                ("heartDisease", "heartDisease must be boolean"),
                ("bmi", "bmi must be a number"),
            ]
        );
    }

    #[test]
    fn non_string_required_fields_are_reported_once() {
        let errors = input(json!({"name": 5, "dob": 19900101, "gender": null}))
            .into_new_patient()
            .unwrap_err();
        let pairs: Vec<(&str, &str)> = errors
            .errors()
            .iter()
            .map(|e| (e.field.as_str(), e.message.as_str()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("gender", "gender invalid"),
                ("name", "name must be a string"),
                ("dob", "dob must be a valid date (YYYY-MM-DD)"),
            ]
        );
    }

    #[test]
    fn update_apply_overwrites_only_given_fields() {
        let now = Utc::now();
        let mut patient = Patient {
            id: Uuid::new_v4(),
            patient_code: "P-ABCDE12345".to_string(),
            name: "Old".to_string(),
            dob: NaiveDate::from_ymd_opt(1990, 1, 1).unwrap(),
            gender: Gender::Other,
            hypertension: true,
            heart_disease: false,
            smoking_history: SmokingHistory::Never,
            bmi: Some(31.0),
            hba1c_level: Some(6.1),
            blood_glucose_level: None,
            created_by_doctor_id: "doc-1".to_string(),
            created_at: now,
            updated_at: now,
        };

        input(json!({"name": "New", "bmi": null, "bloodGlucoseLevel": 140}))
            .into_update()
            .unwrap()
            .apply(&mut patient);

        assert_eq!(patient.name, "New");
        assert_eq!(patient.bmi, None);
        assert_eq!(patient.hba1c_level, Some(6.1));
        assert_eq!(patient.blood_glucose_level, Some(140.0));
        assert!(patient.hypertension);
    }

    #[test]
    fn patient_serializes_with_wire_names() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let patient = Patient {
            id: Uuid::nil(),
            patient_code: "P-ABCDE12345".to_string(),
            name: "A".to_string(),
            dob: NaiveDate::from_ymd_opt(1990, 1, 1).unwrap(),
            gender: Gender::Female,
            hypertension: false,
            heart_disease: true,
            smoking_history: SmokingHistory::NotCurrent,
            bmi: None,
            hba1c_level: Some(5.5),
            blood_glucose_level: None,
            created_by_doctor_id: "doc-1".to_string(),
            created_at: now,
            updated_at: now,
        };

        let value = serde_json::to_value(&patient).unwrap();
        assert_eq!(value["patientId"], "P-ABCDE12345");
        assert_eq!(value["HbA1cLevel"], 5.5);
        assert_eq!(value["heartDisease"], true);
        assert_eq!(value["smokingHistory"], "not current");
        assert_eq!(value["dob"], "1990-01-01");
        assert_eq!(value["createdByDoctorId"], "doc-1");
    }

    #[test]
    fn patient_codes_have_expected_format() {
        let now = Utc.timestamp_millis_opt(1_767_225_600_123).unwrap();
        let code = generate_patient_code(now);
        assert_eq!(code.len(), 12);
        assert!(code.starts_with("P-"));
        assert!(code[2..7].bytes().all(|b| CODE_ALPHABET.contains(&b)));
        assert_eq!(&code[7..], "00123");
    }

    #[test]
    fn patient_codes_follow_the_rng() {
        use rand::{SeedableRng, rngs::StdRng};

        let now = Utc.timestamp_millis_opt(1_767_225_654_321).unwrap();
        let first = generate_patient_code_with(&mut StdRng::seed_from_u64(7), now);
        let second = generate_patient_code_with(&mut StdRng::seed_from_u64(7), now);
        let other = generate_patient_code_with(&mut StdRng::seed_from_u64(8), now);

        assert_eq!(first, second);
        assert_ne!(first[2..7], other[2..7]);
        assert!(first[2..7].bytes().all(|b| CODE_ALPHABET.contains(&b)));
        assert_eq!(&first[7..], "54321");
    }

    #[test]
    fn search_query_bounds() {
        assert_eq!(validate_search_query(None).unwrap(), None);
        assert_eq!(validate_search_query(Some(" smith ")).unwrap(), Some("smith".to_string()));
        assert!(validate_search_query(Some("   ")).is_err());
        assert!(validate_search_query(Some(&"x".repeat(51))).is_err());
    }
}
