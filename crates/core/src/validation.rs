//! Field validation helpers shared by the patient and visit inputs

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::Value as JsonValue;
use std::fmt;

use crate::envelope::FieldError;

/// Upper bound for free-text visit fields
pub const MAX_NOTE_LENGTH: usize = 2000;

/// Every field-level problem found in one input
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors(Vec<FieldError>);

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields: Vec<&str> = self.0.iter().map(|e| e.field.as_str()).collect();
        write!(f, "invalid fields: {}", fields.join(", "))
    }
}

impl std::error::Error for ValidationErrors {}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, field: &str, message: &str) {
        self.0.push(FieldError::new(field, message));
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn errors(&self) -> &[FieldError] {
        &self.0
    }

    pub fn into_errors(self) -> Vec<FieldError> {
        self.0
    }

    /// `Ok(value)` when nothing was recorded
    pub fn finish<T>(self, value: T) -> Result<T, Self> {
        if self.is_empty() { Ok(value) } else { Err(self) }
    }

    /// Record `message` when `value` lies outside `[min, max]`
    pub fn check_range(&mut self, field: &str, value: Option<f64>, min: f64, max: f64, message: &str) {
        if let Some(v) = value {
            if !(min..=max).contains(&v) {
                self.push(field, message);
            }
        }
    }
}

impl ValidationErrors {
    /// A string field. `null` counts as absent; other types are recorded.
    pub fn string(&mut self, field: &str, value: Option<JsonValue>) -> Option<String> {
        match value? {
            JsonValue::String(s) => Some(s),
            JsonValue::Null => None,
            _ => {
                self.push(field, &format!("{field} must be a string"));
                None
            }
        }
    }

    pub fn boolean(&mut self, field: &str, value: Option<JsonValue>) -> Option<bool> {
        match value? {
            JsonValue::Bool(b) => Some(b),
            JsonValue::Null => None,
            _ => {
                self.push(field, &format!("{field} must be boolean"));
                None
            }
        }
    }

    /// A clearable number: absent stays `None`, `null` becomes `Some(None)`
    pub fn nullable_number(
        &mut self,
        field: &str,
        value: Option<Option<JsonValue>>,
        min: f64,
        max: f64,
    ) -> Option<Option<f64>> {
        let Some(value) = value? else {
            return Some(None);
        };
        let Some(number) = value.as_f64() else {
            self.push(field, &format!("{field} must be a number"));
            return None;
        };
        if !(min..=max).contains(&number) {
            self.push(field, &format!("{field} out of range"));
            return None;
        }
        Some(Some(number))
    }
}

/// Parse `YYYY-MM-DD` or a full RFC 3339 timestamp into a calendar date
pub fn parse_date(input: &str) -> Option<NaiveDate> {
    let input = input.trim();
    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(input).ok().map(|dt| dt.date_naive()))
}

/// Parse an RFC 3339 timestamp, or a bare date as midnight UTC
pub fn parse_datetime(input: &str) -> Option<DateTime<Utc>> {
    let input = input.trim();
    DateTime::parse_from_rfc3339(input)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|| {
            NaiveDate::parse_from_str(input, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|naive| naive.and_utc())
        })
}

/// Distinguishes an absent field (`None`) from an explicit `null` (`Some(None)`).
///
/// Use with `#[serde(default, deserialize_with = "nullable")]`.
pub fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
