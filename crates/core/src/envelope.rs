use serde::{Deserialize, Serialize};

/// A single field-level validation failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &str, message: &str) -> Self {
        Self {
            field: field.to_string(),
            message: message.to_string(),
        }
    }
}

/// JSON envelope shared by every API response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<FieldError>,
}

impl<T> ApiResponse<T> {
    /// Successful response carrying `data`
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            errors: Vec::new(),
        }
    }
}

impl ApiResponse<()> {
    /// Failed response with a user-facing message
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message.into()),
            errors: Vec::new(),
        }
    }

    /// Failed response listing every invalid field
    pub fn invalid(errors: Vec<FieldError>) -> Self {
        Self {
            errors,
            ..Self::failure("Validation failed")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ok_envelope() {
        let value = serde_json::to_value(ApiResponse::ok(json!({"ok": true}))).unwrap();
        assert_eq!(value, json!({"success": true, "data": {"ok": true}}));
    }

    #[test]
    fn validation_envelope() {
        let value = serde_json::to_value(ApiResponse::invalid(vec![FieldError::new(
            "name",
            "name is required",
        )]))
        .unwrap();
        assert_eq!(
            value,
            json!({
                "success": false,
                "message": "Validation failed",
                "errors": [{"field": "name", "message": "name is required"}]
            })
        );
    }
}
