//! Risk prediction endpoint

use axum::{Extension, Json};
use diacare_core::{ApiResponse, PredictionResult};
use serde_json::Value as JsonValue;

use super::AppJson;
use crate::error::AppError;
use crate::middleware::CurrentUser;
use crate::ml::Predictor;

/// POST /api/predictions - Forward the payload to the ML service.
///
/// The payload is passed through untouched; the result is not stored.
pub async fn create(
    CurrentUser(user): CurrentUser,
    Extension(predictor): Extension<Predictor>,
    AppJson(payload): AppJson<JsonValue>,
) -> Result<Json<ApiResponse<PredictionResult>>, AppError> {
    if !payload.is_object() {
        return Err(AppError::BadRequest("payload must be object".to_string()));
    }

    tracing::info!(user_id = %user.id, user_type = %user.user_type, "Prediction requested");

    let result = predictor.predict(&payload).await?;
    Ok(Json(ApiResponse::ok(result)))
}
