//! Read-only views for a signed-in patient

use axum::{Json, extract::State};
use deadpool_postgres::Pool;
use diacare_core::{ApiResponse, Patient, PredictionContext, Principal, Visit};
use uuid::Uuid;

use crate::db::{PatientRepository, VisitRepository};
use crate::error::AppError;
use crate::middleware::CurrentUser;

fn linked_patient(user: &Principal) -> Result<Uuid, AppError> {
    user.linked_patient_id
        .ok_or_else(|| AppError::NotFound("Profile not found".to_string()))
}

/// GET /api/my/profile
pub async fn profile(
    State(pool): State<Pool>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<ApiResponse<Patient>>, AppError> {
    let patient_id = linked_patient(&user)?;
    let patient = PatientRepository::new(pool)
        .get_by_id(patient_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Profile not found".to_string()))?;

    Ok(Json(ApiResponse::ok(patient)))
}

/// GET /api/my/visits
pub async fn visits(
    State(pool): State<Pool>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<ApiResponse<Vec<Visit>>>, AppError> {
    let patient_id = linked_patient(&user)?;
    let visits = VisitRepository::new(pool)
        .list_for_patient_self(patient_id)
        .await?;

    Ok(Json(ApiResponse::ok(visits)))
}

/// GET /api/my/latest-prediction - Context for the chat page
pub async fn latest_prediction(
    State(pool): State<Pool>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<ApiResponse<PredictionContext>>, AppError> {
    let no_prediction =
        || AppError::NotFound("No prediction found. Please make a prediction first.".to_string());

    let patient_id = user.linked_patient_id.ok_or_else(no_prediction)?;
    let context = VisitRepository::new(pool)
        .latest_with_prediction(patient_id)
        .await?
        .and_then(|visit| visit.prediction_context())
        .ok_or_else(no_prediction)?;

    Ok(Json(ApiResponse::ok(context)))
}
