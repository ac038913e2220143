//! Patient and visit HTTP handlers for doctors

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use deadpool_postgres::Pool;
use diacare_core::patient::validate_search_query;
use diacare_core::{ApiResponse, Patient, PatientInput, Visit, VisitInput};
use serde::{Deserialize, Serialize};

use super::{AppJson, parse_patient_id};
use crate::db::{PatientRepository, VisitRepository};
use crate::error::AppError;
use crate::middleware::CurrentUser;

#[derive(Debug, Deserialize, Default)]
pub struct ListParams {
    pub q: Option<String>,
}

#[derive(Serialize)]
pub struct Created {
    patient: Patient,
}

#[derive(Serialize)]
pub struct Deleted {
    ok: bool,
}

fn patient_not_found() -> AppError {
    AppError::NotFound("Patient not found".to_string())
}

/// POST /api/patients
pub async fn create(
    State(pool): State<Pool>,
    CurrentUser(doctor): CurrentUser,
    AppJson(input): AppJson<PatientInput>,
) -> Result<(StatusCode, Json<ApiResponse<Created>>), AppError> {
    let new_patient = input.into_new_patient()?;
    let patient = PatientRepository::new(pool).create(&doctor.id, new_patient).await?;

    tracing::info!(doctor_id = %doctor.id, patient_id = %patient.id, code = %patient.patient_code, "Patient created");

    Ok((StatusCode::CREATED, Json(ApiResponse::ok(Created { patient }))))
}

/// GET /api/patients?q= - Newest first, optional name/code filter
pub async fn list(
    State(pool): State<Pool>,
    CurrentUser(doctor): CurrentUser,
    Query(params): Query<ListParams>,
) -> Result<Json<ApiResponse<Vec<Patient>>>, AppError> {
    let q = validate_search_query(params.q.as_deref())?;
    let patients = PatientRepository::new(pool).list(&doctor.id, q.as_deref()).await?;
    Ok(Json(ApiResponse::ok(patients)))
}

/// GET /api/patients/{id}
pub async fn read(
    State(pool): State<Pool>,
    CurrentUser(doctor): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Patient>>, AppError> {
    let id = parse_patient_id(&id)?;
    let patient = PatientRepository::new(pool)
        .get(&doctor.id, id)
        .await?
        .ok_or_else(patient_not_found)?;
    Ok(Json(ApiResponse::ok(patient)))
}

/// PUT /api/patients/{id} - Partial update; explicit null clears a metric
pub async fn update(
    State(pool): State<Pool>,
    CurrentUser(doctor): CurrentUser,
    Path(id): Path<String>,
    AppJson(input): AppJson<PatientInput>,
) -> Result<Json<ApiResponse<Patient>>, AppError> {
    let id = parse_patient_id(&id)?;
    let update = input.into_update()?;
    let patient = PatientRepository::new(pool)
        .update(&doctor.id, id, update)
        .await?
        .ok_or_else(patient_not_found)?;
    Ok(Json(ApiResponse::ok(patient)))
}

/// DELETE /api/patients/{id}
pub async fn delete(
    State(pool): State<Pool>,
    CurrentUser(doctor): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Deleted>>, AppError> {
    let id = parse_patient_id(&id)?;
    if !PatientRepository::new(pool).delete(&doctor.id, id).await? {
        return Err(patient_not_found());
    }

    tracing::info!(doctor_id = %doctor.id, patient_id = %id, "Patient deleted");
    Ok(Json(ApiResponse::ok(Deleted { ok: true })))
}

/// POST /api/patients/{id}/visits
pub async fn create_visit(
    State(pool): State<Pool>,
    CurrentUser(doctor): CurrentUser,
    Path(id): Path<String>,
    AppJson(input): AppJson<VisitInput>,
) -> Result<(StatusCode, Json<ApiResponse<Visit>>), AppError> {
    let patient_id = parse_patient_id(&id)?;
    let new_visit = input.into_new_visit()?;

    PatientRepository::new(pool.clone())
        .get(&doctor.id, patient_id)
        .await?
        .ok_or_else(patient_not_found)?;

    let visit = VisitRepository::new(pool)
        .create(&doctor.id, patient_id, new_visit)
        .await?;

    Ok((StatusCode::CREATED, Json(ApiResponse::ok(visit))))
}

/// GET /api/patients/{id}/visits
pub async fn list_visits(
    State(pool): State<Pool>,
    CurrentUser(doctor): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Vec<Visit>>>, AppError> {
    let patient_id = parse_patient_id(&id)?;

    PatientRepository::new(pool.clone())
        .get(&doctor.id, patient_id)
        .await?
        .ok_or_else(patient_not_found)?;

    let visits = VisitRepository::new(pool)
        .list_for_patient(&doctor.id, patient_id)
        .await?;
    Ok(Json(ApiResponse::ok(visits)))
}
