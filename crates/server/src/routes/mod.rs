pub mod auth;
pub mod chat;
pub mod health;
pub mod metrics;
pub mod my;
mod patients;
pub mod predictions;

use axum::{
    Json, Router,
    extract::FromRequest,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use deadpool_postgres::Pool;
use diacare_core::ApiResponse;
use uuid::Uuid;

use crate::error::AppError;

/// JSON body extractor whose rejections use the API envelope
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct AppJson<T>(pub T);

/// Doctor-facing patient and visit routes, nested under `/api/patients`
pub fn patient_routes() -> Router<Pool> {
    Router::new()
        .route("/", get(patients::list).post(patients::create))
        .route(
            "/{id}",
            get(patients::read)
                .put(patients::update)
                .delete(patients::delete),
        )
        .route(
            "/{id}/visits",
            get(patients::list_visits).post(patients::create_visit),
        )
}

/// Patient self-service routes, nested under `/api/my`
pub fn my_routes() -> Router<Pool> {
    Router::new()
        .route("/profile", get(my::profile))
        .route("/visits", get(my::visits))
        .route("/latest-prediction", get(my::latest_prediction))
}

/// Fallback for unmatched routes
pub async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(ApiResponse::failure("Not found")))
}

fn parse_patient_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| AppError::BadRequest("Invalid patient id".to_string()))
}
