//! Health check endpoint

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use deadpool_postgres::Pool;
use diacare_core::ApiResponse;
use serde::Serialize;

#[derive(Serialize)]
pub struct HealthStatus {
    ok: bool,
    database: &'static str,
}

/// GET /api/health - Check database connectivity
pub async fn check(State(pool): State<Pool>) -> impl IntoResponse {
    let database = match pool.get().await {
        Ok(client) => client
            .query_one("SELECT 1", &[])
            .await
            .map(|_| ())
            .map_err(|e| format!("Database query failed: {}", e)),
        Err(e) => Err(format!("Database connection failed: {}", e)),
    };

    match database {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse::ok(HealthStatus {
                ok: true,
                database: "up",
            })),
        ),
        Err(reason) => {
            tracing::error!(error = %reason, "Health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ApiResponse {
                    success: false,
                    data: Some(HealthStatus {
                        ok: false,
                        database: "down",
                    }),
                    message: Some("Database unavailable".to_string()),
                    errors: Vec::new(),
                }),
            )
        }
    }
}
