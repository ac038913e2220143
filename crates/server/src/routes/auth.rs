use axum::Json;
use diacare_core::{ApiResponse, Principal};
use serde::Serialize;

use crate::middleware::CurrentUser;

#[derive(Serialize)]
pub struct Me {
    user: Principal,
}

/// GET /api/auth/me
pub async fn me(CurrentUser(user): CurrentUser) -> Json<ApiResponse<Me>> {
    Json(ApiResponse::ok(Me { user }))
}
