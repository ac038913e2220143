//! Audit logging middleware for mutations

use axum::{body::Body, extract::Request, http::Method, middleware::Next, response::Response};
use diacare_core::Principal;

use super::request_id::RequestId;

/// Log mutations (POST, PUT, DELETE) together with who made them
pub async fn audit_middleware(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().path().to_string();
    let request_id = request
        .extensions()
        .get::<RequestId>()
        .map(|r| r.0.clone())
        .unwrap_or_else(|| "unknown".to_string());

    let response = next.run(request).await;

    if matches!(method, Method::POST | Method::PUT | Method::DELETE) {
        let status = response.status().as_u16();
        // Copied onto the response by the auth middleware
        let user = response
            .extensions()
            .get::<Principal>()
            .map(|p| format!("{}:{}", p.user_type, p.id))
            .unwrap_or_else(|| "anonymous".to_string());

        tracing::info!(
            target: "audit",
            request_id = %request_id,
            user = %user,
            method = %method,
            path = %uri,
            status = %status,
            "Mutation request"
        );
    }

    response
}
