//! diacare-server library crate
//!
//! Exposes `build_app`, `config` and `db` for integration tests.
//! The actual binary entrypoint is in `main.rs`.

pub mod config;
pub mod db;
pub mod error;
mod middleware;
pub mod ml;
mod routes;

use axum::{
    Extension, Router, middleware as axum_mw,
    routing::{get, post},
};
use deadpool_postgres::Pool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;
use middleware::TokenAuth;
use middleware::auth::{ANY_ROLE, DOCTOR_ONLY, PATIENT_ONLY};
use ml::{ChatClient, Predictor, PredictorConfig};

/// Build the full application router with all routes and middleware.
///
/// Extracted from `main()` so integration tests can construct the app
/// without binding to a TCP port.
pub fn build_app(pool: Pool, config: &Config) -> Router {
    let auth = TokenAuth::new(config.auth_tokens.clone(), config.auth_cookie.clone());
    let rate_limiter = middleware::create_rate_limiter(config.rate_limit_rps);
    let predictor = Predictor::new(PredictorConfig::from_config(config));
    let chat_client = ChatClient::from_config(config);

    let protected_routes = Router::new()
        .nest(
            "/api/patients",
            routes::patient_routes()
                .route_layer(axum_mw::from_fn_with_state(DOCTOR_ONLY, middleware::require_role)),
        )
        .nest(
            "/api/my",
            routes::my_routes()
                .route_layer(axum_mw::from_fn_with_state(PATIENT_ONLY, middleware::require_role)),
        )
        .route(
            "/api/predictions",
            post(routes::predictions::create)
                .route_layer(axum_mw::from_fn_with_state(ANY_ROLE, middleware::require_role)),
        )
        .route("/api/ai/chat", post(routes::chat::send))
        .route("/api/auth/me", get(routes::auth::me))
        .route_layer(axum_mw::from_fn(middleware::auth_middleware))
        .route_layer(Extension(auth))
        .route_layer(Extension(predictor))
        .route_layer(Extension(chat_client))
        .route_layer(axum_mw::from_fn(middleware::rate_limit_middleware))
        .route_layer(Extension(rate_limiter));

    // build_recorder() + set_global_recorder() so a second build_app (tests)
    // keeps working instead of panicking on install
    let recorder = metrics_exporter_prometheus::PrometheusBuilder::new().build_recorder();
    let prometheus_handle = recorder.handle();
    let _ = metrics::set_global_recorder(recorder);

    let public_routes = Router::new()
        .route("/api/health", get(routes::health::check))
        .route("/metrics", get(routes::metrics::get))
        .layer(Extension(prometheus_handle));

    let cors = if config.cors_origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = config
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    };

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .fallback(routes::not_found)
        .with_state(pool)
        .layer(axum_mw::from_fn(middleware::audit_middleware))
        .layer(axum_mw::from_fn(middleware::request_id_middleware))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(axum_mw::from_fn(middleware::metrics_middleware))
}
