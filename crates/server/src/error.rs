//! Application error handling

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use diacare_core::{ApiResponse, PredictionError, ValidationErrors};
use thiserror::Error;

use crate::ml::ChatError;

/// Application error type
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error("Validation failed")]
    Validation(ValidationErrors),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden")]
    Forbidden,

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadGateway(String),

    #[error("{0}")]
    GatewayTimeout(String),

    #[error("{0}")]
    ServiceUnavailable(String),

    /// Upstream AI failure whose message is safe to show
    #[error("{0}")]
    Upstream(String),

    /// Logged, never shown to the client
    #[error("{0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::BadRequest(_) | AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadGateway(_) => StatusCode::BAD_GATEWAY,
            AppError::GatewayTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Upstream(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = match self {
            AppError::Validation(errors) => ApiResponse::invalid(errors.into_errors()),
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "Internal error");
                ApiResponse::failure("Internal server error")
            }
            other => ApiResponse::failure(other.to_string()),
        };

        (status, Json(body)).into_response()
    }
}

impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> Self {
        AppError::Validation(errors)
    }
}

impl From<PredictionError> for AppError {
    fn from(err: PredictionError) -> Self {
        match err {
            PredictionError::NotConfigured => AppError::Internal(err.to_string()),
            PredictionError::Transport(detail) => {
                tracing::warn!(error = %detail, "ML service unreachable");
                AppError::BadGateway("ML service unreachable".to_string())
            }
            PredictionError::Timeout => AppError::GatewayTimeout(err.to_string()),
            PredictionError::UpstreamStatus { .. } => AppError::BadGateway(err.to_string()),
        }
    }
}

impl From<ChatError> for AppError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::Offline(detail) => {
                tracing::warn!(error = %detail, "AI chat service offline");
                AppError::ServiceUnavailable(
                    "ML service is offline. Make sure the ML service is running".to_string(),
                )
            }
            ChatError::Unreachable(detail) => {
                tracing::warn!(error = %detail, "AI chat service unreachable");
                AppError::ServiceUnavailable(
                    "Cannot reach ML service. Check if it's running".to_string(),
                )
            }
            ChatError::Unavailable(msg) => AppError::ServiceUnavailable(msg),
            ChatError::Timeout => AppError::GatewayTimeout("AI service timeout".to_string()),
            ChatError::InvalidResponse => {
                AppError::Upstream("Invalid response from AI service".to_string())
            }
            ChatError::Upstream(msg) => AppError::Upstream(msg),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        tracing::debug!(error = %rejection.body_text(), "Rejected request body");
        let message = match rejection {
            JsonRejection::JsonSyntaxError(_) => "Malformed JSON body",
            JsonRejection::MissingJsonContentType(_) => "Expected Content-Type: application/json",
            _ => "Invalid request body",
        };
        AppError::BadRequest(message.to_string())
    }
}

impl From<deadpool_postgres::PoolError> for AppError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        AppError::Internal(format!("Database pool error: {}", err))
    }
}

impl From<tokio_postgres::Error> for AppError {
    fn from(err: tokio_postgres::Error) -> Self {
        AppError::Internal(format!("Database error: {}", err))
    }
}
