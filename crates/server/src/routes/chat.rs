//! AI chat relay endpoint

use axum::{Extension, Json};
use serde::Serialize;

use super::AppJson;
use crate::error::AppError;
use crate::middleware::CurrentUser;
use crate::ml::{ChatClient, ChatRequest};

#[derive(Serialize)]
pub struct ChatReply {
    success: bool,
    reply: String,
}

/// POST /api/ai/chat - Relay one chat turn to the ML service
pub async fn send(
    CurrentUser(user): CurrentUser,
    Extension(client): Extension<ChatClient>,
    AppJson(request): AppJson<ChatRequest>,
) -> Result<Json<ChatReply>, AppError> {
    let (message, context) = request.required_fields().ok_or_else(|| {
        AppError::BadRequest("Missing required fields: userMessage or predictionContext".to_string())
    })?;

    tracing::debug!(user_id = %user.id, "Relaying chat message");

    let reply = client.chat(message, context, request.history()).await?;
    Ok(Json(ChatReply {
        success: true,
        reply,
    }))
}
