//! Relay for the ML service's AI chat endpoint

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;

use crate::config::Config;

/// Chat request as sent by the patient app
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub user_message: Option<String>,
    pub prediction_context: Option<JsonValue>,
    pub chat_history: Option<Vec<JsonValue>>,
}

/// Body of `POST {ML_SERVICE_URL}/ai/chat`
#[derive(Debug, Serialize)]
struct UpstreamChatRequest<'a> {
    user_message: &'a str,
    prediction_context: &'a JsonValue,
    chat_history: &'a [JsonValue],
}

#[derive(Debug, Error)]
pub enum ChatError {
    /// Connection refused
    #[error("AI chat service offline: {0}")]
    Offline(String),

    /// Host not resolvable or otherwise unreachable
    #[error("AI chat service unreachable: {0}")]
    Unreachable(String),

    #[error("{0}")]
    Unavailable(String),

    #[error("AI service timeout")]
    Timeout,

    #[error("Invalid response from AI service")]
    InvalidResponse,

    #[error("{0}")]
    Upstream(String),
}

#[derive(Clone)]
pub struct ChatClient {
    http: reqwest::Client,
    endpoint: String,
    timeout: Duration,
}

impl ChatClient {
    pub fn new(service_url: &str, timeout: Duration) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: format!("{}/ai/chat", service_url.trim_end_matches('/')),
            timeout,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.ml.service_url, config.ml.chat_timeout)
    }

    /// Forward one chat turn and return the assistant's reply. Single attempt.
    pub async fn chat(
        &self,
        user_message: &str,
        prediction_context: &JsonValue,
        chat_history: &[JsonValue],
    ) -> Result<String, ChatError> {
        tracing::info!(
            endpoint = %self.endpoint,
            history_len = chat_history.len(),
            risk_percent = ?prediction_context.get("risk_percent"),
            "AI chat request"
        );

        let response = self
            .http
            .post(&self.endpoint)
            .timeout(self.timeout)
            .json(&UpstreamChatRequest {
                user_message,
                prediction_context,
                chat_history,
            })
            .send()
            .await
            .map_err(classify)?;

        let status = response.status();
        let body: Option<JsonValue> = response.json().await.ok();

        if !status.is_success() {
            let detail = body
                .as_ref()
                .and_then(|b| b.get("detail"))
                .and_then(JsonValue::as_str)
                .map(str::to_owned);
            tracing::warn!(status = status.as_u16(), detail = ?detail, "AI chat upstream error");

            return Err(if status == reqwest::StatusCode::SERVICE_UNAVAILABLE {
                ChatError::Unavailable(detail.unwrap_or_else(|| "AI service unavailable".to_string()))
            } else {
                ChatError::Upstream(
                    detail.unwrap_or_else(|| format!("AI service error ({})", status.as_u16())),
                )
            });
        }

        body.as_ref()
            .and_then(|b| b.get("reply"))
            .and_then(JsonValue::as_str)
            .filter(|reply| !reply.is_empty())
            .map(str::to_owned)
            .ok_or_else(|| {
                tracing::error!(body = ?body, "AI chat response missing reply");
                ChatError::InvalidResponse
            })
    }
}

fn classify(err: reqwest::Error) -> ChatError {
    if err.is_timeout() {
        ChatError::Timeout
    } else if err.is_connect() && connection_refused(&err) {
        ChatError::Offline(err.to_string())
    } else if err.is_connect() {
        ChatError::Unreachable(err.to_string())
    } else {
        ChatError::Upstream(err.to_string())
    }
}

/// Whether any error in the source chain is an io `ConnectionRefused`
fn connection_refused(err: &(dyn std::error::Error + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(err) = current {
        if let Some(io) = err.downcast_ref::<std::io::Error>() {
            if io.kind() == std::io::ErrorKind::ConnectionRefused {
                return true;
            }
        }
        current = err.source();
    }
    false
}

impl ChatRequest {
    /// The message and context, when both are present and non-empty
    pub fn required_fields(&self) -> Option<(&str, &JsonValue)> {
        let message = self.user_message.as_deref().filter(|m| !m.is_empty())?;
        let context = self.prediction_context.as_ref().filter(|c| !c.is_null())?;
        Some((message, context))
    }

    pub fn history(&self) -> &[JsonValue] {
        self.chat_history.as_deref().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn endpoint_joins_without_double_slash() {
        let client = ChatClient::new("http://ml.local:8000/", Duration::from_secs(1));
        assert_eq!(client.endpoint, "http://ml.local:8000/ai/chat");
    }

    #[test]
    fn required_fields() {
        let request: ChatRequest = serde_json::from_value(json!({
            "userMessage": "What does my score mean?",
            "predictionContext": {"risk_percent": 0.62}
        }))
        .unwrap();
        let (message, context) = request.required_fields().unwrap();
        assert_eq!(message, "What does my score mean?");
        assert_eq!(context["risk_percent"], 0.62);
        assert!(request.history().is_empty());

        let missing: ChatRequest =
            serde_json::from_value(json!({"userMessage": "", "predictionContext": {}})).unwrap();
        assert!(missing.required_fields().is_none());

        let null_context: ChatRequest =
            serde_json::from_value(json!({"userMessage": "hi", "predictionContext": null})).unwrap();
        assert!(null_context.required_fields().is_none());
    }

    #[derive(Debug, Error)]
    #[error("connect failed")]
    struct Wrapped(#[source] std::io::Error);

    #[test]
    fn refused_is_found_anywhere_in_the_source_chain() {
        let refused = Wrapped(std::io::Error::from(std::io::ErrorKind::ConnectionRefused));
        assert!(connection_refused(&refused));

        let dns = Wrapped(std::io::Error::other("failed to lookup address information"));
        assert!(!connection_refused(&dns));
    }

    #[test]
    fn upstream_body_uses_snake_case() {
        let context = json!({"prediction": 1});
        let history = vec![json!({"role": "user", "content": "hello"})];
        let body = serde_json::to_value(UpstreamChatRequest {
            user_message: "hi",
            prediction_context: &context,
            chat_history: &history,
        })
        .unwrap();
        assert_eq!(
            body,
            json!({
                "user_message": "hi",
                "prediction_context": {"prediction": 1},
                "chat_history": [{"role": "user", "content": "hello"}]
            })
        );
    }
}
