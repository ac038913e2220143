//! Prediction orchestration against the external risk model

use std::time::Duration;

use chrono::Utc;
use diacare_core::{PredictionError, PredictionResult, normalize};
use serde_json::Value as JsonValue;

use super::retry::call_with_retries;
use crate::config::Config;

/// Everything the predictor needs, fixed at construction
#[derive(Debug, Clone)]
pub struct PredictorConfig {
    pub predict_url: Option<String>,
    /// Per-attempt deadline
    pub timeout: Duration,
    pub max_retries: u32,
    pub model_version: String,
    /// Attach the untouched upstream body to results
    pub include_raw: bool,
}

impl PredictorConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            predict_url: config.ml.predict_url.clone(),
            timeout: config.ml.timeout,
            max_retries: config.ml.retry_count,
            model_version: config.ml.model_version.clone(),
            include_raw: !config.production,
        }
    }
}

/// Client for the risk prediction endpoint
#[derive(Clone)]
pub struct Predictor {
    http: reqwest::Client,
    config: PredictorConfig,
}

impl Predictor {
    pub fn new(config: PredictorConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    /// Send `payload` to the ML service and normalize its answer.
    ///
    /// Nothing is persisted here; storing the result on a visit is up to the
    /// caller.
    pub async fn predict(&self, payload: &JsonValue) -> Result<PredictionResult, PredictionError> {
        let url = self
            .config
            .predict_url
            .as_deref()
            .ok_or(PredictionError::NotConfigured)?;

        let raw = call_with_retries(|| self.post_once(url, payload), self.config.max_retries)
            .await
            .inspect_err(|err| {
                tracing::error!(error = %err, transient = err.is_transient(), "Prediction failed after retries")
            })?;

        let assessment = normalize(&raw);
        metrics::counter!("ml_predictions_total", "label" => assessment.risk_label.clone())
            .increment(1);
        tracing::info!(
            risk_label = %assessment.risk_label,
            risk_score = ?assessment.risk_score,
            model_version = %self.config.model_version,
            "Prediction completed"
        );

        let explanation = raw
            .get("explanation")
            .and_then(JsonValue::as_str)
            .map(str::to_owned);

        Ok(PredictionResult {
            assessment,
            explanation,
            model_version: self.config.model_version.clone(),
            predicted_at: Utc::now(),
            raw: self.config.include_raw.then_some(raw),
        })
    }

    /// One POST to the prediction endpoint. Non-2xx answers are failures.
    async fn post_once(&self, url: &str, payload: &JsonValue) -> Result<JsonValue, PredictionError> {
        metrics::counter!("ml_predict_attempts_total").increment(1);

        let response = self
            .http
            .post(url)
            .timeout(self.config.timeout)
            .json(payload)
            .send()
            .await
            .map_err(classify)?;

        let status = response.status();
        if !status.is_success() {
            return Err(PredictionError::UpstreamStatus {
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await.map_err(classify)?;

        // Unparseable bodies are kept as text and normalize to "Unknown"
        Ok(serde_json::from_slice(&body).unwrap_or_else(|err| {
            tracing::warn!(error = %err, "ML service returned a non-JSON body");
            JsonValue::String(String::from_utf8_lossy(&body).into_owned())
        }))
    }
}

fn classify(err: reqwest::Error) -> PredictionError {
    if err.is_timeout() {
        PredictionError::Timeout
    } else {
        PredictionError::Transport(err.to_string())
    }
}
