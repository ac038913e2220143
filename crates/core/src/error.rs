use thiserror::Error;

/// Failures of a prediction request against the ML service
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PredictionError {
    /// No prediction endpoint configured. Never retried.
    #[error("ML_PREDICT_URL not configured")]
    NotConfigured,

    #[error("ML service unreachable: {0}")]
    Transport(String),

    #[error("ML service timeout")]
    Timeout,

    #[error("ML service error ({status})")]
    UpstreamStatus { status: u16 },
}

impl PredictionError {
    /// Whether another attempt could succeed
    pub fn is_transient(&self) -> bool {
        !matches!(self, PredictionError::NotConfigured)
    }
}
