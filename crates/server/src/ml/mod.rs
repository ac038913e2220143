//! Clients for the external ML service: risk prediction and AI chat

pub mod chat;
pub mod predictor;
pub mod retry;

pub use chat::{ChatClient, ChatError, ChatRequest};
pub use predictor::{Predictor, PredictorConfig};
pub use retry::call_with_retries;
