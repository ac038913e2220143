//! Server configuration

use std::collections::HashMap;
use std::time::Duration;

use diacare_core::{Principal, UserType};
use uuid::Uuid;

/// Server configuration resolved once at startup
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_address: String,
    /// `APP_ENV=production`: hides upstream payloads from API responses
    pub production: bool,
    pub cors_origins: Vec<String>,
    pub rate_limit_rps: u32,
    /// Bearer token -> principal
    pub auth_tokens: HashMap<String, Principal>,
    /// Cookie to read the token from, in addition to the Authorization header
    pub auth_cookie: Option<String>,
    pub ml: MlConfig,
}

/// Settings for the external ML service
#[derive(Debug, Clone)]
pub struct MlConfig {
    pub predict_url: Option<String>,
    pub timeout: Duration,
    pub retry_count: u32,
    pub model_version: String,
    /// Base URL of the service hosting `/ai/chat`
    pub service_url: String,
    pub chat_timeout: Duration,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Self {
            database_url: var("DATABASE_URL")
                .unwrap_or_else(|| "host=localhost user=postgres dbname=diacare".into()),
            bind_address: var("BIND_ADDRESS").unwrap_or_else(|| "0.0.0.0:5000".into()),
            production: var("APP_ENV").is_some_and(|env| env.eq_ignore_ascii_case("production")),
            cors_origins: var("CORS_ORIGINS")
                .map(|origins| {
                    origins
                        .split(',')
                        .map(|o| o.trim().to_string())
                        .filter(|o| !o.is_empty())
                        .collect()
                })
                .unwrap_or_else(|| vec!["*".to_string()]),
            rate_limit_rps: parse_or("RATE_LIMIT_RPS", var("RATE_LIMIT_RPS"), 100),
            auth_tokens: var("AUTH_TOKENS")
                .map(|table| parse_token_table(&table))
                .unwrap_or_default(),
            auth_cookie: var("AUTH_COOKIE"),
            ml: MlConfig {
                predict_url: var("ML_PREDICT_URL"),
                timeout: Duration::from_millis(parse_or("ML_TIMEOUT_MS", var("ML_TIMEOUT_MS"), 8000)),
                retry_count: parse_or("ML_RETRY_COUNT", var("ML_RETRY_COUNT"), 2),
                model_version: var("MODEL_VERSION").unwrap_or_else(|| "v1".into()),
                service_url: var("ML_SERVICE_URL").unwrap_or_else(|| "http://localhost:8000".into()),
                chat_timeout: Duration::from_millis(parse_or(
                    "AI_CHAT_TIMEOUT_MS",
                    var("AI_CHAT_TIMEOUT_MS"),
                    30_000,
                )),
            },
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

fn parse_or<T: std::str::FromStr>(key: &str, raw: Option<String>, default: T) -> T {
    match raw {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, "Ignoring malformed numeric setting");
            default
        }),
        None => default,
    }
}

/// Parse `token=doctor:<id>;token=patient:<id>:<patient uuid>` entries.
///
/// Malformed entries are skipped with a warning.
pub fn parse_token_table(table: &str) -> HashMap<String, Principal> {
    table
        .split(';')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .filter_map(|entry| match parse_token_entry(entry) {
            Some(grant) => Some(grant),
            None => {
                tracing::warn!(entry = %redact(entry), "Skipping malformed AUTH_TOKENS entry");
                None
            }
        })
        .collect()
}

fn parse_token_entry(entry: &str) -> Option<(String, Principal)> {
    let (token, grant) = entry.split_once('=')?;
    let token = token.trim();
    if token.is_empty() {
        return None;
    }

    let mut parts = grant.trim().split(':');
    let user_type: UserType = parts.next()?.parse().ok()?;
    let id = parts.next().filter(|id| !id.is_empty())?;

    let principal = match user_type {
        UserType::Doctor => Principal::doctor(id),
        UserType::Patient => {
            let patient_id = Uuid::parse_str(parts.next()?).ok()?;
            Principal::patient(id, patient_id)
        }
    };

    if parts.next().is_some() {
        return None;
    }

    Some((token.to_string(), principal))
}

/// Keep tokens out of the logs
fn redact(entry: &str) -> String {
    match entry.split_once('=') {
        Some((_, grant)) => format!("***={grant}"),
        None => "***".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(vars: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.bind_address, "0.0.0.0:5000");
        assert!(!config.production);
        assert_eq!(config.cors_origins, vec!["*"]);
        assert!(config.ml.predict_url.is_none());
        assert_eq!(config.ml.timeout, Duration::from_millis(8000));
        assert_eq!(config.ml.retry_count, 2);
        assert_eq!(config.ml.model_version, "v1");
        assert_eq!(config.ml.chat_timeout, Duration::from_secs(30));
        assert!(config.auth_tokens.is_empty());
    }

    #[test]
    fn overrides_and_malformed_numbers() {
        let config = config(&[
            ("APP_ENV", "Production"),
            ("ML_PREDICT_URL", "http://ml:8000/predict"),
            ("ML_TIMEOUT_MS", "250"),
            ("ML_RETRY_COUNT", "many"),
            ("MODEL_VERSION", "xgb-2024.3"),
            ("CORS_ORIGINS", "http://a.test, http://b.test,"),
        ]);
        assert!(config.production);
        assert_eq!(config.ml.predict_url.as_deref(), Some("http://ml:8000/predict"));
        assert_eq!(config.ml.timeout, Duration::from_millis(250));
        assert_eq!(config.ml.retry_count, 2);
        assert_eq!(config.ml.model_version, "xgb-2024.3");
        assert_eq!(config.cors_origins, vec!["http://a.test", "http://b.test"]);
    }

    #[test]
    fn blank_predict_url_counts_as_unset() {
        let config = config(&[("ML_PREDICT_URL", "  ")]);
        assert!(config.ml.predict_url.is_none());
    }

    #[test]
    fn token_table() {
        let patient_id = "0b6c3f4e-58c5-4c5b-9d43-2a4f7e1d9b10";
        let tokens = parse_token_table(&format!(
            "doc-secret=doctor:doc-1; pat-secret=patient:user-9:{patient_id};bad=nurse:x;=doctor:y;short=patient:user-3"
        ));

        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens["doc-secret"], Principal::doctor("doc-1"));
        assert_eq!(
            tokens["pat-secret"],
            Principal::patient("user-9", Uuid::parse_str(patient_id).unwrap())
        );
    }
}
