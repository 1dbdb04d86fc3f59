//! Retrying analysis client.
//!
//! Every call resolves to an [`AnalysisOutcome`]: either the service's
//! response or a deterministic [`FallbackResponse`] once all attempts are
//! spent. There is no error path, so a single flaky step cannot abort a batch.

use std::sync::Arc;
use std::time::Duration;

use dealflow_core::BackendStatus;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::time::{sleep, timeout};
use tracing::{error, info, warn};

use crate::config::ClientConfig;
use crate::transport::{AnalysisTransport, Endpoint, HttpError};

/// Error texts that indicate the backend's API key was rejected.
const API_KEY_SIGNATURES: &[&str] = &["api key not valid", "invalid api key", "api_key_invalid"];

/// Body returned by the analysis service. Any subset of fields may be present.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResponse {
    pub response: Option<String>,
    pub summary: Option<String>,
    pub analysis: Option<String>,
    pub full_text: Option<String>,
    pub success: Option<bool>,
}

impl AnalysisResponse {
    /// Decode a 2xx body without rejecting it.
    ///
    /// A non-object body yields no fields, except a bare string which is
    /// taken as `response`. Non-string text fields are kept as their JSON
    /// text; a non-boolean `success` is ignored.
    pub fn from_body(body: Value) -> Self {
        let mut fields = match body {
            Value::Object(fields) => fields,
            Value::String(text) => {
                return Self {
                    response: Some(text),
                    ..Self::default()
                };
            }
            _ => return Self::default(),
        };
        let mut text = |key: &str| match fields.remove(key) {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s),
            Some(other) => Some(other.to_string()),
        };
        Self {
            response: text("response"),
            summary: text("summary"),
            analysis: text("analysis"),
            full_text: text("fullText"),
            success: fields.get("success").and_then(Value::as_bool),
        }
    }
}

/// Synthetic result substituted for a step's output after the last retry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FallbackResponse {
    pub summary: String,
    pub analysis: String,
    pub full_text: String,
    /// Always `"fallback"`.
    pub status: String,
    /// Always `"low"`.
    pub confidence: String,
    /// Message of the last failed attempt.
    pub error: String,
    pub backend_status: BackendStatus,
}

impl FallbackResponse {
    /// Build the fallback for `step_name` from the last attempt's error text.
    pub fn new(step_name: &str, attempts: u32, last_error: &str) -> Self {
        let backend_status = classify_backend_error(last_error);
        let summary = match backend_status {
            BackendStatus::NoApiKey => format!(
                "{step_name} analysis is unavailable: the analysis service has no valid API key configured."
            ),
            BackendStatus::Unavailable => format!(
                "{step_name} analysis is temporarily unavailable: the analysis service did not respond after {attempts} attempts."
            ),
        };
        Self {
            analysis: summary.clone(),
            full_text: format!("{summary}\n\nLast error: {last_error}"),
            summary,
            status: "fallback".to_string(),
            confidence: "low".to_string(),
            error: last_error.to_string(),
            backend_status,
        }
    }

    /// Wire shape: `{ "data": { ... } }`.
    pub fn to_envelope(&self) -> Value {
        json!({ "data": self })
    }
}

/// Result of one retrying call.
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisOutcome {
    Completed(AnalysisResponse),
    Fallback(FallbackResponse),
}

impl AnalysisOutcome {
    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback(_))
    }
}

/// Map an error message to the backend status shown to operators.
pub fn classify_backend_error(message: &str) -> BackendStatus {
    let lower = message.to_lowercase();
    if API_KEY_SIGNATURES.iter().any(|sig| lower.contains(sig)) {
        BackendStatus::NoApiKey
    } else {
        BackendStatus::Unavailable
    }
}

/// Wraps an [`AnalysisTransport`] with bounded retries and linear backoff.
pub struct RetryingAnalysisClient {
    transport: Arc<dyn AnalysisTransport>,
    config: ClientConfig,
}

impl RetryingAnalysisClient {
    pub fn new(transport: Arc<dyn AnalysisTransport>, config: ClientConfig) -> Self {
        Self { transport, config }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Run one named analysis call.
    ///
    /// Makes up to `max_retries` attempts, each bounded by `max_wait_time`.
    /// After failed attempt `n` (1-based, not the last) waits
    /// `retry_delay * n`. Returns the first successful response, or a
    /// fallback carrying the last error.
    pub async fn perform_analysis(
        &self,
        endpoint: &Endpoint,
        payload: &Value,
        step_name: &str,
    ) -> AnalysisOutcome {
        let attempts = self.config.attempts();
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            match self.attempt(endpoint, payload).await {
                Ok(response) => {
                    info!(step = step_name, attempt, max = attempts, "analysis attempt succeeded");
                    return AnalysisOutcome::Completed(response);
                }
                Err(e) => {
                    warn!(
                        step = step_name,
                        attempt,
                        max = attempts,
                        error = %e,
                        "analysis attempt failed"
                    );
                    last_error = e.to_string();
                }
            }

            if attempt < attempts {
                sleep(backoff(self.config.retry_delay, attempt)).await;
            }
        }

        let fallback = FallbackResponse::new(step_name, attempts, &last_error);
        error!(
            step = step_name,
            attempts,
            backend_status = %fallback.backend_status,
            fallback = %fallback.to_envelope(),
            "analysis retries exhausted, using fallback"
        );
        AnalysisOutcome::Fallback(fallback)
    }

    /// One bounded attempt. Only transport errors and timeouts fail it.
    async fn attempt(&self, endpoint: &Endpoint, payload: &Value) -> Result<AnalysisResponse, HttpError> {
        let max_wait = self.config.max_wait_time;
        let body = timeout(max_wait, self.transport.send(endpoint, payload))
            .await
            .map_err(|_| HttpError::Timeout(max_wait))??;
        Ok(AnalysisResponse::from_body(body))
    }
}

/// Delay after failed attempt `attempt` (1-based).
pub fn backoff(retry_delay: Duration, attempt: u32) -> Duration {
    retry_delay.saturating_mul(attempt)
}
