//! Per-step analysis results shared by the client, the store, and the orchestrator.

use std::fmt;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of one analysis step as seen by callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Completed,
    Error,
}

impl StepStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Error => "error",
        }
    }

    /// Confidence is never chosen independently: completed steps are high,
    /// errored steps are low.
    pub fn confidence(&self) -> Confidence {
        match self {
            Self::Completed => Confidence::High,
            Self::Error => Confidence::Low,
        }
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Low,
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Low => "low",
        }
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why the analysis backend could not produce a result.
///
/// Carried on fallback responses so an operator can tell a rejected API key
/// apart from a backend that is simply down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendStatus {
    NoApiKey,
    Unavailable,
}

impl BackendStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoApiKey => "no_api_key",
            Self::Unavailable => "unavailable",
        }
    }
}

impl fmt::Display for BackendStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized outcome of one analysis step.
///
/// Always produced, even when the step failed; the error message then becomes
/// both `summary` and `full_text`. Fields are private so `status` and
/// `confidence` cannot drift apart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepResult {
    summary: String,
    full_text: String,
    status: StepStatus,
    confidence: Confidence,
    /// ISO 8601 timestamp string.
    timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    backend_status: Option<BackendStatus>,
}

impl StepResult {
    /// A step that produced a usable analysis.
    pub fn completed(summary: impl Into<String>, full_text: impl Into<String>) -> Self {
        Self::with_status(StepStatus::Completed, summary.into(), full_text.into())
    }

    /// A step that failed outright; the message is used for both text fields.
    pub fn error(message: impl Into<String>) -> Self {
        let message = message.into();
        Self::with_status(StepStatus::Error, message.clone(), message)
    }

    /// A step the service answered but reported as unsuccessful.
    pub fn failed(summary: impl Into<String>, full_text: impl Into<String>) -> Self {
        Self::with_status(StepStatus::Error, summary.into(), full_text.into())
    }

    /// A step whose remote call exhausted its retries.
    pub fn degraded(
        summary: impl Into<String>,
        full_text: impl Into<String>,
        backend_status: BackendStatus,
    ) -> Self {
        let mut result = Self::with_status(StepStatus::Error, summary.into(), full_text.into());
        result.backend_status = Some(backend_status);
        result
    }

    fn with_status(status: StepStatus, summary: String, full_text: String) -> Self {
        Self {
            summary,
            full_text,
            status,
            confidence: status.confidence(),
            timestamp: now_iso8601(),
            backend_status: None,
        }
    }

    pub fn summary(&self) -> &str {
        &self.summary
    }

    pub fn full_text(&self) -> &str {
        &self.full_text
    }

    pub fn status(&self) -> StepStatus {
        self.status
    }

    pub fn confidence(&self) -> Confidence {
        self.confidence
    }

    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    pub fn backend_status(&self) -> Option<BackendStatus> {
        self.backend_status
    }

    pub fn is_completed(&self) -> bool {
        self.status == StepStatus::Completed
    }
}

/// Current UTC time as an RFC 3339 string with millisecond precision.
pub fn now_iso8601() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
