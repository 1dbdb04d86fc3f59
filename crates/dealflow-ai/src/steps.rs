//! Analysis steps: the fixed comprehensive sequence, step construction, and
//! normalisation of remote outcomes into [`StepResult`]s.

use std::future::Future;
use std::sync::Arc;

use dealflow_client::{AnalysisOutcome, AnalysisResponse, Endpoint, RetryingAnalysisClient};
use dealflow_core::{StepResult, step_key};
use futures::future::BoxFuture;
use serde_json::{Value, json};
use thiserror::Error;

/// Summary used when the service answers without any text field.
pub const DEFAULT_SUMMARY: &str = "Analysis completed";

/// A step failure outside the retrying client's contract.
#[derive(Debug, Error)]
pub enum StepError {
    #[error("{0}")]
    Failed(String),
    #[error("step panicked: {0}")]
    Panicked(String),
}

/// One entry of the comprehensive analysis sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepSpec {
    pub name: &'static str,
    pub path: &'static str,
}

impl StepSpec {
    pub fn key(&self) -> String {
        step_key(self.name)
    }

    pub fn endpoint(&self) -> Endpoint {
        Endpoint::post(self.path)
    }
}

/// The comprehensive sequence, in execution order.
pub const COMPREHENSIVE_STEPS: [StepSpec; 7] = [
    StepSpec {
        name: "Fact Check",
        path: "/api/analyze/fact-check",
    },
    StepSpec {
        name: "Market Size",
        path: "/api/analyze/market-size",
    },
    StepSpec {
        name: "Product Info",
        path: "/api/analyze/product-info",
    },
    StepSpec {
        name: "Competition",
        path: "/api/analyze/competition",
    },
    StepSpec {
        name: "Business Model",
        path: "/api/analyze/business-model",
    },
    StepSpec {
        name: "Founders",
        path: "/api/analyze/founders",
    },
    StepSpec {
        name: "Investment Recommendation",
        path: "/api/analyze/investment-recommendation",
    },
];

pub type StepFuture = BoxFuture<'static, Result<AnalysisOutcome, StepError>>;

/// A named unit of remote analysis work. `invoke` runs at most once.
pub struct AnalysisStep {
    name: String,
    invoke: Box<dyn FnOnce() -> StepFuture + Send>,
}

impl AnalysisStep {
    pub fn new<F, Fut>(name: impl Into<String>, invoke: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<AnalysisOutcome, StepError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            invoke: Box::new(move || Box::pin(invoke())),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn key(&self) -> String {
        step_key(&self.name)
    }

    pub(crate) fn into_parts(self) -> (String, Box<dyn FnOnce() -> StepFuture + Send>) {
        (self.name, self.invoke)
    }
}

/// Request body for one step: the shared context plus the step discriminator.
pub fn payload(context: &str, analysis_type: &str) -> Value {
    json!({
        "text": context,
        "content": context,
        "analysis_type": analysis_type,
    })
}

/// Run one step of the comprehensive sequence against `context`.
pub async fn analyze(
    client: &RetryingAnalysisClient,
    spec: &StepSpec,
    context: &str,
) -> AnalysisOutcome {
    let body = payload(context, &spec.key());
    client
        .perform_analysis(&spec.endpoint(), &body, spec.name)
        .await
}

/// Build the comprehensive step list. Every step sees the same context.
pub fn comprehensive_steps(
    client: Arc<RetryingAnalysisClient>,
    context: Arc<str>,
) -> Vec<AnalysisStep> {
    COMPREHENSIVE_STEPS
        .iter()
        .map(|spec| {
            let client = client.clone();
            let context = context.clone();
            let spec = *spec;
            AnalysisStep::new(spec.name, move || async move {
                Ok(analyze(&client, &spec, &context).await)
            })
        })
        .collect()
}

/// Normalise a step outcome.
///
/// Text is taken from the first present field of `response`, `summary`,
/// `analysis`, else [`DEFAULT_SUMMARY`]. A fallback becomes an `error`
/// result that keeps the embedded error text and backend status.
pub fn normalize(outcome: AnalysisOutcome) -> StepResult {
    match outcome {
        AnalysisOutcome::Completed(resp) => normalize_response(resp),
        AnalysisOutcome::Fallback(fb) => {
            StepResult::degraded(fb.summary, fb.full_text, fb.backend_status)
        }
    }
}

fn normalize_response(resp: AnalysisResponse) -> StepResult {
    let AnalysisResponse {
        response,
        summary,
        analysis,
        full_text,
        success,
    } = resp;
    let text = first_present([response, summary, analysis])
        .unwrap_or_else(|| DEFAULT_SUMMARY.to_string());
    let full_text = first_present([full_text]).unwrap_or_else(|| text.clone());

    if success == Some(false) {
        return StepResult::failed(text, full_text);
    }
    StepResult::completed(text, full_text)
}

fn first_present<const N: usize>(fields: [Option<String>; N]) -> Option<String> {
    fields
        .into_iter()
        .flatten()
        .find(|v| !v.trim().is_empty())
}

/// Result for a step whose invoke failed outright.
pub fn failed(name: &str, err: &StepError) -> StepResult {
    StepResult::error(format!("{name} analysis failed: {err}"))
}
