//! Comprehensive analysis orchestrator.
//!
//! Runs the step sequence strictly in order for one subject, reports
//! progress before each step, records every step individually, and finishes
//! with a single atomic upsert of the subject's aggregate record.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use chrono::Utc;
use dealflow_client::{ArtifactSource, RetryingAnalysisClient};
use dealflow_core::record::INDIVIDUAL_ANALYSES;
use dealflow_core::{
    AggregateAnalysisRecord, DataSources, IndividualAnalysisRecord, StartupProfile, StepResult,
    StepResults, Stored, Transcript,
};
use dealflow_store::{AnalysisStore, StoreError};
use futures::FutureExt;
use thiserror::Error;
use tracing::{info, warn};

use crate::context::build_context;
use crate::progress::{CancellationFlag, ProgressEvent, ProgressReporter, step_percent};
use crate::steps::{self, AnalysisStep, StepError};

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("the startup profile must be submitted before it can be analysed")]
    NotSubmitted,
    #[error("analysis cancelled after {completed} of {total} steps")]
    Cancelled { completed: usize, total: usize },
    #[error("failed to save analysis: {0}")]
    Persistence(#[from] StoreError),
}

/// Everything a finished run produced.
#[derive(Debug, Clone)]
pub struct AnalysisReport {
    pub subject_id: String,
    /// Step key → result, in execution order.
    pub results: StepResults,
    pub transcript: String,
    pub data_sources: DataSources,
    /// Id of the aggregate record written for this subject.
    pub record_id: String,
    /// `true` if this run created the aggregate rather than overwriting it.
    pub created: bool,
}

impl AnalysisReport {
    pub fn get(&self, key: &str) -> Option<&StepResult> {
        self.results.get(key)
    }

    pub fn completed_count(&self) -> usize {
        self.results.values().filter(|r| r.is_completed()).count()
    }
}

pub struct Orchestrator {
    client: Arc<RetryingAnalysisClient>,
    store: Arc<dyn AnalysisStore>,
    artifacts: Arc<dyn ArtifactSource>,
}

impl Orchestrator {
    pub fn new(
        client: Arc<RetryingAnalysisClient>,
        store: Arc<dyn AnalysisStore>,
        artifacts: Arc<dyn ArtifactSource>,
    ) -> Self {
        Self {
            client,
            store,
            artifacts,
        }
    }

    /// Run the full comprehensive sequence for `subject`.
    ///
    /// Fails with [`AnalysisError::NotSubmitted`] before any remote call when
    /// the profile has no id.
    pub async fn run_comprehensive_analysis(
        &self,
        subject: &StartupProfile,
        progress: &dyn ProgressReporter,
        cancel: &CancellationFlag,
    ) -> Result<AnalysisReport, AnalysisError> {
        let subject_id = subject.submitted_id().ok_or(AnalysisError::NotSubmitted)?;
        info!(subject_id, "starting comprehensive analysis");

        let context = build_context(subject, subject_id, self.artifacts.as_ref()).await;
        let steps = steps::comprehensive_steps(self.client.clone(), Arc::from(context.text));
        self.run_steps(subject_id, context.data_sources, steps, progress, cancel)
            .await
    }

    /// Run an explicit step list for `subject_id`.
    ///
    /// No step failure stops the loop; each yields a [`StepResult`]. Only
    /// cancellation and the final aggregate write can fail the run.
    pub async fn run_steps(
        &self,
        subject_id: &str,
        data_sources: DataSources,
        steps: Vec<AnalysisStep>,
        progress: &dyn ProgressReporter,
        cancel: &CancellationFlag,
    ) -> Result<AnalysisReport, AnalysisError> {
        let total = steps.len();
        let mut results = StepResults::with_capacity(total);
        let mut transcript = Transcript::new();

        for (index, step) in steps.into_iter().enumerate() {
            if cancel.is_cancelled() {
                info!(subject_id, completed = index, total, "analysis cancelled");
                return Err(AnalysisError::Cancelled {
                    completed: index,
                    total,
                });
            }

            let (name, invoke) = step.into_parts();
            let key = dealflow_core::step_key(&name);
            progress.report(ProgressEvent::StepStarted {
                index,
                total,
                name: name.clone(),
                percent: step_percent(index, total),
            });
            info!(subject_id, step = %name, index, total, "running analysis step");

            let outcome = AssertUnwindSafe(async move { invoke().await })
                .catch_unwind()
                .await
                .unwrap_or_else(|panic| Err(StepError::Panicked(panic_message(panic))));

            let result = match outcome {
                Ok(outcome) => steps::normalize(outcome),
                Err(e) => {
                    warn!(subject_id, step = %name, error = %e, "analysis step failed");
                    steps::failed(&name, &e)
                }
            };

            transcript.push_step(&name, &result);
            self.record_step(subject_id, &key, &result).await;
            progress.report(ProgressEvent::StepFinished {
                index,
                key: key.clone(),
                status: result.status(),
            });
            results.insert(key, result);
        }

        progress.report(ProgressEvent::Finished { percent: 100 });

        let transcript = transcript.into_string();
        let record = AggregateAnalysisRecord::new(
            subject_id,
            results.clone(),
            transcript.clone(),
            data_sources,
            Utc::now(),
        );
        let upsert = self.store.upsert_aggregate(record).await?;
        info!(
            subject_id,
            record_id = %upsert.id,
            created = upsert.created,
            steps = total,
            "comprehensive analysis saved"
        );

        Ok(AnalysisReport {
            subject_id: subject_id.to_string(),
            results,
            transcript,
            data_sources,
            record_id: upsert.id,
            created: upsert.created,
        })
    }

    /// Best-effort write of one step's individual record.
    async fn record_step(&self, subject_id: &str, key: &str, result: &StepResult) {
        let record = IndividualAnalysisRecord::new(subject_id, key, result.clone());
        if let Err(e) = self.store.append(INDIVIDUAL_ANALYSES, &record).await {
            warn!(subject_id, step = key, error = %e, "failed to save individual analysis");
        }
    }

    /// The subject's stored aggregate, if any run has finished.
    pub async fn latest_analysis(
        &self,
        subject_id: &str,
    ) -> Result<Option<Stored<AggregateAnalysisRecord>>, AnalysisError> {
        Ok(self.store.find_by_subject_id(subject_id).await?)
    }

    /// Every individual step record for the subject, oldest first.
    pub async fn analysis_history(
        &self,
        subject_id: &str,
    ) -> Result<Vec<Stored<IndividualAnalysisRecord>>, AnalysisError> {
        Ok(self
            .store
            .list_appended(INDIVIDUAL_ANALYSES, subject_id)
            .await?)
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use dealflow_client::{
        AnalysisOutcome, AnalysisTransport, ClientConfig, Endpoint, HttpError, NoArtifacts,
    };
    use dealflow_core::{BackendStatus, StepStatus, transcript};
    use dealflow_store::{MemoryStore, UpsertOutcome};
    use serde_json::{Value, json};

    use crate::progress::NoopProgress;
    use crate::steps::COMPREHENSIVE_STEPS;

    /// Answers every path with `{"response": "<prefix> <path>"}` unless the
    /// path is listed in `failing`.
    struct FakeTransport {
        prefix: Mutex<String>,
        failing: HashMap<String, String>,
        calls: Mutex<Vec<(String, Value)>>,
    }

    impl FakeTransport {
        fn ok() -> Self {
            Self {
                prefix: Mutex::new("analysis of".into()),
                failing: HashMap::new(),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn failing(path: &str, message: &str) -> Self {
            let mut t = Self::ok();
            t.failing.insert(path.into(), message.into());
            t
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }

        fn set_prefix(&self, prefix: &str) {
            *self.prefix.lock().unwrap() = prefix.into();
        }
    }

    #[async_trait]
    impl AnalysisTransport for FakeTransport {
        async fn send(&self, endpoint: &Endpoint, payload: &Value) -> Result<Value, HttpError> {
            self.calls
                .lock()
                .unwrap()
                .push((endpoint.path.clone(), payload.clone()));
            if let Some(msg) = self.failing.get(&endpoint.path) {
                return Err(HttpError::Other(msg.clone()));
            }
            let prefix = self.prefix.lock().unwrap().clone();
            Ok(json!({ "response": format!("{prefix} {}", endpoint.path), "success": true }))
        }
    }

    /// MemoryStore with switchable write failures.
    #[derive(Default)]
    struct FlakyStore {
        inner: MemoryStore,
        fail_append: bool,
        fail_upsert: bool,
    }

    #[async_trait]
    impl AnalysisStore for FlakyStore {
        async fn find_by_subject_id(
            &self,
            subject_id: &str,
        ) -> Result<Option<Stored<AggregateAnalysisRecord>>, StoreError> {
            self.inner.find_by_subject_id(subject_id).await
        }

        async fn insert(&self, record: &AggregateAnalysisRecord) -> Result<String, StoreError> {
            self.inner.insert(record).await
        }

        async fn update(&self, id: &str, record: &AggregateAnalysisRecord) -> Result<(), StoreError> {
            self.inner.update(id, record).await
        }

        async fn append(
            &self,
            collection: &str,
            record: &IndividualAnalysisRecord,
        ) -> Result<String, StoreError> {
            if self.fail_append {
                return Err(StoreError::Other("append rejected".into()));
            }
            self.inner.append(collection, record).await
        }

        async fn list_appended(
            &self,
            collection: &str,
            subject_id: &str,
        ) -> Result<Vec<Stored<IndividualAnalysisRecord>>, StoreError> {
            self.inner.list_appended(collection, subject_id).await
        }

        async fn upsert_aggregate(
            &self,
            record: AggregateAnalysisRecord,
        ) -> Result<UpsertOutcome, StoreError> {
            if self.fail_upsert {
                return Err(StoreError::Other("upsert rejected".into()));
            }
            self.inner.upsert_aggregate(record).await
        }
    }

    #[derive(Default)]
    struct RecordingProgress(Mutex<Vec<ProgressEvent>>);

    impl ProgressReporter for RecordingProgress {
        fn report(&self, event: ProgressEvent) {
            self.0.lock().unwrap().push(event);
        }
    }

    impl RecordingProgress {
        fn started_percents(&self) -> Vec<u8> {
            self.0
                .lock()
                .unwrap()
                .iter()
                .filter_map(|e| match e {
                    ProgressEvent::StepStarted { percent, .. } => Some(*percent),
                    _ => None,
                })
                .collect()
        }

        fn last(&self) -> Option<ProgressEvent> {
            self.0.lock().unwrap().last().cloned()
        }
    }

    fn client(transport: Arc<FakeTransport>) -> Arc<RetryingAnalysisClient> {
        let config = ClientConfig::new("http://test")
            .with_max_retries(3)
            .with_retry_delay(Duration::from_millis(100))
            .with_max_wait_time(Duration::from_secs(1));
        Arc::new(RetryingAnalysisClient::new(transport, config))
    }

    fn orchestrator(transport: Arc<FakeTransport>, store: Arc<dyn AnalysisStore>) -> Orchestrator {
        Orchestrator::new(client(transport), store, Arc::new(NoArtifacts))
    }

    fn subject() -> StartupProfile {
        StartupProfile {
            id: Some("startup-1".into()),
            company_name: Some("Acme Robotics".into()),
            industry: Some("Logistics".into()),
            email_transcript: Some("Thanks for the intro".into()),
            ..Default::default()
        }
    }

    fn ok_step(name: &str) -> AnalysisStep {
        let text = format!("{name} looks fine");
        AnalysisStep::new(name, move || async move {
            Ok(AnalysisOutcome::Completed(dealflow_client::AnalysisResponse {
                response: Some(text),
                ..Default::default()
            }))
        })
    }

    fn seven_steps_with(index: usize, bad: AnalysisStep) -> (Vec<AnalysisStep>, Option<AnalysisStep>) {
        let mut bad = Some(bad);
        let steps = COMPREHENSIVE_STEPS
            .iter()
            .enumerate()
            .map(|(i, spec)| {
                if i == index {
                    bad.take().unwrap()
                } else {
                    ok_step(spec.name)
                }
            })
            .collect();
        (steps, bad)
    }

    #[tokio::test]
    async fn not_submitted_fails_without_remote_calls() {
        let transport = Arc::new(FakeTransport::ok());
        let store = Arc::new(MemoryStore::new());
        let orch = orchestrator(transport.clone(), store.clone());

        let mut profile = subject();
        profile.id = None;
        let err = orch
            .run_comprehensive_analysis(&profile, &NoopProgress, &CancellationFlag::new())
            .await
            .unwrap_err();

        assert!(matches!(err, AnalysisError::NotSubmitted));
        assert_eq!(transport.call_count(), 0);
        assert_eq!(store.aggregate_count().await, 0);
    }

    #[tokio::test]
    async fn all_steps_succeed() {
        let transport = Arc::new(FakeTransport::ok());
        let store = Arc::new(MemoryStore::new());
        let orch = orchestrator(transport.clone(), store.clone());
        let progress = RecordingProgress::default();

        let report = orch
            .run_comprehensive_analysis(&subject(), &progress, &CancellationFlag::new())
            .await
            .unwrap();

        assert_eq!(report.results.len(), 7);
        assert_eq!(report.completed_count(), 7);
        assert_eq!(transport.call_count(), 7);
        assert!(report.created);
        assert_eq!(
            report.get("market_size").unwrap().summary(),
            "analysis of /api/analyze/market-size"
        );

        assert_eq!(progress.started_percents(), [0, 14, 29, 43, 57, 71, 86]);
        assert_eq!(progress.last(), Some(ProgressEvent::Finished { percent: 100 }));

        let stored = orch.latest_analysis("startup-1").await.unwrap().unwrap().record;
        assert_eq!(stored.status, dealflow_core::AggregateStatus::Completed);
        assert_eq!(stored.analysis_type, "comprehensive");
        assert_eq!(stored.analysis_data.len(), 7);
        assert_eq!(
            stored.data_sources,
            DataSources {
                profile: true,
                email_transcript: true,
                call_transcript: false,
                pitch_deck: false,
            }
        );
        assert_eq!(stored.concatenated_text, report.transcript);
        assert_eq!(stored.word_count, transcript::word_count(&report.transcript));
        assert_eq!(
            stored.character_count,
            report.transcript.encode_utf16().count()
        );

        let history = orch.analysis_history("startup-1").await.unwrap();
        assert_eq!(history.len(), 7);
        assert_eq!(history[0].record.analysis_type, "fact_check");
        assert_eq!(history[6].record.analysis_type, "investment_recommendation");
    }

    #[tokio::test]
    async fn every_step_gets_the_same_context() {
        let transport = Arc::new(FakeTransport::ok());
        let orch = orchestrator(transport.clone(), Arc::new(MemoryStore::new()));
        orch.run_comprehensive_analysis(&subject(), &NoopProgress, &CancellationFlag::new())
            .await
            .unwrap();

        let calls = transport.calls.lock().unwrap();
        let first = calls[0].1["text"].clone();
        assert!(first.as_str().unwrap().starts_with("COMPANY: Acme Robotics"));
        for (path, payload) in calls.iter() {
            assert_eq!(payload["text"], first, "context differs for {path}");
        }
        let types: Vec<&str> = calls
            .iter()
            .map(|(_, p)| p["analysis_type"].as_str().unwrap())
            .collect();
        assert_eq!(types[0], "fact_check");
        assert_eq!(types[6], "investment_recommendation");
    }

    #[tokio::test]
    async fn transcript_sections_follow_step_order() {
        let transport = Arc::new(FakeTransport::ok());
        let orch = orchestrator(transport, Arc::new(MemoryStore::new()));
        let report = orch
            .run_comprehensive_analysis(&subject(), &NoopProgress, &CancellationFlag::new())
            .await
            .unwrap();

        let positions: Vec<usize> = COMPREHENSIVE_STEPS
            .iter()
            .map(|s| {
                report
                    .transcript
                    .find(&format!("=== {} ANALYSIS ===", s.name.to_uppercase()))
                    .unwrap()
            })
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }

    #[tokio::test(start_paused = true)]
    async fn fallback_step_is_error_with_backend_status() {
        let transport = Arc::new(FakeTransport::failing(
            "/api/analyze/competition",
            "server returned 400: API key not valid. Please pass a valid API key.",
        ));
        let orch = orchestrator(transport.clone(), Arc::new(MemoryStore::new()));
        let report = orch
            .run_comprehensive_analysis(&subject(), &NoopProgress, &CancellationFlag::new())
            .await
            .unwrap();

        assert_eq!(report.results.len(), 7);
        // Three attempts for the failing step, one for each of the others.
        assert_eq!(transport.call_count(), 9);
        let competition = report.get("competition").unwrap();
        assert_eq!(competition.status(), StepStatus::Error);
        assert_eq!(competition.backend_status(), Some(BackendStatus::NoApiKey));
        assert!(competition.full_text().contains("API key not valid"));
        assert_eq!(report.completed_count(), 6);
    }

    #[tokio::test]
    async fn step_error_does_not_stop_the_batch() {
        let store = Arc::new(MemoryStore::new());
        let orch = orchestrator(Arc::new(FakeTransport::ok()), store.clone());
        let bad = AnalysisStep::new("Product Info", || async {
            Err(StepError::Failed("response parser crashed".into()))
        });
        let (steps, _) = seven_steps_with(2, bad);

        let report = orch
            .run_steps("s1", DataSources::default(), steps, &NoopProgress, &CancellationFlag::new())
            .await
            .unwrap();

        assert_eq!(report.results.len(), 7);
        let (key, third) = report.results.get_index(2).unwrap();
        assert_eq!(key, "product_info");
        assert_eq!(third.status(), StepStatus::Error);
        assert!(third.summary().contains("response parser crashed"));
        for (i, (_, r)) in report.results.iter().enumerate() {
            if i != 2 {
                assert!(r.is_completed(), "step {i} should have completed");
            }
        }
        assert_eq!(store.collection_len(INDIVIDUAL_ANALYSES).await, 7);
    }

    #[tokio::test]
    async fn panicking_step_is_caught() {
        let orch = orchestrator(Arc::new(FakeTransport::ok()), Arc::new(MemoryStore::new()));
        let bad = AnalysisStep::new("Founders", || async {
            if true {
                panic!("index out of bounds");
            }
            Ok(AnalysisOutcome::Completed(Default::default()))
        });
        let (steps, _) = seven_steps_with(5, bad);

        let report = orch
            .run_steps("s1", DataSources::default(), steps, &NoopProgress, &CancellationFlag::new())
            .await
            .unwrap();

        assert_eq!(report.results.len(), 7);
        let founders = report.get("founders").unwrap();
        assert_eq!(founders.status(), StepStatus::Error);
        assert!(founders.summary().contains("index out of bounds"));
        assert!(report.get("investment_recommendation").unwrap().is_completed());
    }

    #[tokio::test]
    async fn second_run_overwrites_single_aggregate() {
        let transport = Arc::new(FakeTransport::ok());
        let store = Arc::new(MemoryStore::new());
        let orch = orchestrator(transport.clone(), store.clone());
        let cancel = CancellationFlag::new();

        let first = orch
            .run_comprehensive_analysis(&subject(), &NoopProgress, &cancel)
            .await
            .unwrap();
        transport.set_prefix("revised analysis of");
        let second = orch
            .run_comprehensive_analysis(&subject(), &NoopProgress, &cancel)
            .await
            .unwrap();

        assert!(first.created);
        assert!(!second.created);
        assert_eq!(first.record_id, second.record_id);
        assert_eq!(store.aggregate_count().await, 1);

        let stored = orch.latest_analysis("startup-1").await.unwrap().unwrap().record;
        assert_eq!(stored.concatenated_text, second.transcript);
        assert!(
            stored
                .analysis_data
                .iter()
                .all(|(_, r)| r.summary().starts_with("revised analysis of"))
        );
        // Individual records accumulate across runs.
        assert_eq!(orch.analysis_history("startup-1").await.unwrap().len(), 14);
    }

    #[tokio::test]
    async fn concurrent_runs_leave_one_aggregate() {
        let store = Arc::new(MemoryStore::new());
        let orch = Arc::new(orchestrator(Arc::new(FakeTransport::ok()), store.clone()));

        let a = {
            let orch = orch.clone();
            tokio::spawn(async move {
                orch.run_comprehensive_analysis(&subject(), &NoopProgress, &CancellationFlag::new())
                    .await
                    .map(|r| r.created)
            })
        };
        let b = {
            let orch = orch.clone();
            tokio::spawn(async move {
                orch.run_comprehensive_analysis(&subject(), &NoopProgress, &CancellationFlag::new())
                    .await
                    .map(|r| r.created)
            })
        };
        let created_a = a.await.unwrap().unwrap();
        let created_b = b.await.unwrap().unwrap();

        assert!(created_a ^ created_b);
        assert_eq!(store.aggregate_count().await, 1);
    }

    #[tokio::test]
    async fn individual_persistence_failure_is_swallowed() {
        let store = Arc::new(FlakyStore {
            fail_append: true,
            ..Default::default()
        });
        let orch = orchestrator(Arc::new(FakeTransport::ok()), store.clone());

        let report = orch
            .run_comprehensive_analysis(&subject(), &NoopProgress, &CancellationFlag::new())
            .await
            .unwrap();

        assert_eq!(report.results.len(), 7);
        assert_eq!(store.inner.aggregate_count().await, 1);
        assert_eq!(store.inner.collection_len(INDIVIDUAL_ANALYSES).await, 0);
    }

    #[tokio::test]
    async fn aggregate_persistence_failure_propagates() {
        let store = Arc::new(FlakyStore {
            fail_upsert: true,
            ..Default::default()
        });
        let orch = orchestrator(Arc::new(FakeTransport::ok()), store.clone());

        let err = orch
            .run_comprehensive_analysis(&subject(), &NoopProgress, &CancellationFlag::new())
            .await
            .unwrap_err();

        assert!(matches!(err, AnalysisError::Persistence(_)));
        // Step records written before the failing aggregate stay.
        assert_eq!(store.inner.collection_len(INDIVIDUAL_ANALYSES).await, 7);
    }

    #[tokio::test]
    async fn cancelled_before_start_runs_nothing() {
        let transport = Arc::new(FakeTransport::ok());
        let store = Arc::new(MemoryStore::new());
        let orch = orchestrator(transport.clone(), store.clone());
        let cancel = CancellationFlag::new();
        cancel.cancel();

        let err = orch
            .run_comprehensive_analysis(&subject(), &NoopProgress, &cancel)
            .await
            .unwrap_err();

        assert!(matches!(err, AnalysisError::Cancelled { completed: 0, total: 7 }));
        assert_eq!(transport.call_count(), 0);
        assert_eq!(store.aggregate_count().await, 0);
    }

    #[tokio::test]
    async fn cancellation_is_honoured_between_steps() {
        let store = Arc::new(MemoryStore::new());
        let orch = orchestrator(Arc::new(FakeTransport::ok()), store.clone());
        let cancel = CancellationFlag::new();

        let flag = cancel.clone();
        let cancelling = AnalysisStep::new("Market Size", move || async move {
            // The in-flight step still finishes.
            flag.cancel();
            Ok(AnalysisOutcome::Completed(Default::default()))
        });
        let (steps, _) = seven_steps_with(1, cancelling);

        let err = orch
            .run_steps("s1", DataSources::default(), steps, &NoopProgress, &cancel)
            .await
            .unwrap_err();

        assert!(matches!(err, AnalysisError::Cancelled { completed: 2, total: 7 }));
        assert_eq!(store.collection_len(INDIVIDUAL_ANALYSES).await, 2);
        assert_eq!(store.aggregate_count().await, 0);
    }

    #[tokio::test]
    async fn empty_step_list_still_finishes() {
        let store = Arc::new(MemoryStore::new());
        let orch = orchestrator(Arc::new(FakeTransport::ok()), store.clone());
        let progress = RecordingProgress::default();

        let report = orch
            .run_steps("s1", DataSources::default(), Vec::new(), &progress, &CancellationFlag::new())
            .await
            .unwrap();

        assert!(report.results.is_empty());
        assert_eq!(progress.last(), Some(ProgressEvent::Finished { percent: 100 }));
        assert_eq!(store.aggregate_count().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn mixed_outcomes_keep_every_step() {
        let transport = Arc::new(FakeTransport::failing("/api/analyze/fact-check", "connection refused"));
        let orch = orchestrator(transport.clone(), Arc::new(MemoryStore::new()));

        let mut steps = steps::comprehensive_steps(orch.client.clone(), Arc::from("context"));
        steps[3] = AnalysisStep::new("Competition", || async {
            Err(StepError::Failed("broken".into()))
        });

        let report = orch
            .run_steps("s1", DataSources::default(), steps, &NoopProgress, &CancellationFlag::new())
            .await
            .unwrap();

        assert_eq!(report.results.len(), 7);
        let fact = report.get("fact_check").unwrap();
        assert_eq!(fact.backend_status(), Some(BackendStatus::Unavailable));
        assert_eq!(report.get("competition").unwrap().status(), StepStatus::Error);
        assert_eq!(report.completed_count(), 5);
    }
}
