//! Persisted analysis records.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::analysis::{StepResult, StepStatus};
use crate::transcript::{character_count, word_count};

/// `analysis_type` of the aggregate record.
pub const COMPREHENSIVE: &str = "comprehensive";

/// Collection that holds append-only per-step records.
pub const INDIVIDUAL_ANALYSES: &str = "individual_analyses";

/// Step key → result, in execution order. Serializes as a JSON object.
pub type StepResults = IndexMap<String, StepResult>;

/// Which optional inputs were present when the analysis ran.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSources {
    pub profile: bool,
    pub email_transcript: bool,
    pub call_transcript: bool,
    pub pitch_deck: bool,
}

/// Status of a persisted aggregate. Only fully finished runs are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregateStatus {
    Completed,
}

impl AggregateStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
        }
    }
}

/// The single cumulative analysis document for one subject.
///
/// Stored once per `subject_id`; later runs overwrite it in place.
/// `analysis_data` keeps steps in execution order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateAnalysisRecord {
    pub subject_id: String,
    pub analysis_type: String,
    pub analysis_data: StepResults,
    pub concatenated_text: String,
    pub data_sources: DataSources,
    pub status: AggregateStatus,
    pub word_count: usize,
    pub character_count: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AggregateAnalysisRecord {
    /// Build the aggregate for a finished run. Counts are derived from the
    /// transcript; both timestamps are set to `now` and the store decides
    /// whether `created_at` survives.
    pub fn new(
        subject_id: impl Into<String>,
        analysis_data: StepResults,
        transcript: String,
        data_sources: DataSources,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            subject_id: subject_id.into(),
            analysis_type: COMPREHENSIVE.to_string(),
            word_count: word_count(&transcript),
            character_count: character_count(&transcript),
            analysis_data,
            concatenated_text: transcript,
            data_sources,
            status: AggregateStatus::Completed,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn step(&self, key: &str) -> Option<&StepResult> {
        self.analysis_data.get(key)
    }
}

/// Append-only audit entry for one step of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndividualAnalysisRecord {
    pub subject_id: String,
    /// Step key, e.g. `market_size`.
    pub analysis_type: String,
    pub analysis_data: StepResult,
    pub status: StepStatus,
    pub created_at: DateTime<Utc>,
}

impl IndividualAnalysisRecord {
    pub fn new(subject_id: impl Into<String>, step_key: impl Into<String>, result: StepResult) -> Self {
        Self {
            subject_id: subject_id.into(),
            analysis_type: step_key.into(),
            status: result.status(),
            analysis_data: result,
            created_at: Utc::now(),
        }
    }
}

/// A record together with the id the store assigned to it.
#[derive(Debug, Clone, PartialEq)]
pub struct Stored<T> {
    pub id: String,
    pub record: T,
}
