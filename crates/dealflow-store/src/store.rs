//! Persistence contract used by the orchestrator.

use async_trait::async_trait;
use dealflow_core::{AggregateAnalysisRecord, IndividualAnalysisRecord, Stored};

use crate::StoreError;

/// What an aggregate upsert did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpsertOutcome {
    pub id: String,
    /// `true` when no record existed for the subject before this call.
    pub created: bool,
}

/// Document store for analysis records.
///
/// Aggregates are keyed by subject: at most one exists per `subject_id`.
/// Individual records are append-only entries in named collections.
#[async_trait]
pub trait AnalysisStore: Send + Sync {
    /// The aggregate for `subject_id`, if one exists.
    async fn find_by_subject_id(
        &self,
        subject_id: &str,
    ) -> Result<Option<Stored<AggregateAnalysisRecord>>, StoreError>;

    /// Insert a new aggregate. Fails with [`StoreError::Duplicate`] if the
    /// subject already has one.
    async fn insert(&self, record: &AggregateAnalysisRecord) -> Result<String, StoreError>;

    /// Overwrite the mutable fields of aggregate `id`. `subject_id` and
    /// `created_at` are kept; `updated_at` is taken from `record`.
    async fn update(&self, id: &str, record: &AggregateAnalysisRecord) -> Result<(), StoreError>;

    /// Append an individual record to `collection`.
    async fn append(
        &self,
        collection: &str,
        record: &IndividualAnalysisRecord,
    ) -> Result<String, StoreError>;

    /// Individual records in `collection` for `subject_id`, oldest first.
    async fn list_appended(
        &self,
        collection: &str,
        subject_id: &str,
    ) -> Result<Vec<Stored<IndividualAnalysisRecord>>, StoreError>;

    /// Insert or overwrite the subject's aggregate as a single atomic write.
    ///
    /// Concurrent calls for the same subject leave exactly one record.
    async fn upsert_aggregate(
        &self,
        record: AggregateAnalysisRecord,
    ) -> Result<UpsertOutcome, StoreError>;
}
