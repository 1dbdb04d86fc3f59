//! In-process store for tests and single-run CLI use.

use std::collections::HashMap;

use async_trait::async_trait;
use dealflow_core::{AggregateAnalysisRecord, IndividualAnalysisRecord, Stored};
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use crate::{AnalysisStore, StoreError, UpsertOutcome};

#[derive(Default)]
struct State {
    aggregates: HashMap<String, AggregateAnalysisRecord>,
    /// subject_id → aggregate id. Enforces one aggregate per subject.
    by_subject: HashMap<String, String>,
    collections: HashMap<String, Vec<Stored<IndividualAnalysisRecord>>>,
}

impl State {
    fn insert(&mut self, record: AggregateAnalysisRecord) -> Result<String, StoreError> {
        if self.by_subject.contains_key(&record.subject_id) {
            return Err(StoreError::Duplicate(record.subject_id));
        }
        let id = Uuid::new_v4().to_string();
        self.by_subject.insert(record.subject_id.clone(), id.clone());
        self.aggregates.insert(id.clone(), record);
        Ok(id)
    }

    fn update(&mut self, id: &str, record: &AggregateAnalysisRecord) -> Result<(), StoreError> {
        let existing = self
            .aggregates
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        existing.analysis_type = record.analysis_type.clone();
        existing.analysis_data = record.analysis_data.clone();
        existing.concatenated_text = record.concatenated_text.clone();
        existing.data_sources = record.data_sources;
        existing.status = record.status;
        existing.word_count = record.word_count;
        existing.character_count = record.character_count;
        existing.updated_at = record.updated_at;
        Ok(())
    }
}

/// [`AnalysisStore`] held in memory behind one async mutex.
///
/// Every operation, including the upsert's read-modify-write, runs under the
/// same lock.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of aggregate records across all subjects.
    pub async fn aggregate_count(&self) -> usize {
        self.state.lock().await.aggregates.len()
    }

    /// Number of records in `collection`.
    pub async fn collection_len(&self, collection: &str) -> usize {
        self.state
            .lock()
            .await
            .collections
            .get(collection)
            .map_or(0, Vec::len)
    }
}

#[async_trait]
impl AnalysisStore for MemoryStore {
    async fn find_by_subject_id(
        &self,
        subject_id: &str,
    ) -> Result<Option<Stored<AggregateAnalysisRecord>>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.by_subject.get(subject_id).and_then(|id| {
            state.aggregates.get(id).map(|record| Stored {
                id: id.clone(),
                record: record.clone(),
            })
        }))
    }

    async fn insert(&self, record: &AggregateAnalysisRecord) -> Result<String, StoreError> {
        self.state.lock().await.insert(record.clone())
    }

    async fn update(&self, id: &str, record: &AggregateAnalysisRecord) -> Result<(), StoreError> {
        self.state.lock().await.update(id, record)
    }

    async fn append(
        &self,
        collection: &str,
        record: &IndividualAnalysisRecord,
    ) -> Result<String, StoreError> {
        let id = Uuid::new_v4().to_string();
        self.state
            .lock()
            .await
            .collections
            .entry(collection.to_string())
            .or_default()
            .push(Stored {
                id: id.clone(),
                record: record.clone(),
            });
        Ok(id)
    }

    async fn list_appended(
        &self,
        collection: &str,
        subject_id: &str,
    ) -> Result<Vec<Stored<IndividualAnalysisRecord>>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .collections
            .get(collection)
            .map(|records| {
                records
                    .iter()
                    .filter(|s| s.record.subject_id == subject_id)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn upsert_aggregate(
        &self,
        record: AggregateAnalysisRecord,
    ) -> Result<UpsertOutcome, StoreError> {
        let mut state = self.state.lock().await;
        let existing = state.by_subject.get(&record.subject_id).cloned();
        match existing {
            Some(id) => {
                state.update(&id, &record)?;
                debug!(subject_id = %record.subject_id, id = %id, "updated aggregate analysis");
                Ok(UpsertOutcome { id, created: false })
            }
            None => {
                let subject_id = record.subject_id.clone();
                let id = state.insert(record)?;
                debug!(subject_id = %subject_id, id = %id, "created aggregate analysis");
                Ok(UpsertOutcome { id, created: true })
            }
        }
    }
}
