//! DuckDB-backed analysis store.

use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use dealflow_core::{AggregateAnalysisRecord, IndividualAnalysisRecord, Stored};
use duckdb::{Connection, OptionalExt, Row, params};
use tracing::{debug, info};
use uuid::Uuid;

use crate::{AnalysisStore, StoreError, UpsertOutcome};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS aggregate_analyses (
    id                VARCHAR NOT NULL,
    subject_id        VARCHAR PRIMARY KEY,
    analysis_type     VARCHAR NOT NULL,
    analysis_data     VARCHAR NOT NULL,
    concatenated_text VARCHAR NOT NULL,
    data_sources      VARCHAR NOT NULL,
    status            VARCHAR NOT NULL,
    word_count        BIGINT  NOT NULL,
    character_count   BIGINT  NOT NULL,
    created_at        VARCHAR NOT NULL,
    updated_at        VARCHAR NOT NULL
);
CREATE SEQUENCE IF NOT EXISTS individual_analyses_seq START 1;
CREATE TABLE IF NOT EXISTS individual_analyses (
    id            VARCHAR PRIMARY KEY,
    seq           BIGINT  NOT NULL DEFAULT nextval('individual_analyses_seq'),
    collection    VARCHAR NOT NULL,
    subject_id    VARCHAR NOT NULL,
    analysis_type VARCHAR NOT NULL,
    analysis_data VARCHAR NOT NULL,
    status        VARCHAR NOT NULL,
    created_at    VARCHAR NOT NULL
);
";

const AGGREGATE_COLUMNS: &str = "id, subject_id, analysis_type, analysis_data, concatenated_text, \
     data_sources, status, word_count, character_count, created_at, updated_at";

/// DuckDB store for analysis records.
///
/// `aggregate_analyses` holds one row per subject (`subject_id` is the
/// primary key); `individual_analyses` is append-only.
///
/// Supports both in-memory (ephemeral) and persistent (file-backed) modes.
/// Use [`open`](Self::open) for in-memory and [`open_persistent`](Self::open_persistent)
/// for file-backed storage that survives across process restarts.
pub struct DuckStore {
    conn: Mutex<Connection>,
}

impl DuckStore {
    /// Open an in-memory DuckDB database.
    pub fn open() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    /// Open or create a persistent DuckDB database at the given path.
    pub fn open_persistent(path: &Path) -> Result<Self, StoreError> {
        let store = Self::init(Connection::open(path)?)?;
        info!(path = %path.display(), "opened analysis store");
        Ok(store)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Other("duckdb connection mutex poisoned".into()))
    }

    // ── Counts ──

    /// Number of rows in `aggregate_analyses`.
    pub fn aggregate_count(&self) -> Result<usize, StoreError> {
        self.count_table("aggregate_analyses")
    }

    /// Number of rows in `individual_analyses`.
    pub fn individual_count(&self) -> Result<usize, StoreError> {
        self.count_table("individual_analyses")
    }

    fn count_table(&self, table: &str) -> Result<usize, StoreError> {
        let sql = format!("SELECT count(*)::BIGINT AS cnt FROM {table}");
        let conn = self.lock()?;
        let count: i64 = conn.query_row(&sql, [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

fn ts(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(s: &str) -> Result<DateTime<Utc>, StoreError> {
    Ok(DateTime::parse_from_rfc3339(s)?.with_timezone(&Utc))
}

/// Raw text columns of an aggregate row; decoded outside the row callback.
struct AggregateRow {
    id: String,
    subject_id: String,
    analysis_type: String,
    analysis_data: String,
    concatenated_text: String,
    data_sources: String,
    status: String,
    word_count: i64,
    character_count: i64,
    created_at: String,
    updated_at: String,
}

impl AggregateRow {
    fn from_row(row: &Row<'_>) -> duckdb::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            subject_id: row.get(1)?,
            analysis_type: row.get(2)?,
            analysis_data: row.get(3)?,
            concatenated_text: row.get(4)?,
            data_sources: row.get(5)?,
            status: row.get(6)?,
            word_count: row.get(7)?,
            character_count: row.get(8)?,
            created_at: row.get(9)?,
            updated_at: row.get(10)?,
        })
    }

    fn decode(self) -> Result<Stored<AggregateAnalysisRecord>, StoreError> {
        Ok(Stored {
            id: self.id,
            record: AggregateAnalysisRecord {
                subject_id: self.subject_id,
                analysis_type: self.analysis_type,
                analysis_data: serde_json::from_str(&self.analysis_data)?,
                concatenated_text: self.concatenated_text,
                data_sources: serde_json::from_str(&self.data_sources)?,
                status: serde_json::from_value(serde_json::Value::String(self.status))?,
                word_count: self.word_count as usize,
                character_count: self.character_count as usize,
                created_at: parse_ts(&self.created_at)?,
                updated_at: parse_ts(&self.updated_at)?,
            },
        })
    }
}

/// Encoded column values shared by insert, update, and upsert.
struct AggregateValues {
    analysis_data: String,
    data_sources: String,
    status: String,
    created_at: String,
    updated_at: String,
}

impl AggregateValues {
    fn encode(record: &AggregateAnalysisRecord) -> Result<Self, StoreError> {
        let status = serde_json::to_value(record.status)?
            .as_str()
            .unwrap_or("completed")
            .to_string();
        Ok(Self {
            analysis_data: serde_json::to_string(&record.analysis_data)?,
            data_sources: serde_json::to_string(&record.data_sources)?,
            status,
            created_at: ts(&record.created_at),
            updated_at: ts(&record.updated_at),
        })
    }
}

fn find_aggregate(
    conn: &Connection,
    subject_id: &str,
) -> Result<Option<Stored<AggregateAnalysisRecord>>, StoreError> {
    let sql = format!("SELECT {AGGREGATE_COLUMNS} FROM aggregate_analyses WHERE subject_id = ?");
    let row = conn
        .query_row(&sql, [subject_id], AggregateRow::from_row)
        .optional()?;
    row.map(AggregateRow::decode).transpose()
}

#[async_trait]
impl AnalysisStore for DuckStore {
    async fn find_by_subject_id(
        &self,
        subject_id: &str,
    ) -> Result<Option<Stored<AggregateAnalysisRecord>>, StoreError> {
        let conn = self.lock()?;
        find_aggregate(&conn, subject_id)
    }

    async fn insert(&self, record: &AggregateAnalysisRecord) -> Result<String, StoreError> {
        let conn = self.lock()?;
        if find_aggregate(&conn, &record.subject_id)?.is_some() {
            return Err(StoreError::Duplicate(record.subject_id.clone()));
        }
        let id = Uuid::new_v4().to_string();
        let v = AggregateValues::encode(record)?;
        conn.execute(
            &format!(
                "INSERT INTO aggregate_analyses ({AGGREGATE_COLUMNS})
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
            ),
            params![
                id,
                record.subject_id,
                record.analysis_type,
                v.analysis_data,
                record.concatenated_text,
                v.data_sources,
                v.status,
                record.word_count as i64,
                record.character_count as i64,
                v.created_at,
                v.updated_at,
            ],
        )?;
        Ok(id)
    }

    async fn update(&self, id: &str, record: &AggregateAnalysisRecord) -> Result<(), StoreError> {
        let conn = self.lock()?;
        let v = AggregateValues::encode(record)?;
        let changed = conn.execute(
            "UPDATE aggregate_analyses SET
                analysis_type = ?, analysis_data = ?, concatenated_text = ?,
                data_sources = ?, status = ?, word_count = ?, character_count = ?,
                updated_at = ?
             WHERE id = ?",
            params![
                record.analysis_type,
                v.analysis_data,
                record.concatenated_text,
                v.data_sources,
                v.status,
                record.word_count as i64,
                record.character_count as i64,
                v.updated_at,
                id,
            ],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn append(
        &self,
        collection: &str,
        record: &IndividualAnalysisRecord,
    ) -> Result<String, StoreError> {
        let id = Uuid::new_v4().to_string();
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO individual_analyses
                (id, collection, subject_id, analysis_type, analysis_data, status, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
            params![
                id,
                collection,
                record.subject_id,
                record.analysis_type,
                serde_json::to_string(&record.analysis_data)?,
                record.status.as_str(),
                ts(&record.created_at),
            ],
        )?;
        Ok(id)
    }

    async fn list_appended(
        &self,
        collection: &str,
        subject_id: &str,
    ) -> Result<Vec<Stored<IndividualAnalysisRecord>>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, subject_id, analysis_type, analysis_data, created_at
             FROM individual_analyses
             WHERE collection = ? AND subject_id = ?
             ORDER BY seq",
        )?;
        let rows = stmt.query_map([collection, subject_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
            ))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (id, subject_id, analysis_type, data, created_at) = row?;
            let analysis_data: dealflow_core::StepResult = serde_json::from_str(&data)?;
            out.push(Stored {
                id,
                record: IndividualAnalysisRecord {
                    subject_id,
                    analysis_type,
                    status: analysis_data.status(),
                    analysis_data,
                    created_at: parse_ts(&created_at)?,
                },
            });
        }
        Ok(out)
    }

    async fn upsert_aggregate(
        &self,
        record: AggregateAnalysisRecord,
    ) -> Result<UpsertOutcome, StoreError> {
        let mut conn = self.lock()?;
        let proposed = Uuid::new_v4().to_string();
        let v = AggregateValues::encode(&record)?;

        let tx = conn.transaction()?;
        tx.execute(
            &format!(
                "INSERT INTO aggregate_analyses ({AGGREGATE_COLUMNS})
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                 ON CONFLICT (subject_id) DO UPDATE SET
                    analysis_type = excluded.analysis_type,
                    analysis_data = excluded.analysis_data,
                    concatenated_text = excluded.concatenated_text,
                    data_sources = excluded.data_sources,
                    status = excluded.status,
                    word_count = excluded.word_count,
                    character_count = excluded.character_count,
                    updated_at = excluded.updated_at"
            ),
            params![
                proposed,
                record.subject_id,
                record.analysis_type,
                v.analysis_data,
                record.concatenated_text,
                v.data_sources,
                v.status,
                record.word_count as i64,
                record.character_count as i64,
                v.created_at,
                v.updated_at,
            ],
        )?;
        let id: String = tx.query_row(
            "SELECT id FROM aggregate_analyses WHERE subject_id = ?",
            [&record.subject_id],
            |row| row.get(0),
        )?;
        tx.commit()?;

        let created = id == proposed;
        debug!(subject_id = %record.subject_id, id = %id, created, "upserted aggregate analysis");
        Ok(UpsertOutcome { id, created })
    }
}
