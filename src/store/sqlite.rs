//! SQLite-backed store.
//!
//! Timestamps are epoch milliseconds, metadata and payloads are JSON text.
//! Each `append` runs in a single transaction; dropping an uncommitted
//! transaction rolls it back.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Transaction};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use crate::domain::{Severity, SubjectType};
use crate::store::{
    AppendReceipt, NewRunRecord, NewSnapshot, RunQuery, RunRecord, RunStatus, Snapshot,
    SnapshotFilter, SnapshotStore, StoreError, StoreResult,
};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS snapshots (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    subject_type TEXT    NOT NULL,
    subject_key  TEXT    NOT NULL,
    observed_at  INTEGER NOT NULL,
    measure      REAL,
    severity     TEXT    NOT NULL,
    metadata     TEXT    NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_snapshots_type_time ON snapshots (subject_type, observed_at);

CREATE TABLE IF NOT EXISTS runs (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    job_name    TEXT    NOT NULL,
    status      TEXT    NOT NULL,
    duration_ms INTEGER NOT NULL,
    created_at  INTEGER NOT NULL,
    payload     TEXT    NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_runs_job ON runs (job_name, id);
";

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> StoreResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> StoreResult<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Unavailable("sqlite connection lock poisoned".to_string()))
    }
}

fn insert_run(tx: &Transaction<'_>, run: &NewRunRecord) -> StoreResult<i64> {
    tx.execute(
        "INSERT INTO runs (job_name, status, duration_ms, created_at, payload)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            run.job_name,
            run.status.as_str(),
            run.duration_ms as i64,
            run.created_at.timestamp_millis(),
            serde_json::to_string(&run.payload)?,
        ],
    )?;
    Ok(tx.last_insert_rowid())
}

fn from_millis(ms: i64) -> StoreResult<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms)
        .ok_or_else(|| StoreError::Corrupt(format!("timestamp out of range: {ms}")))
}

struct SnapshotRow {
    id: i64,
    subject_type: String,
    subject_key: String,
    observed_at: i64,
    measure: Option<f64>,
    severity: String,
    metadata: String,
}

impl SnapshotRow {
    fn into_snapshot(self) -> StoreResult<Snapshot> {
        Ok(Snapshot {
            id: self.id,
            subject_type: self
                .subject_type
                .parse::<SubjectType>()
                .map_err(|e| StoreError::Corrupt(e.to_string()))?,
            subject_key: self.subject_key,
            observed_at: from_millis(self.observed_at)?,
            measure: self.measure,
            severity: self
                .severity
                .parse::<Severity>()
                .map_err(|e| StoreError::Corrupt(e.to_string()))?,
            metadata: serde_json::from_str(&self.metadata)?,
        })
    }
}

struct RunRow {
    id: i64,
    job_name: String,
    status: String,
    duration_ms: i64,
    created_at: i64,
    payload: String,
}

impl RunRow {
    fn into_record(self) -> StoreResult<RunRecord> {
        Ok(RunRecord {
            id: self.id,
            job_name: self.job_name,
            status: self.status.parse::<RunStatus>()?,
            duration_ms: self.duration_ms.max(0) as u64,
            created_at: from_millis(self.created_at)?,
            payload: serde_json::from_str(&self.payload)?,
        })
    }
}

impl SnapshotStore for SqliteStore {
    fn append(
        &self,
        snapshots: Vec<NewSnapshot>,
        observed_at: DateTime<Utc>,
        run: NewRunRecord,
    ) -> StoreResult<AppendReceipt> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let observed_ms = observed_at.timestamp_millis();
        {
            let mut stmt = tx.prepare(
                "INSERT INTO snapshots (subject_type, subject_key, observed_at, measure, severity, metadata)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for snap in &snapshots {
                stmt.execute(params![
                    snap.subject_type.as_str(),
                    snap.subject_key,
                    observed_ms,
                    snap.measure,
                    snap.severity.as_str(),
                    serde_json::to_string(&snap.metadata)?,
                ])?;
            }
        }
        let run_id = insert_run(&tx, &run)?;
        tx.commit()?;
        Ok(AppendReceipt { count: snapshots.len(), run_id })
    }

    fn record_run(&self, run: NewRunRecord) -> StoreResult<i64> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let id = insert_run(&tx, &run)?;
        tx.commit()?;
        Ok(id)
    }

    fn snapshots(&self, filter: &SnapshotFilter) -> StoreResult<Vec<Snapshot>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, subject_type, subject_key, observed_at, measure, severity, metadata
             FROM snapshots
             WHERE subject_type = ?1 AND observed_at >= ?2 AND observed_at < ?3
             ORDER BY id ASC",
        )?;
        let since = filter.since.map_or(i64::MIN, |t| t.timestamp_millis());
        let until = filter.until.map_or(i64::MAX, |t| t.timestamp_millis());
        let rows = stmt.query_map(params![filter.subject_type.as_str(), since, until], |row| {
            Ok(SnapshotRow {
                id: row.get(0)?,
                subject_type: row.get(1)?,
                subject_key: row.get(2)?,
                observed_at: row.get(3)?,
                measure: row.get(4)?,
                severity: row.get(5)?,
                metadata: row.get(6)?,
            })
        })?;
        let snapshots = rows
            .map(|r| r.map_err(StoreError::from).and_then(SnapshotRow::into_snapshot))
            .collect();
        snapshots
    }

    fn recent_runs(&self, query: &RunQuery) -> StoreResult<Vec<RunRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, job_name, status, duration_ms, created_at, payload
             FROM runs
             WHERE (?1 IS NULL OR status = ?1) AND (?2 IS NULL OR job_name = ?2)
             ORDER BY id DESC
             LIMIT ?3",
        )?;
        let status = query.status.map(|s| s.as_str());
        let limit = i64::try_from(query.limit).unwrap_or(i64::MAX);
        let rows = stmt.query_map(params![status, query.job_name.as_deref(), limit], |row| {
            Ok(RunRow {
                id: row.get(0)?,
                job_name: row.get(1)?,
                status: row.get(2)?,
                duration_ms: row.get(3)?,
                created_at: row.get(4)?,
                payload: row.get(5)?,
            })
        })?;
        let runs = rows
            .map(|r| r.map_err(StoreError::from).and_then(RunRow::into_record))
            .collect();
        runs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn snap(key: &str, severity: Severity, measure: Option<f64>) -> NewSnapshot {
        NewSnapshot {
            subject_type: SubjectType::DelayedOrder,
            subject_key: key.to_string(),
            measure,
            severity,
            metadata: json!({"reference": key}),
        }
    }

    fn run(status: RunStatus) -> NewRunRecord {
        NewRunRecord {
            job_name: "prestashop.orders_delayed".to_string(),
            status,
            duration_ms: 12,
            created_at: DateTime::from_timestamp_millis(1_700_000_000_123).unwrap(),
            payload: json!({"count_raw": 2}),
        }
    }

    #[test]
    fn test_append_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::open(dir.path().join("watch.db")).unwrap();
        let at = DateTime::from_timestamp_millis(1_700_000_000_000).unwrap();

        let receipt = store
            .append(
                vec![snap("10", Severity::Critical, None), snap("11", Severity::Ok, Some(1.0))],
                at,
                run(RunStatus::Ok),
            )
            .unwrap();
        assert_eq!(receipt.count, 2);

        let rows = store.snapshots(&SnapshotFilter::all(SubjectType::DelayedOrder)).unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows[0].id < rows[1].id);
        assert_eq!(rows[0].observed_at, at);
        assert_eq!(rows[0].measure, None);
        assert_eq!(rows[0].severity, Severity::Critical);
        assert_eq!(rows[1].metadata, json!({"reference": "11"}));

        let runs = store.recent_runs(&RunQuery::default()).unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].id, receipt.run_id);
        assert_eq!(runs[0].payload, json!({"count_raw": 2}));
        assert_eq!(runs[0].created_at.timestamp_millis(), 1_700_000_000_123);
    }

    #[test]
    fn test_failing_run_insert_rolls_back_snapshots() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .lock()
            .unwrap()
            .execute_batch(
                "CREATE TRIGGER reject_run BEFORE INSERT ON runs
                 WHEN NEW.job_name = 'rejected'
                 BEGIN SELECT RAISE(ABORT, 'run rejected'); END;",
            )
            .unwrap();
        let at = DateTime::from_timestamp(1_700_000_000, 0).unwrap();

        let mut rejected = run(RunStatus::Ok);
        rejected.job_name = "rejected".to_string();
        let result = store.append(
            vec![snap("10", Severity::Critical, None), snap("11", Severity::Warning, Some(2.0))],
            at,
            rejected,
        );
        assert!(result.is_err());
        assert!(store.snapshots(&SnapshotFilter::all(SubjectType::DelayedOrder)).unwrap().is_empty());
        assert!(store.recent_runs(&RunQuery::default()).unwrap().is_empty());

        // The connection is usable again once the failed transaction is gone.
        let receipt = store.append(vec![snap("10", Severity::Critical, None)], at, run(RunStatus::Ok)).unwrap();
        assert_eq!(receipt.count, 1);
        assert_eq!(store.snapshots(&SnapshotFilter::all(SubjectType::DelayedOrder)).unwrap().len(), 1);
    }

    #[test]
    fn test_time_bounds_and_type_filter() {
        let store = SqliteStore::open_in_memory().unwrap();
        let t = |s: i64| DateTime::from_timestamp(s, 0).unwrap();
        store.append(vec![snap("1", Severity::Ok, Some(0.0))], t(100), run(RunStatus::Ok)).unwrap();
        store.append(vec![snap("1", Severity::Ok, Some(0.0))], t(200), run(RunStatus::Ok)).unwrap();

        let window = store
            .snapshots(&SnapshotFilter::between(SubjectType::DelayedOrder, t(100), t(200)))
            .unwrap();
        assert_eq!(window.len(), 1);
        assert_eq!(window[0].observed_at, t(100));

        assert!(store.snapshots(&SnapshotFilter::all(SubjectType::Payment)).unwrap().is_empty());
    }

    #[test]
    fn test_run_filters() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.record_run(run(RunStatus::Ok)).unwrap();
        let err_id = store.record_run(run(RunStatus::Error)).unwrap();

        let errors = store
            .recent_runs(&RunQuery { limit: 5, status: Some(RunStatus::Error), job_name: None })
            .unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].id, err_id);

        let none = store
            .recent_runs(&RunQuery { limit: 5, status: None, job_name: Some("other".into()) })
            .unwrap();
        assert!(none.is_empty());
    }
}
