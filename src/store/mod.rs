//! Append-only snapshot and run persistence.
//!
//! # Data Flow
//! ```text
//! ingest cycle
//!     → append(snapshots, observed_at, run)   one transaction
//!         ├─ snapshots: one row per subject, ids strictly increasing
//!         └─ runs:      the cycle's RunRecord
//!     → record_run(run)                       failure path only
//!
//! read side
//!     → snapshots(filter)   [since, until) per subject type, id order
//!     → recent_runs(query)  newest first
//! ```
//!
//! # Design Decisions
//! - No update or delete API exists; history is immutable
//! - Severity is stored as written and never recomputed on read
//! - Two backends share one trait: memory (tests, ephemeral) and SQLite

pub mod memory;
pub mod sqlite;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::domain::{Severity, SubjectType};

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Snapshot as produced by an ingest cycle, before it gets an id and time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewSnapshot {
    pub subject_type: SubjectType,
    pub subject_key: String,
    pub measure: Option<f64>,
    pub severity: Severity,
    pub metadata: serde_json::Value,
}

/// Immutable stored observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Insertion sequence, strictly increasing.
    pub id: i64,
    pub subject_type: SubjectType,
    pub subject_key: String,
    pub observed_at: DateTime<Utc>,
    pub measure: Option<f64>,
    pub severity: Severity,
    pub metadata: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Ok,
    Error,
}

impl RunStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RunStatus::Ok => "ok",
            RunStatus::Error => "error",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunStatus {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ok" => Ok(RunStatus::Ok),
            "error" => Ok(RunStatus::Error),
            other => Err(StoreError::Corrupt(format!("unknown run status `{other}`"))),
        }
    }
}

/// Run outcome to be recorded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewRunRecord {
    pub job_name: String,
    pub status: RunStatus,
    pub duration_ms: u64,
    pub created_at: DateTime<Utc>,
    pub payload: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub id: i64,
    pub job_name: String,
    pub status: RunStatus,
    pub duration_ms: u64,
    pub created_at: DateTime<Utc>,
    pub payload: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AppendReceipt {
    pub count: usize,
    pub run_id: i64,
}

/// Snapshot read filter. Bounds are `[since, until)`.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotFilter {
    pub subject_type: SubjectType,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl SnapshotFilter {
    pub fn all(subject_type: SubjectType) -> Self {
        Self { subject_type, since: None, until: None }
    }

    pub fn between(subject_type: SubjectType, since: DateTime<Utc>, until: DateTime<Utc>) -> Self {
        Self { subject_type, since: Some(since), until: Some(until) }
    }

    pub fn matches(&self, snap: &Snapshot) -> bool {
        snap.subject_type == self.subject_type
            && self.since.map_or(true, |s| snap.observed_at >= s)
            && self.until.map_or(true, |u| snap.observed_at < u)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunQuery {
    pub limit: usize,
    pub status: Option<RunStatus>,
    pub job_name: Option<String>,
}

impl Default for RunQuery {
    fn default() -> Self {
        Self { limit: 50, status: None, job_name: None }
    }
}

impl RunQuery {
    pub fn matches(&self, run: &RunRecord) -> bool {
        self.status.map_or(true, |s| run.status == s)
            && self.job_name.as_deref().map_or(true, |j| run.job_name == j)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("corrupt stored row: {0}")]
    Corrupt(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence contract for snapshots and run records.
pub trait SnapshotStore: Send + Sync + 'static {
    /// Insert all snapshots stamped with `observed_at` plus the cycle's run
    /// record. Either everything persists or nothing does.
    fn append(
        &self,
        snapshots: Vec<NewSnapshot>,
        observed_at: DateTime<Utc>,
        run: NewRunRecord,
    ) -> StoreResult<AppendReceipt>;

    /// Record a run on its own (used when a cycle fails before `append`).
    fn record_run(&self, run: NewRunRecord) -> StoreResult<i64>;

    /// Snapshots matching `filter`, in insertion order.
    fn snapshots(&self, filter: &SnapshotFilter) -> StoreResult<Vec<Snapshot>>;

    /// Runs matching `query`, newest first, at most `query.limit`.
    fn recent_runs(&self, query: &RunQuery) -> StoreResult<Vec<RunRecord>>;
}

pub type SharedStore = Arc<dyn SnapshotStore>;

/// Run a store call on the blocking pool so SQLite I/O never stalls a
/// runtime worker.
pub async fn blocking<T, F>(store: &SharedStore, f: F) -> StoreResult<T>
where
    T: Send + 'static,
    F: FnOnce(&dyn SnapshotStore) -> StoreResult<T> + Send + 'static,
{
    let store = Arc::clone(store);
    tokio::task::spawn_blocking(move || f(store.as_ref()))
        .await
        .map_err(|e| StoreError::Unavailable(format!("store task failed: {e}")))?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_is_half_open() {
        let t0 = DateTime::from_timestamp(1_000, 0).unwrap();
        let t1 = DateTime::from_timestamp(2_000, 0).unwrap();
        let filter = SnapshotFilter::between(SubjectType::Payment, t0, t1);
        let mut snap = Snapshot {
            id: 1,
            subject_type: SubjectType::Payment,
            subject_key: "MB Way".into(),
            observed_at: t0,
            measure: None,
            severity: Severity::Critical,
            metadata: serde_json::Value::Null,
        };
        assert!(filter.matches(&snap));
        snap.observed_at = t1;
        assert!(!filter.matches(&snap));
        snap.observed_at = t0;
        snap.subject_type = SubjectType::Pagespeed;
        assert!(!filter.matches(&snap));
    }

    #[test]
    fn test_run_status_parse() {
        assert_eq!("ok".parse::<RunStatus>().unwrap(), RunStatus::Ok);
        assert!("warning".parse::<RunStatus>().is_err());
    }
}
