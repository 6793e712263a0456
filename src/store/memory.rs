//! In-memory store. All state sits behind one mutex, so an append is
//! trivially atomic.

use chrono::{DateTime, Utc};
use std::sync::{Mutex, MutexGuard};

use crate::store::{
    AppendReceipt, NewRunRecord, NewSnapshot, RunQuery, RunRecord, Snapshot, SnapshotFilter,
    SnapshotStore, StoreError, StoreResult,
};

#[derive(Default)]
struct Inner {
    snapshots: Vec<Snapshot>,
    runs: Vec<RunRecord>,
}

impl Inner {
    fn push_run(&mut self, run: NewRunRecord) -> i64 {
        let id = self.runs.last().map_or(1, |r| r.id + 1);
        self.runs.push(RunRecord {
            id,
            job_name: run.job_name,
            status: run.status,
            duration_ms: run.duration_ms,
            created_at: run.created_at,
            payload: run.payload,
        });
        id
    }
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".to_string()))
    }

    pub fn snapshot_count(&self) -> usize {
        self.inner.lock().map(|g| g.snapshots.len()).unwrap_or(0)
    }

    pub fn run_count(&self) -> usize {
        self.inner.lock().map(|g| g.runs.len()).unwrap_or(0)
    }
}

impl SnapshotStore for MemoryStore {
    fn append(
        &self,
        snapshots: Vec<NewSnapshot>,
        observed_at: DateTime<Utc>,
        run: NewRunRecord,
    ) -> StoreResult<AppendReceipt> {
        let mut inner = self.lock()?;
        let count = snapshots.len();
        let mut next_id = inner.snapshots.last().map_or(1, |s| s.id + 1);
        for snap in snapshots {
            inner.snapshots.push(Snapshot {
                id: next_id,
                subject_type: snap.subject_type,
                subject_key: snap.subject_key,
                observed_at,
                measure: snap.measure,
                severity: snap.severity,
                metadata: snap.metadata,
            });
            next_id += 1;
        }
        let run_id = inner.push_run(run);
        Ok(AppendReceipt { count, run_id })
    }

    fn record_run(&self, run: NewRunRecord) -> StoreResult<i64> {
        Ok(self.lock()?.push_run(run))
    }

    fn snapshots(&self, filter: &SnapshotFilter) -> StoreResult<Vec<Snapshot>> {
        Ok(self
            .lock()?
            .snapshots
            .iter()
            .filter(|s| filter.matches(s))
            .cloned()
            .collect())
    }

    fn recent_runs(&self, query: &RunQuery) -> StoreResult<Vec<RunRecord>> {
        Ok(self
            .lock()?
            .runs
            .iter()
            .rev()
            .filter(|r| query.matches(r))
            .take(query.limit)
            .cloned()
            .collect())
    }
}
