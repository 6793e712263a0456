//! One poll cycle of one domain.

use async_trait::async_trait;
use chrono::FixedOffset;
use chrono::Offset;
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use tracing::Instrument;
use uuid::Uuid;

use crate::clock::Clock;
use crate::domain::{DomainMapper, MapContext, Observation, Severity};
use crate::ingest::dedup::dedup_latest;
use crate::observability::{metrics, tracing::{cycle_span, new_cycle_id}};
use crate::scheduler::Job;
use crate::sources::{SourceAdapter, SourceError};
use crate::store::{self, AppendReceipt, NewRunRecord, NewSnapshot, RunStatus, SharedStore, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum CycleError {
    #[error("source failed: {0}")]
    Source(#[from] SourceError),

    #[error("all {rejected} rows were unusable")]
    AllRowsRejected { rejected: usize },

    #[error("store failed: {0}")]
    Store(#[from] StoreError),
}

impl CycleError {
    fn stage(&self) -> &'static str {
        match self {
            CycleError::Source(_) => "fetch",
            CycleError::AllRowsRejected { .. } => "map",
            CycleError::Store(_) => "store",
        }
    }
}

/// Outcome of a successful cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    pub cycle_id: Uuid,
    pub receipt: AppendReceipt,
    pub count_raw: usize,
    pub count_unique: usize,
    pub rejected: usize,
    pub worst: Severity,
}

/// Fetch, map, dedup and persist one domain on a schedule.
pub struct IngestJob<M: DomainMapper> {
    name: String,
    source: Arc<dyn SourceAdapter>,
    mapper: M,
    store: SharedStore,
    clock: Arc<dyn Clock>,
    offset: FixedOffset,
}

impl<M: DomainMapper> IngestJob<M> {
    pub fn new(
        name: impl Into<String>,
        source: Arc<dyn SourceAdapter>,
        mapper: M,
        store: SharedStore,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            name: name.into(),
            source,
            mapper,
            store,
            clock,
            offset: chrono::Utc.fix(),
        }
    }

    /// Offset used to read the feed's zone-less timestamps.
    pub fn with_utc_offset(mut self, offset: FixedOffset) -> Self {
        self.offset = offset;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run one cycle and record its RunRecord, success or failure.
    pub async fn run_cycle(&self) -> Result<CycleReport, CycleError> {
        let cycle_id = new_cycle_id();
        let span = cycle_span(&self.name, cycle_id);
        self.run_cycle_inner(cycle_id).instrument(span).await
    }

    async fn run_cycle_inner(&self, cycle_id: Uuid) -> Result<CycleReport, CycleError> {
        let now = self.clock.now();
        let started = Instant::now();

        let result = self.ingest(cycle_id, now, started).await;
        let elapsed = started.elapsed();

        match &result {
            Ok(report) => {
                metrics::record_run(&self.name, RunStatus::Ok.as_str(), elapsed);
                metrics::record_snapshots_written(self.mapper.subject_type().as_str(), report.receipt.count);
                tracing::info!(
                    count_raw = report.count_raw,
                    count_unique = report.count_unique,
                    rejected = report.rejected,
                    worst = %report.worst,
                    duration_ms = elapsed.as_millis() as u64,
                    "Cycle stored"
                );
            }
            Err(err) => {
                metrics::record_run(&self.name, RunStatus::Error.as_str(), elapsed);
                tracing::error!(stage = err.stage(), error = %err, "Cycle failed");

                let run = NewRunRecord {
                    job_name: self.name.clone(),
                    status: RunStatus::Error,
                    duration_ms: elapsed.as_millis() as u64,
                    created_at: now,
                    payload: json!({
                        "error": err.to_string(),
                        "stage": err.stage(),
                        "cycle_id": cycle_id.to_string(),
                    }),
                };
                if let Err(e) = store::blocking(&self.store, move |s| s.record_run(run)).await {
                    tracing::error!(error = %e, "Failed to record failed run");
                }
            }
        }

        result
    }

    async fn ingest(
        &self,
        cycle_id: Uuid,
        now: chrono::DateTime<chrono::Utc>,
        started: Instant,
    ) -> Result<CycleReport, CycleError> {
        let rows = self.source.fetch().await?;
        let ctx = MapContext::new(now, self.offset);

        let mut entities = Vec::with_capacity(rows.len());
        let mut rejected = 0;
        for row in &rows {
            match self.mapper.map_row(row, &ctx) {
                Ok(entity) => entities.push(entity),
                Err(reason) => {
                    rejected += 1;
                    tracing::debug!(reason = %reason, "Row rejected");
                }
            }
        }
        metrics::record_rows_rejected(&self.name, rejected);

        if !rows.is_empty() && entities.is_empty() {
            return Err(CycleError::AllRowsRejected { rejected });
        }

        let unique = dedup_latest(entities);
        let worst = Severity::worst_of(unique.iter().map(|e| e.severity()));
        let subject_type = self.mapper.subject_type();
        let snapshots: Vec<NewSnapshot> = unique
            .iter()
            .map(|e| NewSnapshot {
                subject_type,
                subject_key: e.subject_key().to_string(),
                measure: e.measure(),
                severity: e.severity(),
                metadata: e.metadata(),
            })
            .collect();

        let count_raw = rows.len();
        let count_unique = snapshots.len();
        let run = NewRunRecord {
            job_name: self.name.clone(),
            status: RunStatus::Ok,
            duration_ms: started.elapsed().as_millis() as u64,
            created_at: now,
            payload: json!({
                "count_raw": count_raw,
                "count_unique": count_unique,
                "rejected": rejected,
                "worst": worst,
                "cycle_id": cycle_id.to_string(),
            }),
        };

        let receipt = store::blocking(&self.store, move |s| s.append(snapshots, now, run)).await?;

        Ok(CycleReport { cycle_id, receipt, count_raw, count_unique, rejected, worst })
    }
}

#[async_trait]
impl<M: DomainMapper> Job for IngestJob<M> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self) -> RunStatus {
        match self.run_cycle().await {
            Ok(_) => RunStatus::Ok,
            Err(_) => RunStatus::Error,
        }
    }
}
