//! Cadenced job runner.
//!
//! # Data Flow
//! ```text
//! per job task:
//!     clock.now() → Cadence::next_after → sleep until slot (or shutdown)
//!     → is_misfire(slot, fired_at, grace)?   drop, count dropped_misfire
//!     → JobState::try_start()?               skip, count skipped_overlap
//!     → spawn supervised run
//!         → Job::run() records its own RunRecord
//!         → panic: scheduler records an error RunRecord instead
//!         → JobState::finish(status)
//! ```
//!
//! # Design Decisions
//! - The trigger loop never awaits a run, so overlapping triggers are seen
//!   and skipped rather than queued
//! - Missed slots coalesce: the loop always arms the next future slot
//! - On shutdown the loop stops arming slots and waits for the in-flight run

pub mod cadence;
pub mod state;

use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

use crate::clock::Clock;
use crate::lifecycle::Shutdown;
use crate::observability::metrics;
use crate::store::{self, NewRunRecord, RunStatus, SharedStore};

pub use cadence::{is_misfire, Cadence, CadenceError};
pub use state::{JobPhase, JobState, JobStats, LastResult};

/// A unit of scheduled work.
#[async_trait]
pub trait Job: Send + Sync + 'static {
    /// Unique job identity.
    fn name(&self) -> &str;

    /// Execute one run. Implementations persist exactly one RunRecord.
    async fn run(&self) -> RunStatus;
}

#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("job `{0}` is already registered")]
    DuplicateJob(String),
}

/// Read-only view of a registered job for the admin surface.
#[derive(Debug, Clone)]
pub struct JobHandle {
    name: String,
    cadence: Cadence,
    state: Arc<JobState>,
}

#[derive(Debug, Clone, Serialize)]
pub struct JobStatus {
    pub name: String,
    pub every_secs: u64,
    pub offset_secs: u64,
    #[serde(flatten)]
    pub stats: JobStats,
}

impl JobHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn status(&self) -> JobStatus {
        JobStatus {
            name: self.name.clone(),
            every_secs: self.cadence.every().as_secs(),
            offset_secs: self.cadence.offset().as_secs(),
            stats: self.state.stats(),
        }
    }
}

struct Entry {
    job: Arc<dyn Job>,
    handle: JobHandle,
}

pub struct Scheduler {
    clock: Arc<dyn Clock>,
    store: SharedStore,
    misfire_grace: Duration,
    entries: Vec<Entry>,
    names: HashSet<String>,
}

impl Scheduler {
    pub fn new(clock: Arc<dyn Clock>, store: SharedStore, misfire_grace: Duration) -> Self {
        Self {
            clock,
            store,
            misfire_grace,
            entries: Vec::new(),
            names: HashSet::new(),
        }
    }

    pub fn register(&mut self, job: Arc<dyn Job>, cadence: Cadence) -> Result<JobHandle, SchedulerError> {
        let name = job.name().to_string();
        if !self.names.insert(name.clone()) {
            return Err(SchedulerError::DuplicateJob(name));
        }
        let handle = JobHandle { name, cadence, state: Arc::new(JobState::new()) };
        self.entries.push(Entry { job, handle: handle.clone() });
        Ok(handle)
    }

    pub fn handles(&self) -> Vec<JobHandle> {
        self.entries.iter().map(|e| e.handle.clone()).collect()
    }

    /// Spawn one trigger loop per job. Each handle resolves after shutdown
    /// once the job's in-flight run (if any) has finished.
    pub fn start(self, shutdown: &Shutdown) -> Vec<JoinHandle<()>> {
        self.entries
            .into_iter()
            .map(|entry| {
                let trigger = TriggerLoop {
                    job: entry.job,
                    handle: entry.handle,
                    clock: Arc::clone(&self.clock),
                    store: Arc::clone(&self.store),
                    misfire_grace: self.misfire_grace,
                };
                tokio::spawn(trigger.run(shutdown.clone()))
            })
            .collect()
    }
}

struct TriggerLoop {
    job: Arc<dyn Job>,
    handle: JobHandle,
    clock: Arc<dyn Clock>,
    store: SharedStore,
    misfire_grace: Duration,
}

impl TriggerLoop {
    async fn run(self, shutdown: Shutdown) {
        let name = self.handle.name.clone();
        let cadence = self.handle.cadence;
        let state = Arc::clone(&self.handle.state);
        let mut last_slot = None;
        let mut in_flight: Option<JoinHandle<()>> = None;

        tracing::info!(
            job = %name,
            every_secs = cadence.every().as_secs(),
            offset_secs = cadence.offset().as_secs(),
            "Job scheduled"
        );

        loop {
            let now = self.clock.now();
            let from = last_slot.map_or(now, |last| now.max(last));
            let slot = cadence.next_after(from);
            let wait = (slot - now).to_std().unwrap_or(Duration::ZERO);

            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = shutdown.wait() => break,
            }
            last_slot = Some(slot);

            let fired_at = self.clock.now();
            if is_misfire(slot, fired_at, self.misfire_grace) {
                state.note_misfire();
                metrics::record_trigger_skipped(&name, "misfire");
                tracing::warn!(job = %name, slot = %slot, fired_at = %fired_at, "Trigger past misfire grace, dropped");
                continue;
            }

            if !state.try_start() {
                metrics::record_trigger_skipped(&name, "overlap");
                tracing::debug!(job = %name, slot = %slot, "Previous run still active, trigger skipped");
                continue;
            }

            in_flight = Some(tokio::spawn(supervise(
                Arc::clone(&self.job),
                Arc::clone(&state),
                Arc::clone(&self.clock),
                Arc::clone(&self.store),
            )));
        }

        if let Some(run) = in_flight {
            let _ = run.await;
        }
        tracing::info!(job = %name, "Job stopped");
    }
}

/// Run the job in its own task so a panic surfaces as a `JoinError` here
/// and can be recorded on the job's behalf.
async fn supervise(job: Arc<dyn Job>, state: Arc<JobState>, clock: Arc<dyn Clock>, store: SharedStore) {
    let name = job.name().to_string();
    let started_at = clock.now();
    let started = Instant::now();

    let outcome = tokio::spawn(async move { job.run().await }).await;

    let status = match outcome {
        Ok(status) => status,
        Err(err) => {
            let reason = if err.is_panic() {
                panic_message(err.into_panic())
            } else {
                "run cancelled".to_string()
            };
            let elapsed = started.elapsed();
            tracing::error!(job = %name, error = %reason, "Job panicked");
            metrics::record_run(&name, RunStatus::Error.as_str(), elapsed);

            let run = NewRunRecord {
                job_name: name.clone(),
                status: RunStatus::Error,
                duration_ms: elapsed.as_millis() as u64,
                created_at: started_at,
                payload: serde_json::json!({ "error": format!("job panicked: {reason}") }),
            };
            if let Err(e) = store::blocking(&store, move |s| s.record_run(run)).await {
                tracing::error!(job = %name, error = %e, "Failed to record panicked run");
            }
            RunStatus::Error
        }
    };

    state.finish(status);
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::store::MemoryStore;

    struct Named(&'static str);

    #[async_trait]
    impl Job for Named {
        fn name(&self) -> &str {
            self.0
        }

        async fn run(&self) -> RunStatus {
            RunStatus::Ok
        }
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let store: SharedStore = Arc::new(MemoryStore::new());
        let mut scheduler = Scheduler::new(Arc::new(SystemClock), store, Duration::from_secs(300));
        let cadence = Cadence::new(60, 2).unwrap();
        scheduler.register(Arc::new(Named("prestashop.payments")), cadence).unwrap();
        let err = scheduler.register(Arc::new(Named("prestashop.payments")), cadence).unwrap_err();
        assert!(matches!(err, SchedulerError::DuplicateJob(name) if name == "prestashop.payments"));
        assert_eq!(scheduler.handles().len(), 1);
    }

    #[test]
    fn test_panic_message_variants() {
        assert_eq!(panic_message(Box::new("boom")), "boom");
        assert_eq!(panic_message(Box::new(String::from("bang"))), "bang");
        assert_eq!(panic_message(Box::new(7_u8)), "unknown panic");
    }

    #[test]
    fn test_status_view() {
        let store: SharedStore = Arc::new(MemoryStore::new());
        let mut scheduler = Scheduler::new(Arc::new(SystemClock), store, Duration::from_secs(300));
        let handle = scheduler
            .register(Arc::new(Named("patife.healthz")), Cadence::new(60, 20).unwrap())
            .unwrap();
        let status = handle.status();
        assert_eq!(status.name, "patife.healthz");
        assert_eq!(status.offset_secs, 20);
        assert_eq!(status.stats.state, JobPhase::Idle);
    }
}
