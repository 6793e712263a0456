//! Per-job run state and trigger counters.
//!
//! # State machine
//! ```text
//! Idle ──try_start──▶ Running ──finish(ok)────▶ Idle (last = Succeeded)
//!                        └─────finish(error)──▶ Idle (last = Failed)
//! ```
//! A trigger that finds the job Running is counted as an overlap skip.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};

use crate::store::RunStatus;

const IDLE: u8 = 0;
const RUNNING: u8 = 1;

// `last` starts at 0: never ran.
const SUCCEEDED: u8 = 1;
const FAILED: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobPhase {
    Idle,
    Running,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LastResult {
    Succeeded,
    Failed,
}

#[derive(Debug, Default)]
pub struct JobState {
    phase: AtomicU8,
    last: AtomicU8,
    started: AtomicU64,
    skipped_overlap: AtomicU64,
    dropped_misfire: AtomicU64,
}

/// Point-in-time copy of a [`JobState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct JobStats {
    pub state: JobPhase,
    pub last_result: Option<LastResult>,
    pub started: u64,
    pub skipped_overlap: u64,
    pub dropped_misfire: u64,
}

impl JobState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the job for one run. Fails if a run is already in flight.
    pub fn try_start(&self) -> bool {
        let claimed = self
            .phase
            .compare_exchange(IDLE, RUNNING, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if claimed {
            self.started.fetch_add(1, Ordering::Relaxed);
        } else {
            self.skipped_overlap.fetch_add(1, Ordering::Relaxed);
        }
        claimed
    }

    pub fn finish(&self, status: RunStatus) {
        let last = match status {
            RunStatus::Ok => SUCCEEDED,
            RunStatus::Error => FAILED,
        };
        self.last.store(last, Ordering::Release);
        self.phase.store(IDLE, Ordering::Release);
    }

    pub fn note_misfire(&self) {
        self.dropped_misfire.fetch_add(1, Ordering::Relaxed);
    }

    pub fn is_running(&self) -> bool {
        self.phase.load(Ordering::Acquire) == RUNNING
    }

    pub fn stats(&self) -> JobStats {
        let state = if self.is_running() { JobPhase::Running } else { JobPhase::Idle };
        let last_result = match self.last.load(Ordering::Acquire) {
            SUCCEEDED => Some(LastResult::Succeeded),
            FAILED => Some(LastResult::Failed),
            _ => None,
        };
        JobStats {
            state,
            last_result,
            started: self.started.load(Ordering::Relaxed),
            skipped_overlap: self.skipped_overlap.load(Ordering::Relaxed),
            dropped_misfire: self.dropped_misfire.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_flight() {
        let state = JobState::new();
        assert!(state.try_start());
        assert!(!state.try_start());
        assert!(state.is_running());

        state.finish(RunStatus::Error);
        let stats = state.stats();
        assert_eq!(stats.state, JobPhase::Idle);
        assert_eq!(stats.last_result, Some(LastResult::Failed));
        assert_eq!(stats.started, 1);
        assert_eq!(stats.skipped_overlap, 1);

        assert!(state.try_start());
        state.finish(RunStatus::Ok);
        assert_eq!(state.stats().last_result, Some(LastResult::Succeeded));
        assert_eq!(state.stats().started, 2);
    }

    #[test]
    fn test_fresh_state() {
        let stats = JobState::new().stats();
        assert_eq!(stats.state, JobPhase::Idle);
        assert_eq!(stats.last_result, None);
        assert_eq!(stats.dropped_misfire, 0);
    }
}
