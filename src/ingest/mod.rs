//! Ingestion pipeline.
//!
//! # Data Flow
//! ```text
//! Scheduler trigger
//!     → IngestJob::run_cycle (cycle.rs), one `now` per cycle
//!         → SourceAdapter::fetch          (retries inside the adapter)
//!         → DomainMapper::map_row         (rejected rows counted, skipped)
//!         → dedup_latest (dedup.rs)       (one entity per subject key)
//!         → SnapshotStore::append         (snapshots + RunRecord, atomic)
//!     on any failure
//!         → SnapshotStore::record_run     (status = error, nothing else)
//! ```

pub mod cycle;
pub mod dedup;

pub use cycle::{CycleError, CycleReport, IngestJob};
pub use dedup::dedup_latest;
