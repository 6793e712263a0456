//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Scheduler, ingest cycles, sources, summary cache produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, histograms)
//!     → tracing.rs (per-cycle spans carrying job + cycle_id)
//!
//! Consumers:
//!     → stdout (fmt layer, EnvFilter)
//!     → Prometheus scrape endpoint (when enabled)
//! ```
//!
//! # Design Decisions
//! - `RUST_LOG` overrides the configured level
//! - The cycle id in the span is also written into the run payload, so a
//!   RunRecord can be matched to its log lines
//! - Metric updates go through the `metrics` facade; with no recorder
//!   installed they are no-ops

pub mod logging;
pub mod metrics;
pub mod tracing;
