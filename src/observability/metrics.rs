//! Metrics collection and exposition.
//!
//! # Metrics
//! - `shopwatch_runs_total` (counter): job runs by job, status
//! - `shopwatch_run_duration_seconds` (histogram): run latency by job
//! - `shopwatch_snapshots_written_total` (counter): snapshots by subject type
//! - `shopwatch_rows_rejected_total` (counter): unusable source rows by job
//! - `shopwatch_source_retries_total` (counter): retried fetches by source
//! - `shopwatch_triggers_skipped_total` (counter): by job, reason (overlap, misfire)
//! - `shopwatch_summary_cache_total` (counter): summary lookups by result (hit, miss)

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Duration;

/// Install the Prometheus recorder with its own scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(err) => tracing::error!(address = %addr, error = %err, "Failed to install metrics exporter"),
    }
}

pub fn record_run(job: &str, status: &str, duration: Duration) {
    counter!("shopwatch_runs_total", "job" => job.to_string(), "status" => status.to_string()).increment(1);
    histogram!("shopwatch_run_duration_seconds", "job" => job.to_string()).record(duration.as_secs_f64());
}

pub fn record_snapshots_written(subject_type: &str, count: usize) {
    counter!("shopwatch_snapshots_written_total", "subject_type" => subject_type.to_string())
        .increment(count as u64);
}

pub fn record_rows_rejected(job: &str, count: usize) {
    if count > 0 {
        counter!("shopwatch_rows_rejected_total", "job" => job.to_string()).increment(count as u64);
    }
}

pub fn record_source_retry(source: &str) {
    counter!("shopwatch_source_retries_total", "source" => source.to_string()).increment(1);
}

pub fn record_trigger_skipped(job: &str, reason: &'static str) {
    counter!("shopwatch_triggers_skipped_total", "job" => job.to_string(), "reason" => reason).increment(1);
}

pub fn record_summary_cache(hit: bool) {
    let result = if hit { "hit" } else { "miss" };
    counter!("shopwatch_summary_cache_total", "result" => result).increment(1);
}
