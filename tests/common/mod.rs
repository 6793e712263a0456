//! Shared utilities for integration tests.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use shopwatch::domain::{RawRow, SubjectType};
use shopwatch::sources::{SourceAdapter, SourceError, SourceResult};
use shopwatch::store::{
    AppendReceipt, MemoryStore, NewRunRecord, NewSnapshot, RunQuery, RunRecord, Snapshot, SnapshotFilter,
    SnapshotStore, StoreError, StoreResult,
};

#[allow(dead_code)]
pub fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
}

/// Start a programmable mock feed on an ephemeral port.
#[allow(dead_code)]
pub async fn start_programmable_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    tokio::spawn(async move {
                        let mut buf = [0u8; 4096];
                        let _ = socket.read(&mut buf).await;

                        let (status, body) = f().await;
                        let status_text = match status {
                            200 => "200 OK",
                            404 => "404 Not Found",
                            500 => "500 Internal Server Error",
                            502 => "502 Bad Gateway",
                            503 => "503 Service Unavailable",
                            504 => "504 Gateway Timeout",
                            _ => "200 OK",
                        };

                        let response_str = format!(
                            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status_text,
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response_str.as_bytes()).await;
                        let _ = socket.shutdown().await;
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

/// Source that returns the same rows every cycle.
#[allow(dead_code)]
pub struct StaticSource {
    rows: Result<Vec<Value>, SourceError>,
}

#[allow(dead_code)]
impl StaticSource {
    pub fn rows(rows: Vec<Value>) -> Self {
        Self { rows: Ok(rows) }
    }

    pub fn failing(err: SourceError) -> Self {
        Self { rows: Err(err) }
    }
}

#[async_trait]
impl SourceAdapter for StaticSource {
    fn name(&self) -> &str {
        "static"
    }

    async fn fetch(&self) -> SourceResult<Vec<RawRow>> {
        let rows = self.rows.clone()?;
        Ok(rows.into_iter().filter_map(|v| v.as_object().cloned()).collect())
    }
}

/// Memory store with switchable failures.
#[allow(dead_code)]
#[derive(Default)]
pub struct FailingStore {
    pub inner: MemoryStore,
    fail_append: AtomicBool,
    fail_reads_for: std::sync::Mutex<Option<SubjectType>>,
}

#[allow(dead_code)]
impl FailingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_appends(&self, fail: bool) {
        self.fail_append.store(fail, Ordering::SeqCst);
    }

    pub fn fail_reads_for(&self, subject_type: SubjectType) {
        *self.fail_reads_for.lock().unwrap() = Some(subject_type);
    }
}

impl SnapshotStore for FailingStore {
    fn append(
        &self,
        snapshots: Vec<NewSnapshot>,
        observed_at: DateTime<Utc>,
        run: NewRunRecord,
    ) -> StoreResult<AppendReceipt> {
        if self.fail_append.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("disk full".to_string()));
        }
        self.inner.append(snapshots, observed_at, run)
    }

    fn record_run(&self, run: NewRunRecord) -> StoreResult<i64> {
        self.inner.record_run(run)
    }

    fn snapshots(&self, filter: &SnapshotFilter) -> StoreResult<Vec<Snapshot>> {
        if *self.fail_reads_for.lock().unwrap() == Some(filter.subject_type) {
            return Err(StoreError::Unavailable(format!(
                "{} table is locked",
                filter.subject_type
            )));
        }
        self.inner.snapshots(filter)
    }

    fn recent_runs(&self, query: &RunQuery) -> StoreResult<Vec<RunRecord>> {
        self.inner.recent_runs(query)
    }
}
