//! Admin API over a real listener.

use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use shopwatch::admin::{serve, setup_admin_router, AdminState};
use shopwatch::clock::{Clock, ManualClock};
use shopwatch::domain::{Severity, SubjectType};
use shopwatch::store::{MemoryStore, NewRunRecord, NewSnapshot, RunStatus, SharedStore, SnapshotStore};
use shopwatch::summary::{DashboardService, MemoryCache, Summary};
use shopwatch::Shutdown;

mod common;
use common::utc;

const KEY: &str = "s3cret";

struct Admin {
    addr: SocketAddr,
    shutdown: Shutdown,
}

impl Admin {
    fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    async fn get(&self, path: &str) -> reqwest::Response {
        reqwest::Client::new()
            .get(self.url(path))
            .bearer_auth(KEY)
            .send()
            .await
            .unwrap()
    }
}

async fn start_admin(store: SharedStore) -> Admin {
    let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(utc(2025, 6, 13, 12, 0)));
    let dashboard = DashboardService::new(
        Arc::clone(&store),
        Arc::new(MemoryCache::<Arc<Summary>>::new(Arc::clone(&clock))),
        Arc::clone(&clock),
        Duration::from_secs(30),
    );
    let state = AdminState {
        api_key: Arc::from(KEY),
        store,
        jobs: Arc::new(Vec::new()),
        dashboard: Arc::new(dashboard),
        started_at: clock.now(),
        clock,
    };

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let router = setup_admin_router(state, Duration::from_secs(5));
    tokio::spawn(serve(listener, router, shutdown.clone()));
    Admin { addr, shutdown }
}

fn seeded_store() -> SharedStore {
    let store = MemoryStore::new();
    let at = utc(2025, 6, 13, 11, 58);
    let snap = |key: &str, severity, measure| NewSnapshot {
        subject_type: SubjectType::Payment,
        subject_key: key.to_string(),
        measure: Some(measure),
        severity,
        metadata: json!({}),
    };
    store
        .append(
            vec![snap("MB Way", Severity::Ok, 1.5), snap("ATM", Severity::Critical, 80.0)],
            at,
            NewRunRecord {
                job_name: "prestashop.payments".to_string(),
                status: RunStatus::Ok,
                duration_ms: 120,
                created_at: at,
                payload: json!({"count_raw": 2}),
            },
        )
        .unwrap();
    Arc::new(store)
}

#[tokio::test]
async fn test_missing_or_wrong_key_is_unauthorized() {
    let admin = start_admin(Arc::new(MemoryStore::new())).await;

    let bare = reqwest::get(admin.url("/admin/status")).await.unwrap();
    assert_eq!(bare.status(), 401);

    let wrong = reqwest::Client::new()
        .get(admin.url("/admin/status"))
        .bearer_auth("nope")
        .send()
        .await
        .unwrap();
    assert_eq!(wrong.status(), 401);

    admin.shutdown.trigger();
}

#[tokio::test]
async fn test_status_reports_operational() {
    let admin = start_admin(Arc::new(MemoryStore::new())).await;

    let response = admin.get("/admin/status").await;
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "operational");
    assert_eq!(body["jobs"], 0);

    admin.shutdown.trigger();
}

#[tokio::test]
async fn test_latest_orders_worst_first_and_filters_ok() {
    let admin = start_admin(seeded_store()).await;

    let all: Value = admin.get("/admin/latest/payment").await.json().await.unwrap();
    let keys: Vec<&str> = all.as_array().unwrap().iter().map(|r| r["subject_key"].as_str().unwrap()).collect();
    assert_eq!(keys, vec!["ATM", "MB Way"]);

    let problems: Value = admin.get("/admin/latest/payment?exclude_ok=true").await.json().await.unwrap();
    assert_eq!(problems.as_array().unwrap().len(), 1);

    assert_eq!(admin.get("/admin/latest/invoices").await.status(), 404);

    admin.shutdown.trigger();
}

#[tokio::test]
async fn test_alerts_grouped_by_domain() {
    let admin = start_admin(seeded_store()).await;

    let body: Value = admin.get("/admin/alerts").await.json().await.unwrap();
    assert_eq!(body["counts"]["payments"], 1);
    assert_eq!(body["counts"]["total"], 1);
    assert_eq!(body["payments"][0]["key"], "ATM");
    assert_eq!(body["payments"][0]["severity"], "critical");
    assert!(body["delayed_orders"].as_array().unwrap().is_empty());

    let critical: Value = admin.get("/admin/alerts?min_status=critical").await.json().await.unwrap();
    assert_eq!(critical["counts"]["total"], 1);

    assert_eq!(admin.get("/admin/alerts?min_status=ok").await.status(), 400);

    admin.shutdown.trigger();
}

#[tokio::test]
async fn test_series_rejects_reserved_key_and_merges_repeats() {
    let admin = start_admin(seeded_store()).await;

    let response = admin.get("/admin/series?subject_type=payment&keys=bucket_start").await;
    assert_eq!(response.status(), 400);

    let body: Value = admin
        .get("/admin/series?subject_type=payment&keys=ATM,ATM&window=6h")
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(body["buckets"][0]["ATM"], 80.0);
    assert_eq!(body["percentiles"].as_object().unwrap().len(), 1);

    admin.shutdown.trigger();
}

#[tokio::test]
async fn test_runs_filtering() {
    let admin = start_admin(seeded_store()).await;

    let runs: Value = admin.get("/admin/runs?status=ok").await.json().await.unwrap();
    assert_eq!(runs.as_array().unwrap().len(), 1);
    assert_eq!(runs[0]["job_name"], "prestashop.payments");

    let none: Value = admin.get("/admin/runs?status=error").await.json().await.unwrap();
    assert!(none.as_array().unwrap().is_empty());

    assert_eq!(admin.get("/admin/runs?status=maybe").await.status(), 400);

    admin.shutdown.trigger();
}

#[tokio::test]
async fn test_summary_route() {
    let admin = start_admin(seeded_store()).await;

    let body: Value = admin.get("/admin/summary?window=6h&sections=payments,runs").await.json().await.unwrap();
    assert_eq!(body["window"], "6h");
    assert_eq!(body["sections"]["payments"]["last_per_method"][0]["method"], "ATM");
    assert_eq!(body["sections"]["runs"][0]["last_status"], "ok");
    assert!(body["errors"].as_object().unwrap().is_empty());

    admin.shutdown.trigger();
}
