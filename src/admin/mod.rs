//! Read-only admin API.
//!
//! # Routes
//! ```text
//! GET /admin/status
//! GET /admin/jobs
//! GET /admin/runs?limit=&status=&job=
//! GET /admin/latest/{subject_type}?cycle=&exclude_ok=
//! GET /admin/alerts?min_status=warning|critical
//! GET /admin/series?subject_type=&keys=&window=
//! GET /admin/summary?window=&sections=
//! ```
//! Every route requires `Authorization: Bearer <admin.api_key>`.

pub mod auth;
pub mod handlers;

use axum::{middleware, routing::get, Router};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::clock::Clock;
use crate::lifecycle::Shutdown;
use crate::scheduler::JobHandle;
use crate::store::SharedStore;
use crate::summary::DashboardService;

/// Shared state handed to every admin handler.
#[derive(Clone)]
pub struct AdminState {
    pub api_key: Arc<str>,
    pub store: SharedStore,
    pub jobs: Arc<Vec<JobHandle>>,
    pub dashboard: Arc<DashboardService>,
    pub clock: Arc<dyn Clock>,
    pub started_at: DateTime<Utc>,
}

pub fn setup_admin_router(state: AdminState, request_timeout: Duration) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/jobs", get(get_jobs))
        .route("/admin/runs", get(get_runs))
        .route("/admin/latest/{subject_type}", get(get_latest))
        .route("/admin/alerts", get(get_alerts))
        .route("/admin/series", get(get_series))
        .route("/admin/summary", get(get_summary))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .layer(TimeoutLayer::new(request_timeout))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve `router` on `listener` until `shutdown` fires.
pub async fn serve(listener: TcpListener, router: Router, shutdown: Shutdown) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        tracing::info!(address = %addr, "Admin API listening");
    }
    axum::serve(listener, router)
        .with_graceful_shutdown(async move { shutdown.wait().await })
        .await
}
