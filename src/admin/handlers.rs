use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::admin::AdminState;
use crate::domain::SubjectType;
use crate::query::timeseries::BUCKET_START;
use crate::query::{
    grouped_alerts, latest_cycle, latest_state, time_series, GroupedAlerts, MinStatus, SeriesSelector, TimeSeries,
    Window,
};
use crate::scheduler::JobStatus;
use crate::store::{self, RunQuery, RunRecord, RunStatus, Snapshot, StoreError};
use crate::summary::Summary;

const MAX_RUNS: usize = 500;

#[derive(Debug, thiserror::Error)]
pub enum AdminError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl IntoResponse for AdminError {
    fn into_response(self) -> Response {
        let status = match &self {
            AdminError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AdminError::NotFound(_) => StatusCode::NOT_FOUND,
            AdminError::Store(_) => StatusCode::SERVICE_UNAVAILABLE,
        };
        if let AdminError::Store(err) = &self {
            tracing::error!(error = %err, "Admin query failed");
        }
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

type AdminResult<T> = Result<Json<T>, AdminError>;

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub started_at: DateTime<Utc>,
    pub uptime_secs: i64,
    pub jobs: usize,
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        started_at: state.started_at,
        uptime_secs: (state.clock.now() - state.started_at).num_seconds().max(0),
        jobs: state.jobs.len(),
    })
}

pub async fn get_jobs(State(state): State<AdminState>) -> Json<Vec<JobStatus>> {
    Json(state.jobs.iter().map(|job| job.status()).collect())
}

#[derive(Debug, Default, Deserialize)]
pub struct RunsParams {
    pub limit: Option<usize>,
    pub status: Option<String>,
    pub job: Option<String>,
}

pub async fn get_runs(
    State(state): State<AdminState>,
    Query(params): Query<RunsParams>,
) -> AdminResult<Vec<RunRecord>> {
    let status = params
        .status
        .as_deref()
        .map(|s| s.parse::<RunStatus>())
        .transpose()
        .map_err(|_| AdminError::BadRequest("status must be `ok` or `error`".to_string()))?;
    let query = RunQuery {
        limit: params.limit.unwrap_or(RunQuery::default().limit).min(MAX_RUNS),
        status,
        job_name: params.job.filter(|j| !j.is_empty()),
    };
    let runs = store::blocking(&state.store, move |s| s.recent_runs(&query)).await?;
    Ok(Json(runs))
}

fn parse_subject_type(raw: &str) -> Result<SubjectType, AdminError> {
    raw.parse()
        .map_err(|_| AdminError::NotFound(format!("unknown subject type `{raw}`")))
}

#[derive(Debug, Default, Deserialize)]
pub struct LatestParams {
    /// Only rows from the newest cycle.
    #[serde(default)]
    pub cycle: bool,
    #[serde(default)]
    pub exclude_ok: bool,
}

pub async fn get_latest(
    State(state): State<AdminState>,
    Path(subject_type): Path<String>,
    Query(params): Query<LatestParams>,
) -> AdminResult<Vec<Snapshot>> {
    let subject_type = parse_subject_type(&subject_type)?;
    let rows = store::blocking(&state.store, move |s| {
        if params.cycle {
            latest_cycle(s, subject_type, params.exclude_ok)
        } else {
            let mut rows = latest_state(s, subject_type)?;
            if params.exclude_ok {
                rows.retain(|r| !r.severity.is_ok());
            }
            Ok(rows)
        }
    })
    .await?;
    Ok(Json(rows))
}

#[derive(Debug, Default, Deserialize)]
pub struct AlertsParams {
    pub min_status: Option<String>,
}

pub async fn get_alerts(
    State(state): State<AdminState>,
    Query(params): Query<AlertsParams>,
) -> AdminResult<GroupedAlerts> {
    let min_status = params
        .min_status
        .as_deref()
        .map(str::parse::<MinStatus>)
        .transpose()
        .map_err(|e| AdminError::BadRequest(e.to_string()))?
        .unwrap_or_default();
    let alerts = store::blocking(&state.store, move |s| grouped_alerts(s, min_status)).await?;
    Ok(Json(alerts))
}

#[derive(Debug, Deserialize)]
pub struct SeriesParams {
    pub subject_type: String,
    /// Comma separated subject keys; omitted means one series over all keys.
    pub keys: Option<String>,
    pub window: Option<String>,
}

pub async fn get_series(
    State(state): State<AdminState>,
    Query(params): Query<SeriesParams>,
) -> AdminResult<TimeSeries> {
    let subject_type = parse_subject_type(&params.subject_type)?;
    let window = Window::parse_or_default(params.window.as_deref());

    let mut keys: Vec<&str> = Vec::new();
    for key in params.keys.as_deref().unwrap_or_default().split(',').map(str::trim) {
        if key == BUCKET_START {
            let message = format!("`{BUCKET_START}` is not a valid subject key");
            return Err(AdminError::BadRequest(message));
        }
        if !key.is_empty() && !keys.contains(&key) {
            keys.push(key);
        }
    }
    let mut selectors: Vec<SeriesSelector> =
        keys.into_iter().map(|k| SeriesSelector::subject(subject_type, k)).collect();
    if selectors.is_empty() {
        selectors.push(SeriesSelector::new(subject_type.as_str(), subject_type, None));
    }

    let now = state.clock.now();
    let since = window.since(now);
    let series = store::blocking(&state.store, move |s| {
        time_series(s, &selectors, since, now, window.bucket_minutes(), window.max_points())
    })
    .await?;
    Ok(Json(series))
}

#[derive(Debug, Default, Deserialize)]
pub struct SummaryParams {
    pub window: Option<String>,
    pub sections: Option<String>,
}

pub async fn get_summary(
    State(state): State<AdminState>,
    Query(params): Query<SummaryParams>,
) -> AdminResult<Summary> {
    let dashboard = Arc::clone(&state.dashboard);
    let summary = tokio::task::spawn_blocking(move || {
        dashboard.summary(params.window.as_deref(), params.sections.as_deref())
    })
    .await
    .map_err(|e| AdminError::Store(StoreError::Unavailable(format!("summary task failed: {e}"))))?;
    Ok(Json(Summary::clone(&summary)))
}
