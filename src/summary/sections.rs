//! Dashboard sections. Each builder reads the store on its own so one
//! failing section cannot take the others down.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use crate::domain::pagespeed::PageType;
use crate::domain::{Severity, SubjectType};
use crate::query::latest::{latest_cycle, latest_state, reduce_latest};
use crate::query::timeseries::{time_series, Bucket, SeriesSelector};
use crate::query::window::Window;
use crate::store::{RunQuery, Snapshot, SnapshotFilter, SnapshotStore, StoreResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Section {
    Runs,
    Payments,
    OrdersDelayed,
    Pagespeed,
    CartsStale,
    Eol,
    ServiceHealth,
}

impl Section {
    pub const ALL: [Section; 7] = [
        Section::Runs,
        Section::Payments,
        Section::OrdersDelayed,
        Section::Pagespeed,
        Section::CartsStale,
        Section::Eol,
        Section::ServiceHealth,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Section::Runs => "runs",
            Section::Payments => "payments",
            Section::OrdersDelayed => "orders_delayed",
            Section::Pagespeed => "pagespeed",
            Section::CartsStale => "carts_stale",
            Section::Eol => "eol",
            Section::ServiceHealth => "service_health",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|section| section.as_str() == s)
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inputs shared by every section of one summary.
#[derive(Debug, Clone, Copy)]
pub struct SectionContext {
    pub now: DateTime<Utc>,
    pub window: Window,
}

impl SectionContext {
    pub fn since(&self) -> DateTime<Utc> {
        self.window.since(self.now)
    }
}

pub fn build(section: Section, store: &dyn SnapshotStore, ctx: &SectionContext) -> StoreResult<Value> {
    match section {
        Section::Runs => runs(store),
        Section::Payments => payments(store, ctx),
        Section::OrdersDelayed => orders_delayed(store, ctx),
        Section::Pagespeed => pagespeed(store, ctx),
        Section::CartsStale => carts_stale(store, ctx),
        Section::Eol => eol(store, ctx),
        Section::ServiceHealth => service_health(store),
    }
}

#[derive(Debug, Serialize)]
struct JobCard {
    name: String,
    last_status: String,
    last_run_ms: u64,
    last_run_at: DateTime<Utc>,
}

/// Latest run per job, sorted by name ignoring case.
fn runs(store: &dyn SnapshotStore) -> StoreResult<Value> {
    let recent = store.recent_runs(&RunQuery { limit: 500, ..RunQuery::default() })?;
    let mut by_job: HashMap<String, JobCard> = HashMap::new();
    for run in recent {
        by_job.entry(run.job_name.clone()).or_insert_with(|| JobCard {
            name: run.job_name,
            last_status: run.status.to_string(),
            last_run_ms: run.duration_ms,
            last_run_at: run.created_at,
        });
    }
    let mut cards: Vec<JobCard> = by_job.into_values().collect();
    cards.sort_by(|a, b| {
        a.name
            .to_lowercase()
            .cmp(&b.name.to_lowercase())
            .then_with(|| a.name.cmp(&b.name))
    });
    Ok(serde_json::to_value(cards)?)
}

/// Snapshots inside the window grouped by UTC day, oldest day first.
fn by_day(snaps: &[Snapshot]) -> BTreeMap<NaiveDate, Vec<&Snapshot>> {
    let mut days: BTreeMap<NaiveDate, Vec<&Snapshot>> = BTreeMap::new();
    for snap in snaps {
        days.entry(snap.observed_at.date_naive()).or_default().push(snap);
    }
    days
}

fn distinct_keys<'a>(snaps: impl IntoIterator<Item = &'a Snapshot>) -> usize {
    snaps.into_iter().map(|s| s.subject_key.as_str()).collect::<BTreeSet<_>>().len()
}

fn metadata_time(metadata: &Value, field: &str) -> Option<DateTime<Utc>> {
    let raw = metadata.get(field)?.as_str()?;
    DateTime::parse_from_rfc3339(raw).ok().map(|t| t.with_timezone(&Utc))
}

#[derive(Debug, Serialize)]
struct MethodAge {
    method: String,
    last_payment_at: Option<DateTime<Utc>>,
    age_minutes: Option<i64>,
    severity: Severity,
}

fn payments(store: &dyn SnapshotStore, ctx: &SectionContext) -> StoreResult<Value> {
    let methods: Vec<MethodAge> = latest_state(store, SubjectType::Payment)?
        .into_iter()
        .map(|snap| {
            let last_payment_at = metadata_time(&snap.metadata, "last_payment_at");
            MethodAge {
                method: snap.subject_key,
                last_payment_at,
                age_minutes: last_payment_at.map(|t| (ctx.now - t).num_minutes().max(0)),
                severity: snap.severity,
            }
        })
        .collect();
    Ok(serde_json::json!({ "last_per_method": methods }))
}

#[derive(Debug, Serialize)]
struct OrdersDay {
    ts: NaiveDate,
    total: usize,
}

/// Counts over the newest cycle plus distinct delayed orders per day.
fn orders_delayed(store: &dyn SnapshotStore, ctx: &SectionContext) -> StoreResult<Value> {
    let rows = latest_cycle(store, SubjectType::DelayedOrder, false)?;
    let dropship = rows
        .iter()
        .filter(|s| s.metadata.get("dropshipping").and_then(Value::as_bool).unwrap_or(false))
        .count();
    let worst = Severity::worst_of(rows.iter().map(|s| s.severity));

    let snaps = store.snapshots(&SnapshotFilter::between(SubjectType::DelayedOrder, ctx.since(), ctx.now))?;
    let series: Vec<OrdersDay> = by_day(&snaps)
        .into_iter()
        .map(|(ts, day)| OrdersDay { ts, total: distinct_keys(day) })
        .collect();
    let delta_24h = match series.as_slice() {
        [.., prev, last] => last.total as i64 - prev.total as i64,
        [only] => only.total as i64,
        [] => 0,
    };

    Ok(serde_json::json!({
        "total": rows.len(),
        "by_type": { "std": rows.len() - dropship, "dropship": dropship },
        "worst": worst,
        "delta_24h": delta_24h,
        "series": series,
    }))
}

#[derive(Debug, Serialize)]
struct PageStats {
    p50_ttfb_ms: f64,
    p90_ttfb_ms: f64,
    p95_ttfb_ms: f64,
    last_status: Severity,
}

#[derive(Debug, Serialize)]
struct PagespeedSection {
    home: PageStats,
    product: PageStats,
    bucket_minutes: u32,
    series: Vec<Bucket>,
}

fn pagespeed(store: &dyn SnapshotStore, ctx: &SectionContext) -> StoreResult<Value> {
    let selectors: Vec<SeriesSelector> = [PageType::Home, PageType::Product]
        .into_iter()
        .map(|page| SeriesSelector::subject(SubjectType::Pagespeed, page.as_str()))
        .collect();
    let bucket_minutes = ctx.window.bucket_minutes();
    let series = time_series(
        store,
        &selectors,
        ctx.since(),
        ctx.now,
        bucket_minutes,
        ctx.window.max_points(),
    )?;
    let latest = latest_state(store, SubjectType::Pagespeed)?;

    let stats = |page: PageType| {
        let p = series.percentiles.get(page.as_str()).copied().unwrap_or_default();
        PageStats {
            p50_ttfb_ms: p.p50,
            p90_ttfb_ms: p.p90,
            p95_ttfb_ms: p.p95,
            last_status: latest
                .iter()
                .find(|s| s.subject_key == page.as_str())
                .map_or(Severity::Ok, |s| s.severity),
        }
    };

    let section = PagespeedSection {
        home: stats(PageType::Home),
        product: stats(PageType::Product),
        bucket_minutes,
        series: series.buckets.clone(),
    };
    Ok(serde_json::to_value(section)?)
}

#[derive(Debug, Serialize)]
struct CartsDay {
    ts: NaiveDate,
    over_threshold: usize,
}

/// Distinct carts seen over threshold inside the window, overall and per day.
fn carts_stale(store: &dyn SnapshotStore, ctx: &SectionContext) -> StoreResult<Value> {
    let snaps = store.snapshots(&SnapshotFilter::between(SubjectType::AbandonedCart, ctx.since(), ctx.now))?;
    let over: Vec<Snapshot> = snaps.into_iter().filter(|s| !s.severity.is_ok()).collect();
    let series: Vec<CartsDay> = by_day(&over)
        .into_iter()
        .map(|(ts, day)| CartsDay { ts, over_threshold: distinct_keys(day) })
        .collect();
    Ok(serde_json::json!({
        "over_threshold": distinct_keys(&over),
        "series": series,
    }))
}

#[derive(Debug, Serialize)]
struct EolDay {
    ts: NaiveDate,
    warn: usize,
    critical: usize,
}

/// Warning and critical counts over each product's latest state in the
/// window, plus per-day snapshot counts.
fn eol(store: &dyn SnapshotStore, ctx: &SectionContext) -> StoreResult<Value> {
    let snaps = store.snapshots(&SnapshotFilter::between(SubjectType::EolProduct, ctx.since(), ctx.now))?;
    let series: Vec<EolDay> = by_day(&snaps)
        .into_iter()
        .map(|(ts, day)| EolDay {
            ts,
            warn: day.iter().filter(|s| s.severity == Severity::Warning).count(),
            critical: day.iter().filter(|s| s.severity == Severity::Critical).count(),
        })
        .collect();

    let latest = reduce_latest(snaps);
    let count = |severity: Severity| latest.iter().filter(|s| s.severity == severity).count();
    Ok(serde_json::json!({
        "warn": count(Severity::Warning),
        "critical": count(Severity::Critical),
        "series": series,
    }))
}

#[derive(Debug, Serialize)]
struct ServiceCard {
    service: String,
    severity: Severity,
    status: Option<String>,
    duration_ms: Option<f64>,
    observed_at: DateTime<Utc>,
}

fn service_health(store: &dyn SnapshotStore) -> StoreResult<Value> {
    let cards: Vec<ServiceCard> = latest_state(store, SubjectType::ServiceHealth)?
        .into_iter()
        .map(|snap| ServiceCard {
            status: snap.metadata.get("status").and_then(Value::as_str).map(str::to_string),
            service: snap.subject_key,
            severity: snap.severity,
            duration_ms: snap.measure,
            observed_at: snap.observed_at,
        })
        .collect();
    Ok(serde_json::to_value(cards)?)
}
