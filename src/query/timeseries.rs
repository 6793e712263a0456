//! Bucketed series, nearest-rank percentiles and even-stride downsampling.
//!
//! # Algorithm
//! ```text
//! bucket(snapshot) = floor(observed_at_epoch_secs / (bucket_minutes × 60))
//! value(bucket, series) = mean(measure of matching snapshots in bucket)
//! percentile(p) = sorted[round_half_up(p × (n − 1))], 0 when n = 0
//! downsample(n → m) picks idx_i = round(i × (n − 1) / (m − 1)), i in 0..m
//! ```

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use crate::domain::SubjectType;
use crate::store::{Snapshot, SnapshotFilter, SnapshotStore, StoreResult};

/// Field name of a bucket's timestamp; never usable as a series label.
pub const BUCKET_START: &str = "bucket_start";

/// One named series: a subject type, optionally narrowed to one key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesSelector {
    pub label: String,
    pub subject_type: SubjectType,
    pub subject_key: Option<String>,
}

impl SeriesSelector {
    pub fn new(label: impl Into<String>, subject_type: SubjectType, subject_key: Option<String>) -> Self {
        Self { label: label.into(), subject_type, subject_key }
    }

    /// Selector for a single subject, labelled by its key.
    pub fn subject(subject_type: SubjectType, key: impl Into<String>) -> Self {
        let key = key.into();
        Self { label: key.clone(), subject_type, subject_key: Some(key) }
    }

    /// Whether the label would collide with the bucket timestamp field.
    pub fn is_reserved(&self) -> bool {
        self.label == BUCKET_START
    }

    pub fn matches(&self, snap: &Snapshot) -> bool {
        snap.subject_type == self.subject_type
            && self.subject_key.as_deref().map_or(true, |k| snap.subject_key == k)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bucket {
    pub bucket_start: DateTime<Utc>,

    /// Mean per series label; labels without samples are absent.
    #[serde(flatten)]
    pub values: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Percentiles {
    pub p50: f64,
    pub p90: f64,
    pub p95: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeSeries {
    pub buckets: Vec<Bucket>,
    pub percentiles: BTreeMap<String, Percentiles>,
}

/// Nearest-rank percentile over an ascending slice.
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let last = sorted.len() - 1;
    let idx = (p * last as f64 + 0.5).floor();
    let idx = if idx <= 0.0 { 0 } else { (idx as usize).min(last) };
    sorted[idx]
}

pub fn percentiles(values: &[f64]) -> Percentiles {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    sorted.sort_by(f64::total_cmp);
    Percentiles {
        p50: percentile(&sorted, 0.50),
        p90: percentile(&sorted, 0.90),
        p95: percentile(&sorted, 0.95),
    }
}

/// Keep at most `max_points` items, evenly spaced, first and last included.
/// `max_points == 0` disables downsampling.
pub fn downsample<T>(items: Vec<T>, max_points: usize) -> Vec<T> {
    let n = items.len();
    if max_points == 0 || n <= max_points {
        return items;
    }
    if max_points == 1 {
        return items.into_iter().last().into_iter().collect();
    }

    let m = max_points;
    let mut wanted = (0..m).map(|i| (i * (n - 1) + (m - 1) / 2) / (m - 1)).peekable();
    let mut out = Vec::with_capacity(m);
    for (idx, item) in items.into_iter().enumerate() {
        if wanted.peek() == Some(&idx) {
            out.push(item);
            while wanted.peek() == Some(&idx) {
                wanted.next();
            }
        }
    }
    out
}

/// Selectors with a usable label, first occurrence of each label only.
fn distinct_selectors(selectors: &[SeriesSelector]) -> Vec<&SeriesSelector> {
    let mut seen = BTreeSet::new();
    selectors
        .iter()
        .filter(|s| !s.is_reserved() && seen.insert(s.label.as_str()))
        .collect()
}

/// Aggregate already-filtered snapshots into buckets and percentiles.
/// Repeated labels count once; the reserved `bucket_start` label is ignored.
pub fn aggregate(
    snapshots: &[Snapshot],
    selectors: &[SeriesSelector],
    bucket_minutes: u32,
    max_points: usize,
) -> TimeSeries {
    let selectors = distinct_selectors(selectors);
    let width = i64::from(bucket_minutes.max(1)) * 60;
    // bucket index → label → (sum, count)
    let mut sums: BTreeMap<i64, BTreeMap<&str, (f64, u32)>> = BTreeMap::new();
    let mut samples: BTreeMap<&str, Vec<f64>> = BTreeMap::new();

    for selector in &selectors {
        samples.entry(selector.label.as_str()).or_default();
    }

    for snap in snapshots {
        let Some(value) = snap.measure.filter(|v| v.is_finite()) else {
            continue;
        };
        let index = snap.observed_at.timestamp().div_euclid(width);
        for selector in selectors.iter().copied().filter(|s| s.matches(snap)) {
            let label = selector.label.as_str();
            let slot = sums.entry(index).or_default().entry(label).or_insert((0.0, 0));
            slot.0 += value;
            slot.1 += 1;
            samples.entry(label).or_default().push(value);
        }
    }

    let buckets: Vec<Bucket> = sums
        .into_iter()
        .filter_map(|(index, by_label)| {
            let bucket_start = DateTime::from_timestamp(index * width, 0)?;
            let values = by_label
                .into_iter()
                .map(|(label, (sum, count))| (label.to_string(), sum / f64::from(count)))
                .collect();
            Some(Bucket { bucket_start, values })
        })
        .collect();

    TimeSeries {
        buckets: downsample(buckets, max_points),
        percentiles: samples
            .into_iter()
            .map(|(label, values)| (label.to_string(), percentiles(&values)))
            .collect(),
    }
}

/// Read `[since, until)` for every subject type named by `selectors` and
/// aggregate.
pub fn time_series(
    store: &dyn SnapshotStore,
    selectors: &[SeriesSelector],
    since: DateTime<Utc>,
    until: DateTime<Utc>,
    bucket_minutes: u32,
    max_points: usize,
) -> StoreResult<TimeSeries> {
    let types: BTreeSet<&str> = selectors.iter().map(|s| s.subject_type.as_str()).collect();
    let mut snapshots = Vec::new();
    for subject_type in SubjectType::ALL.iter().filter(|t| types.contains(t.as_str())) {
        snapshots.extend(store.snapshots(&SnapshotFilter::between(*subject_type, since, until))?);
    }
    Ok(aggregate(&snapshots, selectors, bucket_minutes, max_points))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Severity;

    fn snap(key: &str, secs: i64, measure: Option<f64>) -> Snapshot {
        Snapshot {
            id: secs,
            subject_type: SubjectType::Pagespeed,
            subject_key: key.to_string(),
            observed_at: DateTime::from_timestamp(secs, 0).unwrap(),
            measure,
            severity: Severity::Ok,
            metadata: serde_json::Value::Null,
        }
    }

    #[test]
    fn test_nearest_rank_round_half_up() {
        let values = [100.0, 200.0, 300.0, 400.0];
        // p50: 0.5 × 3 = 1.5 → 2
        assert_eq!(percentile(&values, 0.50), 300.0);
        // p90: 2.7 → 3
        assert_eq!(percentile(&values, 0.90), 400.0);
        assert_eq!(percentile(&[], 0.95), 0.0);
        assert_eq!(percentile(&[42.0], 0.95), 42.0);
    }

    #[test]
    fn test_percentiles_sort_input() {
        let p = percentiles(&[5.0, 1.0, 3.0]);
        assert_eq!(p, Percentiles { p50: 3.0, p90: 5.0, p95: 5.0 });
        assert_eq!(percentiles(&[]), Percentiles::default());
    }

    #[test]
    fn test_downsample_even_stride() {
        let items: Vec<usize> = (0..10).collect();
        assert_eq!(downsample(items.clone(), 4), vec![0, 3, 6, 9]);
        assert_eq!(downsample(items.clone(), 2), vec![0, 9]);
        assert_eq!(downsample(items.clone(), 1), vec![9]);
        assert_eq!(downsample(items.clone(), 0), items);
        assert_eq!(downsample(items.clone(), 20), items);
    }

    #[test]
    fn test_bucket_means_and_missing_series() {
        let selectors = vec![
            SeriesSelector::subject(SubjectType::Pagespeed, "home"),
            SeriesSelector::subject(SubjectType::Pagespeed, "product"),
        ];
        let snaps = vec![
            snap("home", 0, Some(100.0)),
            snap("home", 120, Some(300.0)),
            snap("product", 200, Some(50.0)),
            snap("home", 310, Some(700.0)),
            snap("home", 320, None),
        ];
        let series = aggregate(&snaps, &selectors, 5, 0);

        assert_eq!(series.buckets.len(), 2);
        assert_eq!(series.buckets[0].values.get("home"), Some(&200.0));
        assert_eq!(series.buckets[0].values.get("product"), Some(&50.0));
        assert_eq!(series.buckets[1].values.get("home"), Some(&700.0));
        assert!(!series.buckets[1].values.contains_key("product"));
        assert_eq!(series.buckets[1].bucket_start.timestamp(), 300);

        assert_eq!(series.percentiles["home"].p50, 300.0);
        assert_eq!(series.percentiles["product"].p95, 50.0);
    }

    #[test]
    fn test_empty_window_yields_zero_percentiles() {
        let selectors = vec![SeriesSelector::subject(SubjectType::Pagespeed, "home")];
        let series = aggregate(&[], &selectors, 5, 288);
        assert!(series.buckets.is_empty());
        assert_eq!(series.percentiles["home"], Percentiles::default());
    }

    #[test]
    fn test_repeated_labels_count_once() {
        let selectors = vec![
            SeriesSelector::subject(SubjectType::Pagespeed, "home"),
            SeriesSelector::subject(SubjectType::Pagespeed, "home"),
        ];
        let snaps = vec![snap("home", 0, Some(100.0)), snap("home", 60, Some(300.0))];
        let series = aggregate(&snaps, &selectors, 5, 0);
        assert_eq!(series.buckets[0].values["home"], 200.0);
        assert_eq!(series.percentiles.len(), 1);
        assert_eq!(series.percentiles["home"].p95, 300.0);
    }

    #[test]
    fn test_reserved_label_is_ignored() {
        let selectors = vec![
            SeriesSelector::new(BUCKET_START, SubjectType::Pagespeed, None),
            SeriesSelector::subject(SubjectType::Pagespeed, "home"),
        ];
        assert!(selectors[0].is_reserved());
        let series = aggregate(&[snap("home", 0, Some(100.0))], &selectors, 5, 0);
        assert!(!series.percentiles.contains_key(BUCKET_START));

        let json = serde_json::to_value(&series.buckets[0]).unwrap();
        assert_eq!(json.as_object().unwrap().len(), 2);
        assert_eq!(json["bucket_start"], "1970-01-01T00:00:00Z");
    }

    #[test]
    fn test_bucket_json_shape() {
        let bucket = Bucket {
            bucket_start: DateTime::from_timestamp(300, 0).unwrap(),
            values: BTreeMap::from([("home".to_string(), 700.0)]),
        };
        let json = serde_json::to_value(&bucket).unwrap();
        assert_eq!(json["home"], 700.0);
        assert_eq!(json["bucket_start"], "1970-01-01T00:05:00Z");
    }
}
