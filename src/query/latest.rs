//! Current state reconstructed from the snapshot log.

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::domain::SubjectType;
use crate::store::{Snapshot, SnapshotFilter, SnapshotStore, StoreResult};

/// Display order: worst severity first, then larger magnitude (unknown
/// magnitude ahead of any known one), then subject key.
pub fn display_order(a: &Snapshot, b: &Snapshot) -> Ordering {
    a.severity
        .cmp(&b.severity)
        .then_with(|| match (a.measure, b.measure) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (Some(x), Some(y)) => y.total_cmp(&x),
        })
        .then_with(|| a.subject_key.cmp(&b.subject_key))
}

/// One row per subject key: greatest `observed_at`, then greatest id.
pub fn reduce_latest(snapshots: Vec<Snapshot>) -> Vec<Snapshot> {
    let mut latest: HashMap<String, Snapshot> = HashMap::new();
    for snap in snapshots {
        match latest.get(&snap.subject_key) {
            Some(current) if (current.observed_at, current.id) >= (snap.observed_at, snap.id) => {}
            _ => {
                latest.insert(snap.subject_key.clone(), snap);
            }
        }
    }
    let mut rows: Vec<Snapshot> = latest.into_values().collect();
    rows.sort_by(display_order);
    rows
}

/// Snapshots of the most recent cycle only.
pub fn reduce_latest_cycle(snapshots: Vec<Snapshot>, exclude_ok: bool) -> Vec<Snapshot> {
    let Some(newest) = snapshots.iter().map(|s| s.observed_at).max() else {
        return Vec::new();
    };
    let mut rows: Vec<Snapshot> = snapshots
        .into_iter()
        .filter(|s| s.observed_at == newest)
        .filter(|s| !(exclude_ok && s.severity.is_ok()))
        .collect();
    rows.sort_by(display_order);
    rows
}

pub fn latest_state(store: &dyn SnapshotStore, subject_type: SubjectType) -> StoreResult<Vec<Snapshot>> {
    let snapshots = store.snapshots(&SnapshotFilter::all(subject_type))?;
    Ok(reduce_latest(snapshots))
}

/// Rows of the newest cycle; a subject absent from it is considered resolved.
pub fn latest_cycle(
    store: &dyn SnapshotStore,
    subject_type: SubjectType,
    exclude_ok: bool,
) -> StoreResult<Vec<Snapshot>> {
    let snapshots = store.snapshots(&SnapshotFilter::all(subject_type))?;
    Ok(reduce_latest_cycle(snapshots, exclude_ok))
}
