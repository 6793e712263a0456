//! Open alerts grouped by domain.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::str::FromStr;

use crate::domain::{Severity, SubjectType};
use crate::query::latest::{display_order, latest_cycle, latest_state};
use crate::store::{Snapshot, SnapshotStore, StoreResult};

/// Least severe status an alert listing includes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MinStatus {
    #[default]
    Warning,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("min_status must be `warning` or `critical`, got `{0}`")]
pub struct ParseMinStatusError(String);

impl FromStr for MinStatus {
    type Err = ParseMinStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "warning" => Ok(MinStatus::Warning),
            "critical" => Ok(MinStatus::Critical),
            _ => Err(ParseMinStatusError(s.to_string())),
        }
    }
}

impl MinStatus {
    pub fn admits(self, severity: Severity) -> bool {
        match self {
            MinStatus::Warning => !severity.is_ok(),
            MinStatus::Critical => severity == Severity::Critical,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertItem {
    pub key: String,
    pub severity: Severity,
    pub observed_at: DateTime<Utc>,
    pub measure: Option<f64>,
    pub metadata: Value,
}

impl From<Snapshot> for AlertItem {
    fn from(snap: Snapshot) -> Self {
        Self {
            key: snap.subject_key,
            severity: snap.severity,
            observed_at: snap.observed_at,
            measure: snap.measure,
            metadata: snap.metadata,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AlertCounts {
    pub payments: usize,
    pub delayed_orders: usize,
    pub eol_products: usize,
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupedAlerts {
    pub counts: AlertCounts,
    pub payments: Vec<AlertItem>,
    pub delayed_orders: Vec<AlertItem>,
    pub eol_products: Vec<AlertItem>,
}

/// Worst first, then oldest observation first.
fn alert_order(a: &Snapshot, b: &Snapshot) -> std::cmp::Ordering {
    a.severity
        .cmp(&b.severity)
        .then_with(|| a.observed_at.cmp(&b.observed_at))
        .then_with(|| display_order(a, b))
}

fn open_alerts(rows: Vec<Snapshot>, min_status: MinStatus) -> Vec<AlertItem> {
    let mut rows: Vec<Snapshot> = rows.into_iter().filter(|s| min_status.admits(s.severity)).collect();
    rows.sort_by(alert_order);
    rows.into_iter().map(AlertItem::from).collect()
}

/// Payments use each method's latest state. Orders and EOL products use the
/// newest cycle, since their feeds only list current problems.
pub fn grouped_alerts(store: &dyn SnapshotStore, min_status: MinStatus) -> StoreResult<GroupedAlerts> {
    let payments = open_alerts(latest_state(store, SubjectType::Payment)?, min_status);
    let delayed_orders = open_alerts(latest_cycle(store, SubjectType::DelayedOrder, true)?, min_status);
    let eol_products = open_alerts(latest_cycle(store, SubjectType::EolProduct, true)?, min_status);

    let counts = AlertCounts {
        payments: payments.len(),
        delayed_orders: delayed_orders.len(),
        eol_products: eol_products.len(),
        total: payments.len() + delayed_orders.len() + eol_products.len(),
    };
    Ok(GroupedAlerts { counts, payments, delayed_orders, eol_products })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, NewRunRecord, NewSnapshot, RunStatus};
    use serde_json::json;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    fn cycle(store: &MemoryStore, secs: i64, rows: Vec<(SubjectType, &str, Severity)>) {
        let snaps = rows
            .into_iter()
            .map(|(subject_type, key, severity)| NewSnapshot {
                subject_type,
                subject_key: key.to_string(),
                measure: Some(1.0),
                severity,
                metadata: json!({}),
            })
            .collect();
        let run = NewRunRecord {
            job_name: "cycle".to_string(),
            status: RunStatus::Ok,
            duration_ms: 5,
            created_at: at(secs),
            payload: Value::Null,
        };
        store.append(snaps, at(secs), run).unwrap();
    }

    fn keys(items: &[AlertItem]) -> Vec<&str> {
        items.iter().map(|a| a.key.as_str()).collect()
    }

    #[test]
    fn test_min_status_parsing() {
        assert_eq!("warning".parse::<MinStatus>(), Ok(MinStatus::Warning));
        assert_eq!(" Critical ".parse::<MinStatus>(), Ok(MinStatus::Critical));
        assert!("ok".parse::<MinStatus>().is_err());
        assert!(MinStatus::Warning.admits(Severity::Warning));
        assert!(!MinStatus::Critical.admits(Severity::Warning));
        assert!(!MinStatus::Warning.admits(Severity::Ok));
    }

    #[test]
    fn test_grouped_by_domain_with_counts() {
        let store = MemoryStore::new();
        cycle(&store, 100, vec![
            (SubjectType::Payment, "ATM", Severity::Warning),
            (SubjectType::Payment, "MB Way", Severity::Ok),
        ]);
        cycle(&store, 200, vec![(SubjectType::Payment, "Multibanco", Severity::Critical)]);
        cycle(&store, 150, vec![
            (SubjectType::DelayedOrder, "1", Severity::Critical),
            (SubjectType::DelayedOrder, "2", Severity::Warning),
        ]);
        cycle(&store, 160, vec![(SubjectType::EolProduct, "42", Severity::Warning)]);

        let alerts = grouped_alerts(&store, MinStatus::Warning).unwrap();
        assert_eq!(keys(&alerts.payments), vec!["Multibanco", "ATM"]);
        assert_eq!(keys(&alerts.delayed_orders), vec!["1", "2"]);
        assert_eq!(keys(&alerts.eol_products), vec!["42"]);
        assert_eq!(
            alerts.counts,
            AlertCounts { payments: 2, delayed_orders: 2, eol_products: 1, total: 5 }
        );

        let critical = grouped_alerts(&store, MinStatus::Critical).unwrap();
        assert_eq!(keys(&critical.payments), vec!["Multibanco"]);
        assert_eq!(keys(&critical.delayed_orders), vec!["1"]);
        assert!(critical.eol_products.is_empty());
        assert_eq!(critical.counts.total, 2);
    }

    #[test]
    fn test_same_severity_oldest_first() {
        let store = MemoryStore::new();
        cycle(&store, 300, vec![(SubjectType::Payment, "B", Severity::Critical)]);
        cycle(&store, 100, vec![(SubjectType::Payment, "C", Severity::Critical)]);
        cycle(&store, 200, vec![(SubjectType::Payment, "A", Severity::Critical)]);

        let alerts = grouped_alerts(&store, MinStatus::Warning).unwrap();
        assert_eq!(keys(&alerts.payments), vec!["C", "A", "B"]);
    }

    #[test]
    fn test_resolved_orders_are_not_alerts() {
        let store = MemoryStore::new();
        cycle(&store, 100, vec![(SubjectType::DelayedOrder, "1", Severity::Critical)]);
        cycle(&store, 200, vec![(SubjectType::DelayedOrder, "2", Severity::Warning)]);

        let alerts = grouped_alerts(&store, MinStatus::Warning).unwrap();
        assert_eq!(keys(&alerts.delayed_orders), vec!["2"]);
    }

    #[test]
    fn test_empty_store_has_no_alerts() {
        let alerts = grouped_alerts(&MemoryStore::new(), MinStatus::Warning).unwrap();
        assert_eq!(alerts.counts, AlertCounts::default());
    }
}
