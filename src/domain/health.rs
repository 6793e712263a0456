//! Dependent service readiness probe.
//!
//! The probe returns a single object:
//! `{status, time, duration_ms, checks: {db, cache, disk}, meta}`.
//! A reported status other than `ok` is critical; otherwise the probe's own
//! duration is classified.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::domain::raw::{self, MapContext, RawRow, RowOutcome};
use crate::domain::{Classifier, DomainMapper, Magnitude, Observation, Severity, SubjectType};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceHealth {
    pub service: String,
    pub status: Option<String>,
    pub reported_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<f64>,
    pub db_ok: Option<bool>,
    pub cache_ok: Option<bool>,
    pub disk_ok: Option<bool>,
    pub severity: Severity,
}

impl ServiceHealth {
    pub fn is_online(&self) -> bool {
        self.status.as_deref() == Some("ok")
    }
}

impl Observation for ServiceHealth {
    fn subject_key(&self) -> &str {
        &self.service
    }

    fn reference_time(&self) -> Option<DateTime<Utc>> {
        self.reported_at
    }

    fn severity(&self) -> Severity {
        self.severity
    }

    fn measure(&self) -> Option<f64> {
        self.duration_ms
    }

    fn metadata(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub struct HealthMapper {
    service: String,
    classifier: Classifier,
}

impl HealthMapper {
    pub fn new(service: impl Into<String>, classifier: Classifier) -> Self {
        Self { service: service.into(), classifier }
    }
}

fn check_ok(row: &RawRow, name: &str) -> Option<bool> {
    row.get("checks")?.get(name)?.get("ok")?.as_bool()
}

impl DomainMapper for HealthMapper {
    type Entity = ServiceHealth;

    fn subject_type(&self) -> SubjectType {
        SubjectType::ServiceHealth
    }

    fn map_row(&self, row: &RawRow, ctx: &MapContext) -> RowOutcome<ServiceHealth> {
        let status = raw::text(row, "status").map(|s| s.to_ascii_lowercase());
        let magnitude = Magnitude::from_option(raw::number(row, "duration_ms"));

        let severity = match status.as_deref() {
            Some("ok") => self.classifier.classify(magnitude),
            _ => Severity::Critical,
        };

        Ok(ServiceHealth {
            service: self.service.clone(),
            reported_at: match row.get("time") {
                Some(Value::String(s)) => raw::parse_timestamp(s, ctx.offset),
                _ => None,
            },
            status,
            duration_ms: magnitude.value(),
            db_ok: check_ok(row, "db"),
            cache_ok: check_ok(row, "cache"),
            disk_ok: check_ok(row, "disk"),
            severity,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Thresholds;
    use serde_json::json;

    fn map(v: serde_json::Value) -> ServiceHealth {
        HealthMapper::new("patife", Classifier::new(Thresholds::new(500.0, 2000.0)))
            .map_row(v.as_object().unwrap(), &MapContext::utc(Utc::now()))
            .unwrap()
    }

    #[test]
    fn test_healthy_probe() {
        let h = map(json!({
            "status": "ok",
            "time": "2024-06-01T10:00:00+01:00",
            "duration_ms": 42.5,
            "checks": {"db": {"ok": true, "latency_ms": 3}, "cache": {"ok": true}, "disk": {"ok": true}},
        }));
        assert_eq!(h.subject_key(), "patife");
        assert_eq!(h.severity, Severity::Ok);
        assert!(h.is_online());
        assert_eq!(h.db_ok, Some(true));
        assert_eq!(h.reported_at.unwrap().to_rfc3339(), "2024-06-01T09:00:00+00:00");
    }

    #[test]
    fn test_degraded_status_is_critical() {
        let h = map(json!({"status": "degraded", "duration_ms": 5}));
        assert_eq!(h.severity, Severity::Critical);
        assert!(!h.is_online());
    }

    #[test]
    fn test_slow_probe_warns() {
        let h = map(json!({"status": "ok", "duration_ms": 800}));
        assert_eq!(h.severity, Severity::Warning);
        let h = map(json!({"status": "ok"}));
        assert_eq!(h.severity, Severity::Critical);
    }
}
