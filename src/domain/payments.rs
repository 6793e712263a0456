//! Payment method staleness.
//!
//! Subject key is the canonical method label. Magnitude is hours since the
//! last payment seen for that method; a missing or unreadable date is
//! unknown and therefore critical.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::raw::{self, MapContext, RawRow, RowOutcome, RowRejected};
use crate::domain::{AliasTable, Classifier, DomainMapper, Magnitude, Observation, Severity, SubjectType};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentMethod {
    /// Canonical label after aliasing.
    pub method: String,
    /// Label as received.
    pub raw_method: String,
    pub last_payment_at: Option<DateTime<Utc>>,
    pub hours_since_last: Option<f64>,
    pub severity: Severity,
}

impl Observation for PaymentMethod {
    fn subject_key(&self) -> &str {
        &self.method
    }

    fn reference_time(&self) -> Option<DateTime<Utc>> {
        self.last_payment_at
    }

    fn severity(&self) -> Severity {
        self.severity
    }

    fn measure(&self) -> Option<f64> {
        self.hours_since_last
    }

    fn metadata(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub struct PaymentsMapper {
    classifier: Classifier,
    aliases: AliasTable,
}

impl PaymentsMapper {
    pub fn new(classifier: Classifier, aliases: AliasTable) -> Self {
        Self { classifier, aliases }
    }
}

impl DomainMapper for PaymentsMapper {
    type Entity = PaymentMethod;

    fn subject_type(&self) -> SubjectType {
        SubjectType::Payment
    }

    fn map_row(&self, row: &RawRow, ctx: &MapContext) -> RowOutcome<PaymentMethod> {
        let raw_method = raw::text(row, "method").ok_or(RowRejected::MissingField("method"))?;
        let method = self.aliases.resolve(&raw_method);

        let last_payment_at = raw::timestamp(row, "last_payment_date", ctx.offset);
        let magnitude = Magnitude::from_option(last_payment_at.map(|t| ctx.hours_since(t)));

        Ok(PaymentMethod {
            method,
            raw_method,
            last_payment_at,
            hours_since_last: magnitude.value(),
            severity: self.classifier.classify(magnitude),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Thresholds;
    use chrono::{FixedOffset, TimeZone};
    use serde_json::json;

    fn mapper() -> PaymentsMapper {
        PaymentsMapper::new(
            Classifier::new(Thresholds::new(48.0, 72.0)),
            AliasTable::from_pairs([("MBWay", "MB Way")]),
        )
    }

    fn ctx() -> MapContext {
        let now = Utc.with_ymd_and_hms(2024, 6, 4, 12, 0, 0).unwrap();
        MapContext::new(now, FixedOffset::east_opt(0).unwrap())
    }

    fn row(v: serde_json::Value) -> RawRow {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn test_alias_and_staleness() {
        let p = mapper()
            .map_row(&row(json!({"method": "MBWay", "last_payment_date": "2024-06-01 12:00:00"})), &ctx())
            .unwrap();
        assert_eq!(p.method, "MB Way");
        assert_eq!(p.raw_method, "MBWay");
        assert_eq!(p.hours_since_last, Some(72.0));
        assert_eq!(p.severity, Severity::Critical);
    }

    #[test]
    fn test_warning_band() {
        let p = mapper()
            .map_row(&row(json!({"method": "Card", "last_payment_date": "2024-06-02 12:00:00"})), &ctx())
            .unwrap();
        assert_eq!(p.hours_since_last, Some(48.0));
        assert_eq!(p.severity, Severity::Warning);
    }

    #[test]
    fn test_missing_date_is_critical() {
        let p = mapper().map_row(&row(json!({"method": "Card"})), &ctx()).unwrap();
        assert_eq!(p.last_payment_at, None);
        assert_eq!(p.hours_since_last, None);
        assert_eq!(p.severity, Severity::Critical);

        let p = mapper()
            .map_row(&row(json!({"method": "Card", "last_payment_date": "garbage"})), &ctx())
            .unwrap();
        assert_eq!(p.severity, Severity::Critical);
    }

    #[test]
    fn test_missing_method_rejected() {
        let err = mapper()
            .map_row(&row(json!({"last_payment_date": "2024-06-01 12:00:00"})), &ctx())
            .unwrap_err();
        assert_eq!(err, RowRejected::MissingField("method"));
    }
}
