//! Delayed orders.
//!
//! Magnitude is days in the current state: the feed's `days_passed` when
//! present, else whole days since `date_add`. Dropshipping orders are held
//! to the alternate (looser) threshold pair.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::raw::{self, MapContext, RawRow, RowOutcome};
use crate::domain::{Classifier, DomainMapper, Magnitude, Observation, Severity, SubjectType};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DelayedOrder {
    pub id_order: String,
    pub reference: Option<String>,
    pub date_add: Option<DateTime<Utc>>,
    pub days_passed: Option<f64>,
    pub id_state: Option<i64>,
    pub state_name: Option<String>,
    pub dropshipping: bool,
    pub severity: Severity,
}

impl Observation for DelayedOrder {
    fn subject_key(&self) -> &str {
        &self.id_order
    }

    fn reference_time(&self) -> Option<DateTime<Utc>> {
        self.date_add
    }

    fn severity(&self) -> Severity {
        self.severity
    }

    fn measure(&self) -> Option<f64> {
        self.days_passed
    }

    fn metadata(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub struct OrdersMapper {
    classifier: Classifier,
}

impl OrdersMapper {
    /// `classifier` must carry the dropshipping pair as its alternate.
    pub fn new(classifier: Classifier) -> Self {
        Self { classifier }
    }
}

impl DomainMapper for OrdersMapper {
    type Entity = DelayedOrder;

    fn subject_type(&self) -> SubjectType {
        SubjectType::DelayedOrder
    }

    fn map_row(&self, row: &RawRow, ctx: &MapContext) -> RowOutcome<DelayedOrder> {
        let id_order = raw::required_id(row, "id_order")?;
        let date_add = raw::timestamp(row, "date_add", ctx.offset);
        let dropshipping = raw::flag(row, "dropshipping");

        let days = raw::number(row, "days_passed").or_else(|| date_add.map(|t| ctx.whole_days_since(t)));
        let magnitude = Magnitude::from_option(days);

        Ok(DelayedOrder {
            id_order,
            reference: raw::text(row, "reference"),
            date_add,
            days_passed: magnitude.value(),
            id_state: raw::integer(row, "id_state"),
            state_name: raw::text(row, "state_name"),
            dropshipping,
            severity: self.classifier.classify_with(magnitude, dropshipping),
        })
    }
}
