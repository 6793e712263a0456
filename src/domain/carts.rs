//! Abandoned carts. The feed has no reference timestamp, only `hours_stale`.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::raw::{self, MapContext, RawRow, RowOutcome};
use crate::domain::{Classifier, DomainMapper, Magnitude, Observation, Severity, SubjectType};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AbandonedCart {
    pub id_cart: String,
    pub id_customer: Option<i64>,
    pub hours_stale: Option<f64>,
    pub items: Option<i64>,
    pub severity: Severity,
}

impl Observation for AbandonedCart {
    fn subject_key(&self) -> &str {
        &self.id_cart
    }

    fn reference_time(&self) -> Option<DateTime<Utc>> {
        None
    }

    fn severity(&self) -> Severity {
        self.severity
    }

    fn measure(&self) -> Option<f64> {
        self.hours_stale
    }

    fn metadata(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub struct CartsMapper {
    classifier: Classifier,
}

impl CartsMapper {
    pub fn new(classifier: Classifier) -> Self {
        Self { classifier }
    }
}

impl DomainMapper for CartsMapper {
    type Entity = AbandonedCart;

    fn subject_type(&self) -> SubjectType {
        SubjectType::AbandonedCart
    }

    fn map_row(&self, row: &RawRow, _ctx: &MapContext) -> RowOutcome<AbandonedCart> {
        let id_cart = raw::required_id(row, "id_cart")?;
        let magnitude = Magnitude::from_option(raw::number(row, "hours_stale"));

        Ok(AbandonedCart {
            id_cart,
            id_customer: raw::integer(row, "id_customer"),
            hours_stale: magnitude.value(),
            items: raw::integer(row, "items"),
            severity: self.classifier.classify(magnitude),
        })
    }
}
