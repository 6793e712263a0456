//! End-of-life products: days since a product was last in stock.
//!
//! The feed may tag rows with its own `severity`; that tag is kept in the
//! metadata as `reported_severity` but classification always uses the
//! configured thresholds.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::raw::{self, MapContext, RawRow, RowOutcome};
use crate::domain::{Classifier, DomainMapper, Magnitude, Observation, Severity, SubjectType};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EolProduct {
    pub id_product: String,
    pub name: Option<String>,
    pub reference: Option<String>,
    pub ean13: Option<String>,
    pub upc: Option<String>,
    pub price: Option<f64>,
    pub last_in_stock_at: Option<DateTime<Utc>>,
    pub days_since: Option<f64>,
    pub reported_severity: Option<Severity>,
    pub severity: Severity,
}

impl Observation for EolProduct {
    fn subject_key(&self) -> &str {
        &self.id_product
    }

    fn reference_time(&self) -> Option<DateTime<Utc>> {
        self.last_in_stock_at
    }

    fn severity(&self) -> Severity {
        self.severity
    }

    fn measure(&self) -> Option<f64> {
        self.days_since
    }

    fn metadata(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub struct EolMapper {
    classifier: Classifier,
}

impl EolMapper {
    pub fn new(classifier: Classifier) -> Self {
        Self { classifier }
    }
}

impl DomainMapper for EolMapper {
    type Entity = EolProduct;

    fn subject_type(&self) -> SubjectType {
        SubjectType::EolProduct
    }

    fn map_row(&self, row: &RawRow, ctx: &MapContext) -> RowOutcome<EolProduct> {
        let id_product = raw::required_id(row, "id_product")?;
        let last_in_stock_at = raw::timestamp(row, "last_in_stock_at", ctx.offset);
        let days = raw::number(row, "days_since")
            .or_else(|| last_in_stock_at.map(|t| ctx.whole_days_since(t)));
        let magnitude = Magnitude::from_option(days);

        Ok(EolProduct {
            id_product,
            name: raw::text(row, "name"),
            reference: raw::text(row, "reference"),
            ean13: raw::text(row, "ean13"),
            upc: raw::text(row, "upc"),
            price: raw::number(row, "price"),
            last_in_stock_at,
            days_since: magnitude.value(),
            reported_severity: raw::text(row, "severity").and_then(|s| s.parse().ok()),
            severity: self.classifier.classify(magnitude),
        })
    }
}
