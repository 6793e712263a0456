//! Page load timing for the storefront's home and product pages.
//!
//! # Rule
//! ```text
//! status_code >= 400 (or missing)          → Critical
//! else worst of:
//!     classify(ttfb_ms), classify(total_ms), classify(html_bytes)
//!     sanity_critical > 0                  → Critical
//!     sanity_warning  > 0                  → Warning
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::raw::{self, MapContext, RawRow, RowOutcome, RowRejected};
use crate::domain::{classify, DomainMapper, Magnitude, Observation, Severity, SubjectType, Thresholds};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageType {
    Home,
    Product,
}

impl PageType {
    pub fn as_str(self) -> &'static str {
        match self {
            PageType::Home => "home",
            PageType::Product => "product",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "home" => Some(PageType::Home),
            "product" => Some(PageType::Product),
            _ => None,
        }
    }
}

/// Threshold triple for one page type.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct PageThresholds {
    pub ttfb_ms: Thresholds,
    pub total_ms: Thresholds,
    pub html_bytes: Thresholds,
}

impl PageThresholds {
    pub fn home_defaults() -> Self {
        Self {
            ttfb_ms: Thresholds::new(1600.0, 2500.0),
            total_ms: Thresholds::new(1800.0, 3000.0),
            html_bytes: Thresholds::new(450_000.0, 900_000.0),
        }
    }

    pub fn product_defaults() -> Self {
        Self {
            ttfb_ms: Thresholds::new(350.0, 800.0),
            total_ms: Thresholds::new(1000.0, 2000.0),
            html_bytes: Thresholds::new(320_000.0, 900_000.0),
        }
    }

    pub fn pairs(&self) -> [Thresholds; 3] {
        [self.ttfb_ms, self.total_ms, self.html_bytes]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageSpeed {
    pub page_type: PageType,
    pub url: Option<String>,
    pub status_code: Option<i64>,
    pub ttfb_ms: Option<f64>,
    pub total_ms: Option<f64>,
    pub html_bytes: Option<f64>,
    pub sanity_critical: i64,
    pub sanity_warning: i64,
    pub severity: Severity,
}

impl Observation for PageSpeed {
    fn subject_key(&self) -> &str {
        self.page_type.as_str()
    }

    fn reference_time(&self) -> Option<DateTime<Utc>> {
        None
    }

    fn severity(&self) -> Severity {
        self.severity
    }

    fn measure(&self) -> Option<f64> {
        self.ttfb_ms
    }

    fn metadata(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub struct PagespeedMapper {
    home: PageThresholds,
    product: PageThresholds,
}

impl PagespeedMapper {
    pub fn new(home: PageThresholds, product: PageThresholds) -> Self {
        Self { home, product }
    }

    fn thresholds(&self, page: PageType) -> &PageThresholds {
        match page {
            PageType::Home => &self.home,
            PageType::Product => &self.product,
        }
    }
}

impl DomainMapper for PagespeedMapper {
    type Entity = PageSpeed;

    fn subject_type(&self) -> SubjectType {
        SubjectType::Pagespeed
    }

    fn map_row(&self, row: &RawRow, _ctx: &MapContext) -> RowOutcome<PageSpeed> {
        let label = raw::text(row, "page_type").ok_or(RowRejected::MissingField("page_type"))?;
        let page_type = PageType::parse(&label).ok_or_else(|| RowRejected::InvalidField {
            field: "page_type",
            reason: format!("unknown page type `{label}`"),
        })?;

        let status_code = raw::integer(row, "status_code");
        let ttfb_ms = raw::number(row, "ttfb_ms");
        let total_ms = raw::number(row, "total_ms");
        let html_bytes = raw::number(row, "html_bytes");
        let sanity_critical = raw::integer(row, "sanity_critical").unwrap_or(0);
        let sanity_warning = raw::integer(row, "sanity_warning").unwrap_or(0);

        let severity = match status_code {
            Some(code) if code < 400 => {
                let limits = self.thresholds(page_type).pairs();
                let metrics = [ttfb_ms, total_ms, html_bytes];
                let mut worst = Severity::worst_of(
                    metrics
                        .iter()
                        .zip(limits)
                        .map(|(m, t)| classify(Magnitude::from_option(*m), t)),
                );
                if sanity_critical > 0 {
                    worst = worst.worst(Severity::Critical);
                }
                if sanity_warning > 0 {
                    worst = worst.worst(Severity::Warning);
                }
                worst
            }
            _ => Severity::Critical,
        };

        Ok(PageSpeed {
            page_type,
            url: raw::text(row, "url"),
            status_code,
            ttfb_ms,
            total_ms,
            html_bytes,
            sanity_critical,
            sanity_warning,
            severity,
        })
    }
}
