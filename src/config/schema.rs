//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the watcher.
//! Every section is `#[serde(default)]`, so an empty file is a valid config.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::pagespeed::PageThresholds;
use crate::domain::Thresholds;

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct WatchConfig {
    /// Admin API (read surface).
    pub admin: AdminConfig,

    /// Logging and metrics.
    pub observability: ObservabilityConfig,

    /// Snapshot and run persistence.
    pub store: StoreConfig,

    /// Outbound HTTP client settings shared by all sources.
    pub http: HttpConfig,

    /// Retry policy for source fetches.
    pub retries: RetryConfig,

    pub scheduler: SchedulerConfig,

    /// Dashboard summary cache.
    pub summary: SummaryConfig,

    /// How local wall-clock timestamps from the feeds are read.
    pub clock: ClockConfig,

    /// Per-domain polling jobs.
    pub jobs: JobsConfig,
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable the admin API.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin API bind address.
    pub bind_address: String,

    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            // WARNING: placeholder, change in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
            bind_address: "127.0.0.1:8081".to_string(),
            request_timeout_secs: 30,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit JSON log lines instead of the human format.
    pub json_logs: bool,

    /// Enable the Prometheus scrape endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    Sqlite,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,

    /// Database file, used by the sqlite backend.
    pub path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Sqlite,
            path: "shopwatch.db".to_string(),
        }
    }
}

/// Outbound HTTP configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Connection establishment timeout in seconds.
    pub connect_timeout_secs: u64,

    /// Whole-request timeout in seconds.
    pub request_timeout_secs: u64,

    /// User-Agent sent to the storefront (it allow-lists this value).
    pub user_agent: String,

    /// API key sent as a query parameter to the JSON feeds.
    pub api_key: Option<String>,

    /// Query parameter name carrying `api_key`.
    pub api_key_param: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 3,
            request_timeout_secs: 15,
            user_agent: concat!("shopwatch/", env!("CARGO_PKG_VERSION")).to_string(),
            api_key: None,
            api_key_param: "PHP_AUTH_USER".to_string(),
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Enable retries.
    pub enabled: bool,

    /// Total attempts per fetch, first one included (1..=4).
    pub max_attempts: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: 4,
            base_delay_ms: 400,
            max_delay_ms: 5_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// How late a trigger may start and still run, in seconds.
    pub misfire_grace_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { misfire_grace_secs: 300 }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SummaryConfig {
    /// Cached summary lifetime in seconds; 0 disables caching.
    pub ttl_secs: u64,

    /// Window used when a request does not name one.
    pub default_window: String,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 30,
            default_window: "24h".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ClockConfig {
    /// Offset from UTC, in minutes, of the feeds' local timestamps.
    pub utc_offset_minutes: i32,
}

/// Epoch-aligned cadence: fire at `offset_secs` into every `every_secs` period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct CadenceConfig {
    pub every_secs: u64,
    pub offset_secs: u64,
}

impl Default for CadenceConfig {
    fn default() -> Self {
        Self { every_secs: 60, offset_secs: 0 }
    }
}

impl CadenceConfig {
    pub const fn every_minute_at(offset_secs: u64) -> Self {
        Self { every_secs: 60, offset_secs }
    }
}

/// Payments: hours since the last payment, per method.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PaymentsJobConfig {
    pub enabled: bool,

    /// Unique job identity, used in run records.
    pub name: String,

    pub url: String,

    pub schedule: CadenceConfig,

    /// Extra query parameters sent with every request.
    pub query: BTreeMap<String, String>,

    pub thresholds: Thresholds,

    /// Raw method label → canonical label.
    pub aliases: BTreeMap<String, String>,
}

impl Default for PaymentsJobConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            name: "prestashop.payments".to_string(),
            url: String::new(),
            schedule: CadenceConfig::every_minute_at(2),
            query: BTreeMap::new(),
            thresholds: Thresholds::new(48.0, 72.0),
            aliases: BTreeMap::new(),
        }
    }
}

/// Delayed orders: days in state, with a looser pair for dropshipping.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OrdersJobConfig {
    pub enabled: bool,
    pub name: String,
    pub url: String,
    pub schedule: CadenceConfig,
    pub query: BTreeMap<String, String>,

    /// Regular orders.
    pub standard: Thresholds,

    /// Dropshipping orders.
    pub dropshipping: Thresholds,
}

impl Default for OrdersJobConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            name: "prestashop.orders_delayed".to_string(),
            url: String::new(),
            schedule: CadenceConfig::every_minute_at(6),
            query: BTreeMap::new(),
            standard: Thresholds::new(2.0, 3.0),
            dropshipping: Thresholds::new(3.0, 5.0),
        }
    }
}

/// End-of-life products: days since last in stock.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EolJobConfig {
    pub enabled: bool,
    pub name: String,
    pub url: String,
    pub schedule: CadenceConfig,
    pub query: BTreeMap<String, String>,
    pub thresholds: Thresholds,
}

impl Default for EolJobConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            name: "prestashop.eol_products".to_string(),
            url: String::new(),
            schedule: CadenceConfig::every_minute_at(10),
            query: BTreeMap::new(),
            thresholds: Thresholds::new(30.0, 60.0),
        }
    }
}

/// Abandoned carts: hours since the cart was last touched.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CartsJobConfig {
    pub enabled: bool,
    pub name: String,
    pub url: String,
    pub schedule: CadenceConfig,

    /// Feed filters (`hours`, `limit`, `max_days`, `min_items`) go here.
    pub query: BTreeMap<String, String>,

    pub thresholds: Thresholds,
}

impl Default for CartsJobConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            name: "prestashop.carts_stale".to_string(),
            url: String::new(),
            schedule: CadenceConfig::every_minute_at(18),
            query: BTreeMap::new(),
            thresholds: Thresholds::new(24.0, 72.0),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PagespeedJobConfig {
    pub enabled: bool,
    pub name: String,
    pub schedule: CadenceConfig,
    pub home_url: String,
    pub product_url: String,
    pub home: PageThresholds,
    pub product: PageThresholds,

    /// Let markup sanity warnings raise a page to Warning.
    pub count_sanity_warnings: bool,
}

impl Default for PagespeedJobConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            name: "prestashop.pagespeed".to_string(),
            schedule: CadenceConfig::every_minute_at(14),
            home_url: String::new(),
            product_url: String::new(),
            home: PageThresholds::home_defaults(),
            product: PageThresholds::product_defaults(),
            count_sanity_warnings: false,
        }
    }
}

/// Readiness probe of a dependent service.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServiceHealthJobConfig {
    pub enabled: bool,
    pub name: String,
    pub url: String,
    pub schedule: CadenceConfig,
    pub query: BTreeMap<String, String>,

    /// Subject key of the probed service.
    pub service: String,

    /// Probe duration in milliseconds.
    pub thresholds: Thresholds,
}

impl Default for ServiceHealthJobConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            name: "patife.healthz".to_string(),
            url: String::new(),
            schedule: CadenceConfig::every_minute_at(20),
            query: BTreeMap::new(),
            service: "patife".to_string(),
            thresholds: Thresholds::new(500.0, 2000.0),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct JobsConfig {
    pub payments: PaymentsJobConfig,
    pub orders_delayed: OrdersJobConfig,
    pub eol_products: EolJobConfig,
    pub carts_stale: CartsJobConfig,
    pub pagespeed: PagespeedJobConfig,
    pub service_health: ServiceHealthJobConfig,
}

/// Uniform view of one job's scheduling identity, for validation and wiring.
#[derive(Debug, Clone, PartialEq)]
pub struct JobOutline<'a> {
    pub name: &'a str,
    pub enabled: bool,
    pub schedule: CadenceConfig,
    pub urls: Vec<&'a str>,
}

fn feed<'a>(name: &'a str, enabled: bool, schedule: CadenceConfig, url: &'a str) -> JobOutline<'a> {
    JobOutline {
        name,
        enabled,
        schedule,
        urls: vec![url],
    }
}

impl JobsConfig {
    pub fn outlines(&self) -> Vec<JobOutline<'_>> {
        let p = &self.payments;
        let o = &self.orders_delayed;
        let e = &self.eol_products;
        let c = &self.carts_stale;
        let ps = &self.pagespeed;
        let h = &self.service_health;
        vec![
            feed(&p.name, p.enabled, p.schedule, &p.url),
            feed(&o.name, o.enabled, o.schedule, &o.url),
            feed(&e.name, e.enabled, e.schedule, &e.url),
            feed(&c.name, c.enabled, c.schedule, &c.url),
            JobOutline {
                name: &ps.name,
                enabled: ps.enabled,
                schedule: ps.schedule,
                urls: vec![ps.home_url.as_str(), ps.product_url.as_str()],
            },
            feed(&h.name, h.enabled, h.schedule, &h.url),
        ]
    }

    /// Every threshold pair, labelled by its config path.
    pub fn threshold_pairs(&self) -> Vec<(String, Thresholds)> {
        let mut pairs = vec![
            ("jobs.payments.thresholds".to_string(), self.payments.thresholds),
            ("jobs.orders_delayed.standard".to_string(), self.orders_delayed.standard),
            ("jobs.orders_delayed.dropshipping".to_string(), self.orders_delayed.dropshipping),
            ("jobs.eol_products.thresholds".to_string(), self.eol_products.thresholds),
            ("jobs.carts_stale.thresholds".to_string(), self.carts_stale.thresholds),
            ("jobs.service_health.thresholds".to_string(), self.service_health.thresholds),
        ];
        for (page, t) in [("home", &self.pagespeed.home), ("product", &self.pagespeed.product)] {
            pairs.push((format!("jobs.pagespeed.{page}.ttfb_ms"), t.ttfb_ms));
            pairs.push((format!("jobs.pagespeed.{page}.total_ms"), t.total_ms));
            pairs.push((format!("jobs.pagespeed.{page}.html_bytes"), t.html_bytes));
        }
        pairs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_gives_defaults() {
        let config: WatchConfig = toml::from_str("").unwrap();
        assert_eq!(config.retries.max_attempts, 4);
        assert_eq!(config.summary.ttl_secs, 30);
        assert_eq!(config.scheduler.misfire_grace_secs, 300);
        assert_eq!(config.jobs.payments.name, "prestashop.payments");
        assert_eq!(config.jobs.payments.schedule, CadenceConfig::every_minute_at(2));
        assert_eq!(config.jobs.orders_delayed.dropshipping, Thresholds::new(3.0, 5.0));
    }

    #[test]
    fn test_partial_job_section() {
        let config: WatchConfig = toml::from_str(
            r#"
            [jobs.payments]
            enabled = true
            url = "https://shop.example/__watchdogs/check_payments.php"
            thresholds = { warn = 24.0, crit = 48.0 }

            [jobs.payments.aliases]
            "MBWay" = "MB Way"

            [jobs.payments.schedule]
            every_secs = 120
            "#,
        )
        .unwrap();
        let p = &config.jobs.payments;
        assert!(p.enabled);
        assert_eq!(p.name, "prestashop.payments");
        assert_eq!(p.thresholds, Thresholds::new(24.0, 48.0));
        assert_eq!(p.aliases.get("MBWay").map(String::as_str), Some("MB Way"));
        assert_eq!(p.schedule.every_secs, 120);
        assert_eq!(p.schedule.offset_secs, 0);
    }

    #[test]
    fn test_outlines_cover_every_job() {
        let jobs = JobsConfig::default();
        let names: Vec<&str> = jobs.outlines().iter().map(|o| o.name).collect();
        assert_eq!(
            names,
            vec![
                "prestashop.payments",
                "prestashop.orders_delayed",
                "prestashop.eol_products",
                "prestashop.carts_stale",
                "prestashop.pagespeed",
                "patife.healthz",
            ]
        );
        assert_eq!(jobs.threshold_pairs().len(), 12);
    }
}
