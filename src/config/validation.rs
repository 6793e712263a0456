//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Threshold pairs are ordered (`warn < crit`)
//! - Cadences are well formed (`0 < every <= 7d`, `offset < every`)
//! - Enabled jobs have parseable URLs and unique names
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: WatchConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use url::Url;

use crate::config::schema::{StoreBackend, WatchConfig};
use crate::resilience::retries::MAX_ATTEMPTS;
use crate::scheduler::cadence::MAX_PERIOD_SECS;

const MAX_UTC_OFFSET_MINUTES: i32 = 18 * 60;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self { field: field.into(), message: message.into() }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

pub fn validate_config(config: &WatchConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    for (field, thresholds) in config.jobs.threshold_pairs() {
        if !thresholds.is_valid() {
            errors.push(ValidationError::new(
                field,
                format!("warn ({}) must be below crit ({})", thresholds.warn, thresholds.crit),
            ));
        }
    }

    let mut names = HashSet::new();
    for outline in config.jobs.outlines() {
        let field = format!("jobs[{}]", outline.name);
        if outline.name.trim().is_empty() {
            errors.push(ValidationError::new(field.clone(), "job name must not be empty"));
        } else if !names.insert(outline.name) {
            errors.push(ValidationError::new(field.clone(), "duplicate job name"));
        }

        if outline.schedule.every_secs == 0 {
            errors.push(ValidationError::new(
                format!("{field}.schedule.every_secs"),
                "must be greater than 0",
            ));
        } else if outline.schedule.every_secs > MAX_PERIOD_SECS {
            errors.push(ValidationError::new(
                format!("{field}.schedule.every_secs"),
                format!("must not exceed {MAX_PERIOD_SECS} (7 days)"),
            ));
        } else if outline.schedule.offset_secs >= outline.schedule.every_secs {
            errors.push(ValidationError::new(
                format!("{field}.schedule.offset_secs"),
                "must be less than every_secs",
            ));
        }

        if outline.enabled {
            for url in &outline.urls {
                if let Err(e) = Url::parse(url) {
                    errors.push(ValidationError::new(
                        format!("{field}.url"),
                        format!("invalid URL '{url}': {e}"),
                    ));
                }
            }
        }
    }

    let retries = &config.retries;
    if retries.max_attempts == 0 || retries.max_attempts > MAX_ATTEMPTS {
        errors.push(ValidationError::new(
            "retries.max_attempts",
            format!("must be between 1 and {MAX_ATTEMPTS}"),
        ));
    }
    if retries.base_delay_ms > retries.max_delay_ms {
        errors.push(ValidationError::new(
            "retries.base_delay_ms",
            "must not exceed max_delay_ms",
        ));
    }

    if config.http.connect_timeout_secs == 0 || config.http.request_timeout_secs == 0 {
        errors.push(ValidationError::new("http", "timeouts must be greater than 0"));
    }

    if config.clock.utc_offset_minutes.abs() > MAX_UTC_OFFSET_MINUTES {
        errors.push(ValidationError::new(
            "clock.utc_offset_minutes",
            "must be within ±18 hours",
        ));
    }

    if crate::query::window::Window::parse(&config.summary.default_window).is_none() {
        errors.push(ValidationError::new(
            "summary.default_window",
            format!("invalid window '{}'", config.summary.default_window),
        ));
    }

    if config.admin.enabled && config.admin.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "admin.bind_address",
            format!("invalid socket address '{}'", config.admin.bind_address),
        ));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("invalid socket address '{}'", config.observability.metrics_address),
        ));
    }

    if config.store.backend == StoreBackend::Sqlite && config.store.path.trim().is_empty() {
        errors.push(ValidationError::new("store.path", "must not be empty for the sqlite backend"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Thresholds;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&WatchConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_every_error() {
        let mut config = WatchConfig::default();
        config.jobs.payments.thresholds = Thresholds::new(72.0, 72.0);
        config.jobs.eol_products.schedule.offset_secs = 60;
        config.retries.max_attempts = 9;
        config.clock.utc_offset_minutes = 19 * 60;

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(
            fields,
            vec![
                "jobs.payments.thresholds",
                "jobs[prestashop.eol_products].schedule.offset_secs",
                "retries.max_attempts",
                "clock.utc_offset_minutes",
            ]
        );
    }

    #[test]
    fn test_cadence_period_is_bounded() {
        let mut config = WatchConfig::default();
        config.jobs.carts_stale.schedule.every_secs = u64::MAX;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "jobs[prestashop.carts_stale].schedule.every_secs");

        config.jobs.carts_stale.schedule.every_secs = MAX_PERIOD_SECS;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_enabled_job_needs_url() {
        let mut config = WatchConfig::default();
        config.jobs.orders_delayed.enabled = true;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors[0].field, "jobs[prestashop.orders_delayed].url");

        config.jobs.orders_delayed.url = "https://shop.example/__watchdogs/check_orders.php".into();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_duplicate_names() {
        let mut config = WatchConfig::default();
        config.jobs.carts_stale.name = "prestashop.payments".into();
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "duplicate job name");
    }

    #[test]
    fn test_pagespeed_thresholds_checked() {
        let mut config = WatchConfig::default();
        config.jobs.pagespeed.product.ttfb_ms = Thresholds::new(800.0, 350.0);
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors[0].field, "jobs.pagespeed.product.ttfb_ms");
    }
}
