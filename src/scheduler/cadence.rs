//! Epoch-aligned cadences and misfire handling.

use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::config::schema::CadenceConfig;

/// Longest supported period: one week.
pub const MAX_PERIOD_SECS: u64 = 7 * 24 * 3600;

/// Fires at `offset` into every `every` period, counted from the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cadence {
    every: Duration,
    offset: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CadenceError {
    #[error("period must be greater than zero")]
    ZeroPeriod,

    #[error("period {0}s exceeds the {MAX_PERIOD_SECS}s maximum")]
    PeriodTooLong(u64),

    #[error("offset {offset_secs}s must be less than the {every_secs}s period")]
    OffsetOutOfRange { every_secs: u64, offset_secs: u64 },
}

impl Cadence {
    pub fn new(every_secs: u64, offset_secs: u64) -> Result<Self, CadenceError> {
        if every_secs == 0 {
            return Err(CadenceError::ZeroPeriod);
        }
        if every_secs > MAX_PERIOD_SECS {
            return Err(CadenceError::PeriodTooLong(every_secs));
        }
        if offset_secs >= every_secs {
            return Err(CadenceError::OffsetOutOfRange { every_secs, offset_secs });
        }
        Ok(Self {
            every: Duration::from_secs(every_secs),
            offset: Duration::from_secs(offset_secs),
        })
    }

    pub fn from_config(config: &CadenceConfig) -> Result<Self, CadenceError> {
        Self::new(config.every_secs, config.offset_secs)
    }

    pub fn every(&self) -> Duration {
        self.every
    }

    pub fn offset(&self) -> Duration {
        self.offset
    }

    /// First slot strictly after `now`.
    pub fn next_after(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        // Both are bounded by MAX_PERIOD_SECS, so milliseconds fit in i64.
        let every = self.every.as_millis() as i64;
        let offset = self.offset.as_millis() as i64;
        let k = (now.timestamp_millis() - offset).div_euclid(every) + 1;
        DateTime::from_timestamp_millis(k * every + offset)
            .unwrap_or_else(|| now + chrono::Duration::milliseconds(every))
    }
}

/// Whether a trigger for `slot` observed at `fired_at` is too late to run.
pub fn is_misfire(slot: DateTime<Utc>, fired_at: DateTime<Utc>, grace: Duration) -> bool {
    match (fired_at - slot).to_std() {
        Ok(lateness) => lateness > grace,
        // fired early or on time
        Err(_) => false,
    }
}
