//! Canonical severity type.
//!
//! # Ordering
//! ```text
//! Critical (0) < Warning (1) < Ok (2)
//! ```
//! Lower rank is more urgent. Every ranking in the crate (latest-state
//! ordering, worst-of-cycle, dashboard counts) goes through `Ord` on this
//! type, so there is exactly one comparison.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Health classification of a single observation.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical = 0,
    Warning = 1,
    Ok = 2,
}

impl Severity {
    /// Numeric rank, lower is more urgent.
    pub fn rank(self) -> u8 {
        self as u8
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::Warning => "warning",
            Severity::Ok => "ok",
        }
    }

    /// Most urgent of the two.
    pub fn worst(self, other: Severity) -> Severity {
        self.min(other)
    }

    /// Most urgent severity in a sequence; `Ok` when empty.
    pub fn worst_of<I: IntoIterator<Item = Severity>>(items: I) -> Severity {
        items.into_iter().fold(Severity::Ok, Severity::worst)
    }

    pub fn is_ok(self) -> bool {
        self == Severity::Ok
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a stored severity label is not one of the three values.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown severity label: {0}")]
pub struct UnknownSeverity(pub String);

impl FromStr for Severity {
    type Err = UnknownSeverity;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "critical" => Ok(Severity::Critical),
            "warning" => Ok(Severity::Warning),
            "ok" => Ok(Severity::Ok),
            other => Err(UnknownSeverity(other.to_string())),
        }
    }
}
