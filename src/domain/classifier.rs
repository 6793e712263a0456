//! Generic threshold classifier.
//!
//! # Rule
//! ```text
//! Critical  if magnitude is Unknown or magnitude >= crit
//! Warning   if warn <= magnitude < crit
//! Ok        otherwise
//! ```
//! Both boundaries are inclusive. Missing data never reads as healthy.

use serde::{Deserialize, Serialize};

use crate::domain::severity::Severity;

/// A derived magnitude (elapsed hours, days, milliseconds, bytes...).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Magnitude {
    Known(f64),
    /// Timestamp or metric missing or unparsable.
    Unknown,
}

impl Magnitude {
    pub fn from_option(value: Option<f64>) -> Self {
        match value {
            Some(v) if v.is_finite() => Magnitude::Known(v),
            _ => Magnitude::Unknown,
        }
    }

    pub fn value(self) -> Option<f64> {
        match self {
            Magnitude::Known(v) => Some(v),
            Magnitude::Unknown => None,
        }
    }
}

/// A `(warn, crit)` pair. Validated at config load so that `warn < crit`.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct Thresholds {
    pub warn: f64,
    pub crit: f64,
}

impl Thresholds {
    pub const fn new(warn: f64, crit: f64) -> Self {
        Self { warn, crit }
    }

    pub fn is_valid(&self) -> bool {
        self.warn.is_finite() && self.crit.is_finite() && self.warn < self.crit
    }
}

/// Classify a magnitude against a threshold pair.
pub fn classify(magnitude: Magnitude, thresholds: Thresholds) -> Severity {
    match magnitude {
        Magnitude::Unknown => Severity::Critical,
        Magnitude::Known(m) if m >= thresholds.crit => Severity::Critical,
        Magnitude::Known(m) if m >= thresholds.warn => Severity::Warning,
        Magnitude::Known(_) => Severity::Ok,
    }
}

/// Per-domain classifier instance.
///
/// Domains with a boolean split (dropshipping orders) configure an alternate
/// pair; the flag only selects the thresholds, the rule is the same.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Classifier {
    standard: Thresholds,
    alternate: Option<Thresholds>,
}

impl Classifier {
    pub fn new(standard: Thresholds) -> Self {
        Self { standard, alternate: None }
    }

    pub fn with_alternate(standard: Thresholds, alternate: Thresholds) -> Self {
        Self { standard, alternate: Some(alternate) }
    }

    pub fn thresholds(&self, use_alternate: bool) -> Thresholds {
        match self.alternate {
            Some(alt) if use_alternate => alt,
            _ => self.standard,
        }
    }

    pub fn classify(&self, magnitude: Magnitude) -> Severity {
        classify(magnitude, self.standard)
    }

    pub fn classify_with(&self, magnitude: Magnitude, use_alternate: bool) -> Severity {
        classify(magnitude, self.thresholds(use_alternate))
    }
}
