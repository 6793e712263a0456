//! Look-back windows such as `6h`, `3d` or `1w`.

use chrono::{DateTime, Duration, Utc};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowUnit {
    Seconds,
    Minutes,
    Hours,
    Days,
    Weeks,
}

impl WindowUnit {
    fn from_char(c: char) -> Option<Self> {
        match c {
            's' => Some(WindowUnit::Seconds),
            'm' => Some(WindowUnit::Minutes),
            'h' => Some(WindowUnit::Hours),
            'd' => Some(WindowUnit::Days),
            'w' => Some(WindowUnit::Weeks),
            _ => None,
        }
    }

    fn suffix(self) -> char {
        match self {
            WindowUnit::Seconds => 's',
            WindowUnit::Minutes => 'm',
            WindowUnit::Hours => 'h',
            WindowUnit::Days => 'd',
            WindowUnit::Weeks => 'w',
        }
    }

    fn seconds(self) -> i64 {
        match self {
            WindowUnit::Seconds => 1,
            WindowUnit::Minutes => 60,
            WindowUnit::Hours => 3_600,
            WindowUnit::Days => 86_400,
            WindowUnit::Weeks => 604_800,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    amount: u32,
    unit: WindowUnit,
}

impl Default for Window {
    fn default() -> Self {
        Self { amount: 24, unit: WindowUnit::Hours }
    }
}

impl Window {
    pub const fn new(amount: u32, unit: WindowUnit) -> Self {
        Self { amount, unit }
    }

    /// Parse `<n><s|m|h|d|w>`, surrounding whitespace allowed.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        let unit = WindowUnit::from_char(raw.chars().last()?)?;
        let digits = raw[..raw.len() - 1].trim();
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let amount = digits.parse().ok()?;
        Some(Self { amount, unit })
    }

    /// Like [`Window::parse`], falling back to 24 hours.
    pub fn parse_or_default(raw: Option<&str>) -> Self {
        raw.and_then(Self::parse).unwrap_or_default()
    }

    pub fn duration(&self) -> Duration {
        Duration::seconds(i64::from(self.amount) * self.unit.seconds())
    }

    /// Start of the window ending at `now`; saturates at the earliest
    /// representable instant.
    pub fn since(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now.checked_sub_signed(self.duration()).unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    /// Bucket width for time series over this window.
    ///
    /// Sub-day units are judged in hours (≤3 → 1, ≤12 → 5, else 10);
    /// day and week units in days (≤2 → 10, ≤7 → 30, else 60).
    pub fn bucket_minutes(&self) -> u32 {
        let secs = self.duration().num_seconds();
        match self.unit {
            WindowUnit::Seconds | WindowUnit::Minutes | WindowUnit::Hours => {
                let hours = secs as f64 / 3_600.0;
                if hours <= 3.0 {
                    1
                } else if hours <= 12.0 {
                    5
                } else {
                    10
                }
            }
            WindowUnit::Days | WindowUnit::Weeks => {
                let days = secs / 86_400;
                if days <= 2 {
                    10
                } else if days <= 7 {
                    30
                } else {
                    60
                }
            }
        }
    }

    /// Point budget for a downsampled series over this window.
    pub fn max_points(&self) -> usize {
        match (self.amount, self.unit) {
            (6, WindowUnit::Hours) => 180,
            (12, WindowUnit::Hours) => 240,
            (24, WindowUnit::Hours) => 288,
            (3, WindowUnit::Days) | (7, WindowUnit::Days) => 336,
            _ => 240,
        }
    }
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.amount, self.unit.suffix())
    }
}
