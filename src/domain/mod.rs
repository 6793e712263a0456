//! Typed domain entities and severity classification.
//!
//! # Data Flow
//! ```text
//! RawRow (JSON object from a source adapter)
//!     → DomainMapper::map_row(row, MapContext{now, offset})
//!         → field parsing (raw.rs), RowRejected on unusable rows
//!         → AliasTable rewrite (payments)
//!         → Classifier::classify(magnitude) (classifier.rs)
//!     → Entity: Observation (key, reference time, measure, severity)
//! ```
//!
//! # Design Decisions
//! - One classifier rule for every domain; domains only differ in how they
//!   derive the magnitude and which threshold pair applies
//! - Severity is decided here, once, and stored with the snapshot
//! - Parsing failures are values (`RowOutcome`), so a cycle can count them

pub mod alias;
pub mod carts;
pub mod classifier;
pub mod eol;
pub mod health;
pub mod orders;
pub mod pagespeed;
pub mod payments;
pub mod raw;
pub mod severity;
pub mod subject;

use chrono::{DateTime, Utc};

pub use alias::AliasTable;
pub use classifier::{classify, Classifier, Magnitude, Thresholds};
pub use raw::{MapContext, RawRow, RowOutcome, RowRejected};
pub use severity::Severity;
pub use subject::SubjectType;

/// A classified entity ready to become a snapshot.
pub trait Observation: Send + Sync + 'static {
    /// Natural key of the monitored subject.
    fn subject_key(&self) -> &str;

    /// Timestamp the dedup reducer compares; `None` when the feed has none.
    fn reference_time(&self) -> Option<DateTime<Utc>>;

    fn severity(&self) -> Severity;

    /// Numeric magnitude, `None` when unknown.
    fn measure(&self) -> Option<f64>;

    /// Domain fields persisted alongside the snapshot.
    fn metadata(&self) -> serde_json::Value;
}

/// Parses one raw row of a domain into its typed, classified entity.
pub trait DomainMapper: Send + Sync + 'static {
    type Entity: Observation;

    fn subject_type(&self) -> SubjectType;

    fn map_row(&self, row: &RawRow, ctx: &MapContext) -> RowOutcome<Self::Entity>;
}
