//! Read side over the snapshot log.
//!
//! # Data Flow
//! ```text
//! SnapshotStore::snapshots(filter)
//!     → latest.rs      one row per subject, display order
//!     → timeseries.rs  buckets, percentiles, downsampling
//!     → alerts.rs      open alerts per domain, worst and oldest first
//! window.rs turns "6h" / "3d" into a duration, bucket width and point budget
//! ```

pub mod alerts;
pub mod latest;
pub mod timeseries;
pub mod window;

pub use alerts::{grouped_alerts, GroupedAlerts, MinStatus};
pub use latest::{latest_cycle, latest_state};
pub use timeseries::{time_series, Percentiles, SeriesSelector, TimeSeries};
pub use window::Window;
