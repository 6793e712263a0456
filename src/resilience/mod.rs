//! Resilience for outbound source calls.
//!
//! # Data Flow
//! ```text
//! Source adapter fetch:
//!     → timeouts.rs (client built with connect + request deadlines)
//!     → On failure: retries.rs (retryable? backoff.rs delay, try again)
//!     → Attempts exhausted: error surfaces to the ingest cycle
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every external call has a deadline
//! - Sources are read-only GETs, so every attempt is idempotent
//! - Only transport failures and 502/503/504 are retried; 4xx never
//! - Attempts are bounded (at most 4) so a cycle cannot spin forever

pub mod backoff;
pub mod retries;
pub mod timeouts;

pub use backoff::calculate_backoff;
pub use retries::{retry_with_backoff, RetryPolicy, Retryable};
pub use timeouts::build_http_client;
