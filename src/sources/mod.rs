//! Source adapters: where raw rows come from.
//!
//! # Data Flow
//! ```text
//! SourceAdapter::fetch()
//!     → http.rs   GET JSON feed, extract rows by FeedShape
//!     → probe.rs  time the storefront pages, emit one row per page
//!     → Vec<RawRow> (empty is valid; malformed is an error)
//! ```

pub mod http;
pub mod probe;

use async_trait::async_trait;

use crate::domain::RawRow;
use crate::resilience::Retryable;

pub use http::{FeedShape, HttpJsonSource};
pub use probe::PageProbeSource;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SourceError {
    /// Connection refused, DNS, TLS, timeout.
    #[error("transport error: {0}")]
    Transport(String),

    #[error("upstream returned HTTP {0}")]
    Status(u16),

    #[error("malformed response: {0}")]
    Malformed(String),
}

impl Retryable for SourceError {
    fn is_retryable(&self) -> bool {
        matches!(self, SourceError::Transport(_) | SourceError::Status(502 | 503 | 504))
    }
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            SourceError::Malformed(err.to_string())
        } else if let Some(status) = err.status() {
            SourceError::Status(status.as_u16())
        } else {
            SourceError::Transport(err.to_string())
        }
    }
}

pub type SourceResult<T> = Result<T, SourceError>;

/// Fetches the raw rows of one domain.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Name used in logs and metrics.
    fn name(&self) -> &str;

    async fn fetch(&self) -> SourceResult<Vec<RawRow>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_classification() {
        assert!(SourceError::Transport("timed out".into()).is_retryable());
        assert!(SourceError::Status(502).is_retryable());
        assert!(SourceError::Status(503).is_retryable());
        assert!(SourceError::Status(504).is_retryable());
        assert!(!SourceError::Status(500).is_retryable());
        assert!(!SourceError::Status(404).is_retryable());
        assert!(!SourceError::Status(401).is_retryable());
        assert!(!SourceError::Malformed("not json".into()).is_retryable());
    }
}
