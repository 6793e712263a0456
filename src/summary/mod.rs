//! Dashboard summary assembly and caching.
//!
//! # Data Flow
//! ```text
//! summary(window, sections)
//!     → cache key "<window>|<sorted sections>"
//!     → SummaryCache::get          hit: stored value, unchanged
//!     → miss: per section
//!         → sections::build        Ok → sections[name]
//!                                  Err → errors[name] (≤200 chars)
//!     → SummaryCache::set(ttl)
//! ```
//!
//! # Design Decisions
//! - No lock is held while sections are computed; concurrent misses each
//!   compute and the last `set` wins
//! - Unknown section names are reported in `errors`, never rejected

pub mod cache;
pub mod sections;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use crate::clock::Clock;
use crate::observability::metrics;
use crate::query::window::Window;
use crate::store::SharedStore;

pub use cache::{MemoryCache, SummaryCache};
pub use sections::{Section, SectionContext};

const MAX_ERROR_CHARS: usize = 200;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub generated_at: DateTime<Utc>,
    pub window: String,
    pub sections: BTreeMap<String, Value>,
    pub errors: BTreeMap<String, String>,
}

/// Sections requested by a comma separated list; empty means all.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Request {
    known: BTreeSet<Section>,
    unknown: BTreeSet<String>,
}

impl Request {
    fn parse(raw: Option<&str>) -> Self {
        let names: Vec<&str> = raw
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();
        if names.is_empty() {
            return Self { known: Section::ALL.into_iter().collect(), unknown: BTreeSet::new() };
        }

        let mut known = BTreeSet::new();
        let mut unknown = BTreeSet::new();
        for name in names {
            match Section::parse(name) {
                Some(section) => {
                    known.insert(section);
                }
                None => {
                    unknown.insert(name.to_string());
                }
            }
        }
        Self { known, unknown }
    }

    fn cache_key(&self, window: &Window) -> String {
        let names: Vec<&str> = self
            .known
            .iter()
            .map(|s| s.as_str())
            .chain(self.unknown.iter().map(String::as_str))
            .collect();
        format!("{window}|{}", names.join(","))
    }
}

fn truncate(message: &str) -> String {
    message.chars().take(MAX_ERROR_CHARS).collect()
}

pub struct DashboardService {
    store: SharedStore,
    cache: Arc<dyn SummaryCache<Arc<Summary>>>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    default_window: Window,
}

impl DashboardService {
    pub fn new(
        store: SharedStore,
        cache: Arc<dyn SummaryCache<Arc<Summary>>>,
        clock: Arc<dyn Clock>,
        ttl: Duration,
    ) -> Self {
        Self { store, cache, clock, ttl, default_window: Window::default() }
    }

    pub fn with_default_window(mut self, window: Window) -> Self {
        self.default_window = window;
        self
    }

    /// Cached summary for `window` and the requested `sections`.
    ///
    /// Reads the store synchronously; call from a blocking context.
    pub fn summary(&self, window: Option<&str>, sections: Option<&str>) -> Arc<Summary> {
        let window = window.and_then(Window::parse).unwrap_or(self.default_window);
        let request = Request::parse(sections);
        let key = request.cache_key(&window);

        if let Some(hit) = self.cache.get(&key) {
            metrics::record_summary_cache(true);
            return hit;
        }
        metrics::record_summary_cache(false);

        let summary = Arc::new(self.assemble(window, &request));
        self.cache.set(key, Arc::clone(&summary), self.ttl);
        summary
    }

    fn assemble(&self, window: Window, request: &Request) -> Summary {
        let now = self.clock.now();
        let ctx = SectionContext { now, window };
        let mut sections = BTreeMap::new();
        let mut errors = BTreeMap::new();

        for section in &request.known {
            match sections::build(*section, self.store.as_ref(), &ctx) {
                Ok(value) => {
                    sections.insert(section.as_str().to_string(), value);
                }
                Err(err) => {
                    tracing::warn!(section = %section, error = %err, "Summary section failed");
                    errors.insert(section.as_str().to_string(), truncate(&err.to_string()));
                }
            }
        }
        for name in &request.unknown {
            errors.insert(name.clone(), format!("unknown section `{}`", truncate(name)));
        }

        Summary { generated_at: now, window: window.to_string(), sections, errors }
    }
}
