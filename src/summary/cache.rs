//! TTL cache for assembled summaries.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::clock::Clock;

/// `get`/`set` with a per-entry time to live.
pub trait SummaryCache<V>: Send + Sync {
    /// The stored value, if it has not expired.
    fn get(&self, key: &str) -> Option<V>;

    /// Store `value` for `ttl`. A zero TTL stores nothing.
    fn set(&self, key: String, value: V, ttl: Duration);
}

struct Entry<V> {
    value: V,
    expires_at: DateTime<Utc>,
}

/// Concurrent in-process cache; last writer wins.
pub struct MemoryCache<V> {
    entries: DashMap<String, Entry<V>>,
    clock: Arc<dyn Clock>,
}

impl<V> MemoryCache<V> {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { entries: DashMap::new(), clock }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<V: Clone + Send + Sync> SummaryCache<V> for MemoryCache<V> {
    fn get(&self, key: &str) -> Option<V> {
        let now = self.clock.now();
        let hit = self
            .entries
            .get(key)
            .filter(|entry| now < entry.expires_at)
            .map(|entry| entry.value.clone());
        if hit.is_none() {
            self.entries.remove_if(key, |_, entry| now >= entry.expires_at);
        }
        hit
    }

    fn set(&self, key: String, value: V, ttl: Duration) {
        if ttl.is_zero() {
            return;
        }
        let Ok(ttl) = chrono::Duration::from_std(ttl) else {
            return;
        };
        let expires_at = self.clock.now() + ttl;
        self.entries.insert(key, Entry { value, expires_at });
    }
}
