//! Cache of remote API responses

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

/// API response cache entry
#[derive(Debug, Clone)]
pub struct ApiCacheEntry {
    pub value: serde_json::Value,
    pub cached_at: Instant,
}

/// In-memory cache of GET responses, keyed by request path and query
pub struct ApiResponseCache {
    entries: RwLock<HashMap<String, ApiCacheEntry>>,
    capacity: usize,
    ttl: Duration,
}

impl ApiResponseCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            capacity,
            ttl,
        }
    }

    /// A cached response that has not expired yet
    pub fn get(&self, key: &str) -> Option<serde_json::Value> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries
            .get(key)
            .filter(|e| e.cached_at.elapsed() < self.ttl)
            .map(|e| e.value.clone())
    }

    pub fn insert(&self, key: &str, value: serde_json::Value) {
        if self.capacity == 0 || self.ttl.is_zero() {
            return;
        }
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());

        // Evict oldest if at capacity
        if entries.len() >= self.capacity && !entries.contains_key(key) {
            if let Some(oldest) = entries
                .iter()
                .min_by_key(|(_, e)| e.cached_at)
                .map(|(k, _)| k.clone())
            {
                entries.remove(&oldest);
            }
        }

        entries.insert(
            key.to_string(),
            ApiCacheEntry {
                value,
                cached_at: Instant::now(),
            },
        );
    }

    /// Drop every entry whose key starts with `prefix`
    pub fn invalidate_prefix(&self, prefix: &str) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.retain(|key, _| !key.starts_with(prefix));
    }

    /// Clear the cache, returning how many entries were dropped
    pub fn clear(&self) -> usize {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        let count = entries.len();
        entries.clear();
        count
    }

    pub fn len(&self) -> usize {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
