//! In-memory TTL cache for reference-store query results.
//!
//! Values are stored as serialized JSON strings so the cache stays untyped
//! and one instance can hold vocabulary snapshots and query results side by
//! side. Expired entries are lazily evicted on the next `get` for that key.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;

struct CacheEntry {
    value: String,
    expires_at: Instant,
}

/// Thread-safe TTL cache keyed by query string.
pub struct QueryCache {
    store: DashMap<String, CacheEntry>,
    ttl: Duration,
}

impl QueryCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            store: DashMap::new(),
            ttl,
        }
    }

    /// Returns the deserialized value for `key`, or `None` if missing,
    /// expired, or no longer decodable.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let entry = self.store.get(key)?;
        if Instant::now() > entry.expires_at {
            drop(entry);
            self.store.remove(key);
            return None;
        }
        serde_json::from_str(&entry.value).ok()
    }

    /// Inserts or overwrites an entry. Serialization failures drop the
    /// entry silently; the cache is an optimization, never a source of truth.
    pub fn set<T: Serialize>(&self, key: &str, value: &T) {
        if let Ok(json) = serde_json::to_string(value) {
            self.store.insert(
                key.to_string(),
                CacheEntry {
                    value: json,
                    expires_at: Instant::now() + self.ttl,
                },
            );
        }
    }

    /// Removes all entries. Called on explicit store refresh.
    pub fn clear(&self) {
        self.store.clear();
    }
}
