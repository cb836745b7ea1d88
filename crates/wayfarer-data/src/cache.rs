//! Time-expiring key-value cache for provider responses.
//!
//! Entries expire a fixed duration after insertion. A stale entry is dropped
//! when it is next read, and inserts sweep every stale entry at most once per
//! TTL, so no background task is needed.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// A cached provider payload.
#[derive(Debug, Clone)]
pub struct CachedEntry<V> {
    /// Normalized query the value was fetched for.
    pub key: String,
    pub value: V,
    pub inserted_at: Instant,
}

impl<V> CachedEntry<V> {
    fn is_expired(&self, ttl: Duration, now: Instant) -> bool {
        now.duration_since(self.inserted_at) >= ttl
    }
}

#[derive(Debug)]
struct Entries<V> {
    map: HashMap<String, CachedEntry<V>>,
    last_sweep: Instant,
}

/// TTL cache keyed by normalized query string.
#[derive(Debug)]
pub struct TtlCache<V> {
    ttl: Duration,
    entries: Mutex<Entries<V>>,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(Entries {
                map: HashMap::new(),
                last_sweep: Instant::now(),
            }),
        }
    }

    /// Normalize a raw query into a cache key (trimmed, case-folded).
    pub fn normalize_key(raw: &str) -> String {
        raw.trim().to_lowercase()
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Look up a live entry. Expired entries are removed and reported as misses.
    pub fn get(&self, raw_key: &str) -> Option<V> {
        let key = Self::normalize_key(raw_key);
        let mut entries = match self.entries.lock() {
            Ok(e) => e,
            Err(e) => {
                tracing::error!("Cache lock poisoned: {}", e);
                return None;
            }
        };

        let expired = entries
            .map
            .get(&key)
            .map(|entry| entry.is_expired(self.ttl, Instant::now()))?;
        if expired {
            entries.map.remove(&key);
            return None;
        }
        entries.map.get(&key).map(|entry| entry.value.clone())
    }

    /// Insert or replace the entry for `raw_key`.
    ///
    /// Also drops every expired entry if no sweep has run within the TTL.
    pub fn insert(&self, raw_key: &str, value: V) {
        let key = Self::normalize_key(raw_key);
        let mut entries = match self.entries.lock() {
            Ok(e) => e,
            Err(e) => {
                tracing::error!("Cache lock poisoned: {}", e);
                return;
            }
        };

        let now = Instant::now();
        if now.duration_since(entries.last_sweep) >= self.ttl {
            let ttl = self.ttl;
            entries.map.retain(|_, entry| !entry.is_expired(ttl, now));
            entries.last_sweep = now;
        }
        entries.map.insert(
            key.clone(),
            CachedEntry {
                key,
                value,
                inserted_at: now,
            },
        );
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let Ok(mut entries) = self.entries.lock() else {
            return 0;
        };
        let now = Instant::now();
        let before = entries.map.len();
        entries.map.retain(|_, entry| !entry.is_expired(self.ttl, now));
        entries.last_sweep = now;
        before - entries.map.len()
    }

    /// Number of stored entries, including ones that have expired but not yet been read.
    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.map.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[cfg(test)]
    fn backdate(&self, raw_key: &str, by: Duration) {
        let key = Self::normalize_key(raw_key);
        let mut entries = self.entries.lock().unwrap();
        if let Some(entry) = entries.map.get_mut(&key) {
            entry.inserted_at = entry
                .inserted_at
                .checked_sub(by)
                .expect("instant underflow in test");
        }
    }
}
