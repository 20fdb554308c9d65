//! In-memory TTL cache with stale data support.
//!
//! - [`Cache::get`] returns data only while it is fresh.
//! - [`Cache::get_stale`] returns data past its TTL as long as it was created
//!   within `max_age`; used as a last resort when every provider failed.
//! - When `max_entries` is reached, the oldest 20% of entries (by creation
//!   time) are evicted in one batch before the insert.
//!
//! The cache is in-memory only and is dropped with the process.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use log::{debug, warn};
use tokio::time::Instant;

use crate::clock::{saturating_add, Clock, SystemClock};

/// Serialised payload stored by tool handlers.
pub type Payload = Arc<str>;

/// Fraction of entries removed per eviction batch (1/5 = 20%).
const EVICTION_DIVISOR: usize = 5;

/// A single immutable cache entry.
#[derive(Clone, Debug)]
struct CacheEntry<V> {
    value: V,
    created_at: Instant,
    expires_at: Instant,
}

impl<V> CacheEntry<V> {
    fn is_fresh(&self, now: Instant) -> bool {
        now <= self.expires_at
    }

    fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.created_at)
    }
}

/// Snapshot of cache counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub max_entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub stale_hits: u64,
    pub evictions: u64,
}

/// Bounded key/value store with per-entry TTL and a stale window.
///
/// Thread-safe: reads share a lock, inserts and evictions take it exclusively,
/// so no reader observes a half-evicted map.
pub struct Cache<V = Payload> {
    entries: RwLock<HashMap<String, CacheEntry<V>>>,
    max_entries: usize,
    clock: Arc<dyn Clock>,
    hits: AtomicU64,
    misses: AtomicU64,
    stale_hits: AtomicU64,
    evictions: AtomicU64,
}

impl<V: Clone> Cache<V> {
    /// Create a cache bounded to `max_entries` (at least 1).
    pub fn new(max_entries: usize) -> Self {
        Self::with_clock(max_entries, Arc::new(SystemClock))
    }

    /// Create a cache that reads time from `clock`.
    pub fn with_clock(max_entries: usize, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            max_entries: max_entries.max(1),
            clock,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            stale_hits: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Lock the map for reading, recovering from poison if necessary.
    ///
    /// Entries are immutable and replaced wholesale, so a poisoned lock never
    /// guards a half-written entry.
    fn read_entries(&self) -> RwLockReadGuard<'_, HashMap<String, CacheEntry<V>>> {
        self.entries.read().unwrap_or_else(|poisoned| {
            warn!("Cache lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn write_entries(&self) -> RwLockWriteGuard<'_, HashMap<String, CacheEntry<V>>> {
        self.entries.write().unwrap_or_else(|poisoned| {
            warn!("Cache lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Return the value only if it has not expired.
    ///
    /// Expired entries stay in place for [`get_stale`](Self::get_stale).
    pub fn get(&self, key: &str) -> Option<V> {
        let now = self.clock.now();
        let entries = self.read_entries();

        match entries.get(key) {
            Some(entry) if entry.is_fresh(now) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry.value.clone())
            }
            _ => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Return the value if it was created within `max_age`, ignoring its TTL.
    pub fn get_stale(&self, key: &str, max_age: Duration) -> Option<V> {
        let now = self.clock.now();
        let entries = self.read_entries();

        let entry = entries.get(key)?;
        if entry.age(now) > max_age {
            return None;
        }
        self.stale_hits.fetch_add(1, Ordering::Relaxed);
        Some(entry.value.clone())
    }

    /// Insert or replace `key`, restarting its TTL and stale clock.
    pub fn set(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let key = key.into();
        let mut entries = self.write_entries();

        if entries.len() >= self.max_entries {
            self.evict(&mut entries);
        }

        let now = self.clock.now();
        entries.insert(
            key,
            CacheEntry {
                value,
                created_at: now,
                expires_at: saturating_add(now, ttl),
            },
        );
    }

    /// Remove the oldest 20% of entries (at least one).
    fn evict(&self, entries: &mut HashMap<String, CacheEntry<V>>) {
        if entries.is_empty() {
            return;
        }

        let count = (entries.len() / EVICTION_DIVISOR).max(1);
        let mut by_age: Vec<(Instant, String)> = entries
            .iter()
            .map(|(key, entry)| (entry.created_at, key.clone()))
            .collect();
        by_age.sort_unstable_by_key(|(created_at, _)| *created_at);

        for (_, key) in by_age.into_iter().take(count) {
            entries.remove(&key);
        }

        self.evictions.fetch_add(count as u64, Ordering::Relaxed);
        debug!(
            "Cache: evicted {} oldest entries ({} remain, bound {})",
            count,
            entries.len(),
            self.max_entries
        );
    }

    /// Remove every entry.
    pub fn clear(&self) {
        self.write_entries().clear();
    }

    /// Current number of entries, fresh or not.
    pub fn len(&self) -> usize {
        self.read_entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether an entry exists for `key`, regardless of age.
    pub fn contains_key(&self, key: &str) -> bool {
        self.read_entries().contains_key(key)
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.len(),
            max_entries: self.max_entries,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            stale_hits: self.stale_hits.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}
