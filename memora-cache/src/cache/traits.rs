//! Cache contract and usage statistics.
//!
//! This module defines the trait a cache must implement to back a memoizing
//! wrapper, and the counters the wrapper keeps about it.

use std::sync::atomic::{AtomicU64, Ordering};

use memora_core::{Key, StoreError};
use serde::{Deserialize, Serialize};

/// Mapping contract for pluggable cache implementations.
///
/// Methods take `&self`: implementations synchronize internally, so a cache
/// can be shared between wrappers and threads. Eviction, if any, happens
/// inside `set` and is invisible to callers.
///
/// # Absence
///
/// A missing key is an ordinary `None` from [`Cache::get`], never an error.
pub trait Cache<V> {
    /// Look up a value.
    fn get(&self, key: &Key) -> Option<V>;

    /// Insert or overwrite a value.
    ///
    /// Implementations may refuse the value (for example when it cannot fit);
    /// the wrapper treats a refusal as best-effort caching.
    fn set(&self, key: Key, value: V) -> Result<(), StoreError>;

    /// Remove a value, returning it if it was present.
    fn delete(&self, key: &Key) -> Option<V>;

    /// Number of entries currently held.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether a key is present.
    fn contains(&self, key: &Key) -> bool;

    /// Drop every entry.
    fn clear(&self);

    /// Maximum capacity, for bounded caches.
    fn capacity(&self) -> Option<usize> {
        None
    }
}

/// Snapshot of a wrapper's cache usage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheInfo {
    /// Wrapper name, if configured.
    pub name: Option<String>,
    /// Number of lookups answered from the cache.
    pub hits: u64,
    /// Number of lookups that fell through to the wrapped function.
    pub misses: u64,
    /// Capacity reported by the cache.
    pub max_size: Option<usize>,
    /// Entries currently in the cache.
    pub current_size: usize,
}

impl CacheInfo {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Lock-free hit/miss counters.
#[derive(Debug, Default)]
pub struct CallStats {
    hits: AtomicU64,
    misses: AtomicU64,
}

impl CallStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn reset(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }
}
