//! Memoizing wrapper.
//!
//! [`Cached`] wraps a [`Callable`] and answers repeated calls from a
//! [`Cache`]. One invocation runs:
//!
//! ```text
//! build key ─→ [lock] get ─┬─ hit ──────────────────────────→ return cached
//!                          └─ miss ─→ call ─┬─ ignored ─────→ return
//!                                           └─ [lock] set ──→ return
//! ```
//!
//! The lock covers the two cache accesses only, never the wrapped function,
//! so concurrent misses on one key all compute and the last store wins.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use memora_cache::{cached, BoundedCache};
//! use memora_core::{call_args, CallArgs, MemoError};
//!
//! let cache = Arc::new(BoundedCache::new(128));
//! let square = cached(Arc::clone(&cache))
//!     .ignore(|v: &i64, _: &CallArgs| *v < 0)
//!     .wrap(|args: &CallArgs| -> Result<i64, MemoError> {
//!         let n = args.get(0).and_then(|a| a.as_int()).unwrap_or_default();
//!         Ok(n * n)
//!     });
//!
//! assert_eq!(square.call(&call_args![4]).unwrap(), 16);
//! assert_eq!(square.call(&call_args![4.0]).unwrap(), 16);
//! assert_eq!(square.cache_info().hits, 1);
//! ```

use std::fmt;
use std::sync::Arc;

use memora_core::{CallArgs, HashKey, Key, KeyBuilder, MemoConfig, MemoError, MemoResult, StoreError};

use crate::cache::{Cache, CacheInfo, CallStats};
use crate::lock::{CacheLock, LockScope, NoLock};

/// Something that can be called with [`CallArgs`].
///
/// Every `Fn(&CallArgs) -> Result<T, E>` is callable, and so is [`Cached`],
/// which is what lets wrappers stack.
pub trait Callable {
    type Output;
    type Error;

    fn call(&self, args: &CallArgs) -> Result<Self::Output, Self::Error>;
}

impl<F, T, E> Callable for F
where
    F: Fn(&CallArgs) -> Result<T, E>,
{
    type Output = T;
    type Error = E;

    fn call(&self, args: &CallArgs) -> Result<T, E> {
        self(args)
    }
}

/// Decides, after the call, whether a result stays out of the cache.
pub type IgnoreFn<T> = Arc<dyn Fn(&T, &CallArgs) -> bool + Send + Sync>;

/// Cache type of a wrapper built with [`Memoize::uncached`].
///
/// Uninhabited: such a wrapper never holds a cache.
#[derive(Debug, Clone, Copy)]
pub enum NoCache {}

impl<V> Cache<V> for NoCache {
    fn get(&self, _key: &Key) -> Option<V> {
        match *self {}
    }

    fn set(&self, _key: Key, _value: V) -> Result<(), StoreError> {
        match *self {}
    }

    fn delete(&self, _key: &Key) -> Option<V> {
        match *self {}
    }

    fn len(&self) -> usize {
        match *self {}
    }

    fn contains(&self, _key: &Key) -> bool {
        match *self {}
    }

    fn clear(&self) {
        match *self {}
    }
}

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Memoization settings, turned into a wrapper by [`Memoize::wrap`].
///
/// Everything is fixed once wrapped; to change a setting, build a new
/// wrapper.
pub struct Memoize<T, C, K = HashKey> {
    cache: Option<Arc<C>>,
    key: K,
    lock: Arc<dyn CacheLock>,
    ignore: Option<IgnoreFn<T>>,
    config: MemoConfig,
}

/// Start configuring a wrapper around `cache`.
pub fn cached<T, C>(cache: Arc<C>) -> Memoize<T, C>
where
    C: Cache<T>,
{
    Memoize::new(cache)
}

impl<T, C> Memoize<T, C, HashKey>
where
    C: Cache<T>,
{
    pub fn new(cache: Arc<C>) -> Self {
        Self {
            cache: Some(cache),
            key: HashKey,
            lock: Arc::new(NoLock),
            ignore: None,
            config: MemoConfig::default(),
        }
    }
}

impl<T> Memoize<T, NoCache, HashKey> {
    /// A wrapper that never caches: every call goes straight through.
    pub fn uncached() -> Self {
        Self {
            cache: None,
            key: HashKey,
            lock: Arc::new(NoLock),
            ignore: None,
            config: MemoConfig::default(),
        }
    }
}

impl<T, C, K> Memoize<T, C, K> {
    /// Use a different key builder.
    pub fn key<K2: KeyBuilder>(self, key: K2) -> Memoize<T, C, K2> {
        Memoize {
            cache: self.cache,
            key,
            lock: self.lock,
            ignore: self.ignore,
            config: self.config,
        }
    }

    /// Serialize cache accesses with `lock`.
    ///
    /// Share one lock between stacked wrappers only if it is re-entrant.
    pub fn lock(mut self, lock: Arc<dyn CacheLock>) -> Self {
        self.lock = lock;
        self
    }

    /// Skip storing results for which `predicate` returns true.
    pub fn ignore<P>(mut self, predicate: P) -> Self
    where
        P: Fn(&T, &CallArgs) -> bool + Send + Sync + 'static,
    {
        self.ignore = Some(Arc::new(predicate));
        self
    }

    /// Replace the configuration after validating it.
    pub fn config(mut self, config: MemoConfig) -> MemoResult<Self> {
        config.validate()?;
        self.config = config;
        Ok(self)
    }

    /// Name the wrapper in logs and cache info.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = Some(name.into());
        self
    }

    /// Wrap `func`.
    pub fn wrap<F>(self, func: F) -> Cached<F, C, K>
    where
        F: Callable<Output = T>,
    {
        Cached {
            func,
            cache: self.cache,
            key: self.key,
            lock: self.lock,
            ignore: self.ignore,
            config: self.config,
            stats: CallStats::new(),
        }
    }
}

// ============================================================================
// WRAPPER
// ============================================================================

/// A memoized [`Callable`].
pub struct Cached<F: Callable, C, K = HashKey> {
    func: F,
    cache: Option<Arc<C>>,
    key: K,
    lock: Arc<dyn CacheLock>,
    ignore: Option<IgnoreFn<F::Output>>,
    config: MemoConfig,
    stats: CallStats,
}

impl<F: Callable, C, K> Cached<F, C, K> {
    /// The wrapped target.
    pub fn wrapped(&self) -> &F {
        &self.func
    }

    /// The backing cache, unless caching is disabled.
    pub fn cache(&self) -> Option<&Arc<C>> {
        self.cache.as_ref()
    }

    pub fn key_builder(&self) -> &K {
        &self.key
    }

    pub fn config(&self) -> &MemoConfig {
        &self.config
    }
}

impl<F, C, K> Cached<F, C, K>
where
    F: Callable,
    F::Output: Clone,
    F::Error: From<MemoError>,
    C: Cache<F::Output>,
    K: KeyBuilder,
{
    /// Call through the cache.
    ///
    /// Key failures and lock failures on acquire or release are reported
    /// through the wrapped function's own error type; errors from the wrapped
    /// function come back untouched and leave the cache as it was.
    pub fn call(&self, args: &CallArgs) -> Result<F::Output, F::Error> {
        let Some(cache) = self.cache.as_deref() else {
            if self.config.validate_uncached {
                self.key.build(args).map_err(MemoError::from)?;
            }
            return self.func.call(args);
        };

        let key = self.key.build(args).map_err(MemoError::from)?;

        let scope = LockScope::acquire(self.lock.as_ref()).map_err(MemoError::from)?;
        let lookup = cache.get(&key);
        scope.release().map_err(MemoError::from)?;

        if let Some(value) = lookup {
            if self.config.record_stats {
                self.stats.record_hit();
            }
            tracing::trace!(
                cache = self.config.label(),
                key = %key.fingerprint(),
                "cache hit"
            );
            return Ok(value);
        }

        if self.config.record_stats {
            self.stats.record_miss();
        }
        tracing::trace!(
            cache = self.config.label(),
            key = %key.fingerprint(),
            "cache miss"
        );

        let value = self.func.call(args)?;

        if let Some(ignore) = &self.ignore {
            if ignore(&value, args) {
                tracing::debug!(
                    cache = self.config.label(),
                    key = %key.fingerprint(),
                    "result ignored, not cached"
                );
                return Ok(value);
            }
        }

        let scope = LockScope::acquire(self.lock.as_ref()).map_err(MemoError::from)?;
        let stored = cache.set(key, value.clone());
        scope.release().map_err(MemoError::from)?;

        if let Err(err) = stored {
            if self.config.strict_store {
                return Err(MemoError::from(err).into());
            }
            // Best effort: the caller still gets the computed value.
            if err.is_capacity() {
                tracing::debug!(
                    cache = self.config.label(),
                    error = %err,
                    "cache refused value"
                );
            } else {
                tracing::warn!(
                    cache = self.config.label(),
                    error = %err,
                    "Failed to store result"
                );
            }
        }

        Ok(value)
    }

    /// The key a call with `args` would use.
    pub fn cache_key(&self, args: &CallArgs) -> MemoResult<Key> {
        Ok(self.key.build(args)?)
    }

    /// Remove the entry for `args`, returning the value it held.
    pub fn invalidate(&self, args: &CallArgs) -> MemoResult<Option<F::Output>> {
        let key = self.key.build(args)?;
        let Some(cache) = self.cache.as_deref() else {
            return Ok(None);
        };
        let scope = LockScope::acquire(self.lock.as_ref())?;
        let removed = cache.delete(&key);
        scope.release()?;
        Ok(removed)
    }

    /// Empty the cache and reset hit/miss counters.
    pub fn cache_clear(&self) -> MemoResult<()> {
        if let Some(cache) = self.cache.as_deref() {
            let scope = LockScope::acquire(self.lock.as_ref())?;
            cache.clear();
            scope.release()?;
        }
        self.stats.reset();
        Ok(())
    }

    /// Usage snapshot.
    pub fn cache_info(&self) -> CacheInfo {
        let (max_size, current_size) = match self.cache.as_deref() {
            Some(cache) => (cache.capacity(), cache.len()),
            None => (Some(0), 0),
        };
        CacheInfo {
            name: self.config.name.clone(),
            hits: self.stats.hits(),
            misses: self.stats.misses(),
            max_size,
            current_size,
        }
    }
}

impl<F, C, K> Callable for Cached<F, C, K>
where
    F: Callable,
    F::Output: Clone,
    F::Error: From<MemoError>,
    C: Cache<F::Output>,
    K: KeyBuilder,
{
    type Output = F::Output;
    type Error = F::Error;

    fn call(&self, args: &CallArgs) -> Result<F::Output, F::Error> {
        Cached::call(self, args)
    }
}

impl<F: Callable, C, K> fmt::Debug for Cached<F, C, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cached")
            .field("name", &self.config.name)
            .field("caching", &self.cache.is_some())
            .field("ignore", &self.ignore.is_some())
            .field("hits", &self.stats.hits())
            .field("misses", &self.stats.misses())
            .finish()
    }
}
