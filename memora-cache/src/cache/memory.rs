//! In-memory cache implementations.
//!
//! Neither implementation evicts. [`BoundedCache`] refuses values that do not
//! fit; the plain `HashMap` caches grow without bound. Plug in a real policy
//! (see the `moka` feature) when eviction matters.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use memora_core::{Key, StoreError};
use parking_lot::{Mutex, RwLock};

use super::traits::Cache;

/// Computes the size a value occupies in a [`BoundedCache`].
pub type SizeFn<V> = Arc<dyn Fn(&V) -> usize + Send + Sync>;

/// Unbounded cache backed by a `HashMap`.
pub type UnboundedCache<V> = RwLock<HashMap<Key, V>>;

struct BoundedInner<V> {
    entries: HashMap<Key, (V, usize)>,
    current_size: usize,
}

/// Capacity-limited cache that refuses inserts instead of evicting.
///
/// Each value has a size (1 by default, or whatever the configured size
/// function says); the sum of sizes never exceeds the capacity. A zero
/// capacity cache refuses everything, which turns a wrapper into a
/// pass-through.
pub struct BoundedCache<V> {
    inner: RwLock<BoundedInner<V>>,
    capacity: usize,
    size_of: Option<SizeFn<V>>,
}

impl<V> BoundedCache<V> {
    /// Create a cache holding at most `capacity` unit-sized values.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: RwLock::new(BoundedInner {
                entries: HashMap::new(),
                current_size: 0,
            }),
            capacity,
            size_of: None,
        }
    }

    /// Measure values with `size_of` instead of counting them.
    pub fn with_size_fn<F>(mut self, size_of: F) -> Self
    where
        F: Fn(&V) -> usize + Send + Sync + 'static,
    {
        self.size_of = Some(Arc::new(size_of));
        self
    }

    /// Sum of the sizes of all held values.
    pub fn current_size(&self) -> usize {
        self.inner.read().current_size
    }

    fn size_of(&self, value: &V) -> usize {
        self.size_of.as_ref().map_or(1, |size_of| size_of(value))
    }
}

impl<V: Clone> Cache<V> for BoundedCache<V> {
    fn get(&self, key: &Key) -> Option<V> {
        self.inner.read().entries.get(key).map(|(v, _)| v.clone())
    }

    fn set(&self, key: Key, value: V) -> Result<(), StoreError> {
        let size = self.size_of(&value);
        if size > self.capacity {
            return Err(StoreError::TooLarge {
                size,
                capacity: self.capacity,
            });
        }

        let mut inner = self.inner.write();
        let replaced = inner.entries.get(&key).map_or(0, |(_, old)| *old);
        let available = self.capacity - (inner.current_size - replaced);
        if size > available {
            return Err(StoreError::Full {
                current: inner.current_size,
                capacity: self.capacity,
                needed: size,
            });
        }

        inner.current_size = inner.current_size - replaced + size;
        inner.entries.insert(key, (value, size));
        Ok(())
    }

    fn delete(&self, key: &Key) -> Option<V> {
        let mut inner = self.inner.write();
        let (value, size) = inner.entries.remove(key)?;
        inner.current_size -= size;
        Some(value)
    }

    fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    fn contains(&self, key: &Key) -> bool {
        self.inner.read().entries.contains_key(key)
    }

    fn clear(&self) {
        let mut inner = self.inner.write();
        inner.entries.clear();
        inner.current_size = 0;
    }

    fn capacity(&self) -> Option<usize> {
        Some(self.capacity)
    }
}

impl<V> fmt::Debug for BoundedCache<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("BoundedCache")
            .field("capacity", &self.capacity)
            .field("len", &inner.entries.len())
            .field("current_size", &inner.current_size)
            .finish()
    }
}

impl<V: Clone> Cache<V> for RwLock<HashMap<Key, V>> {
    fn get(&self, key: &Key) -> Option<V> {
        self.read().get(key).cloned()
    }

    fn set(&self, key: Key, value: V) -> Result<(), StoreError> {
        self.write().insert(key, value);
        Ok(())
    }

    fn delete(&self, key: &Key) -> Option<V> {
        self.write().remove(key)
    }

    fn len(&self) -> usize {
        self.read().len()
    }

    fn contains(&self, key: &Key) -> bool {
        self.read().contains_key(key)
    }

    fn clear(&self) {
        self.write().clear();
    }
}

impl<V: Clone> Cache<V> for Mutex<HashMap<Key, V>> {
    fn get(&self, key: &Key) -> Option<V> {
        self.lock().get(key).cloned()
    }

    fn set(&self, key: Key, value: V) -> Result<(), StoreError> {
        self.lock().insert(key, value);
        Ok(())
    }

    fn delete(&self, key: &Key) -> Option<V> {
        self.lock().remove(key)
    }

    fn len(&self) -> usize {
        self.lock().len()
    }

    fn contains(&self, key: &Key) -> bool {
        self.lock().contains_key(key)
    }

    fn clear(&self) {
        self.lock().clear();
    }
}
