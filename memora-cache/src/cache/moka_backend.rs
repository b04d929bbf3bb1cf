//! `moka` adapter: concurrent caches with real eviction policies.
//!
//! Enabled with the `moka` feature. Eviction (size-based, TTL, TTI) is
//! configured on the moka cache itself; the wrapper never sees it.

use memora_core::{Key, StoreError};

use super::traits::Cache;

impl<V> Cache<V> for moka::sync::Cache<Key, V>
where
    V: Clone + Send + Sync + 'static,
{
    fn get(&self, key: &Key) -> Option<V> {
        moka::sync::Cache::get(self, key)
    }

    fn set(&self, key: Key, value: V) -> Result<(), StoreError> {
        self.insert(key, value);
        Ok(())
    }

    fn delete(&self, key: &Key) -> Option<V> {
        self.remove(key)
    }

    /// Flushes pending maintenance first, since moka counts lazily.
    fn len(&self) -> usize {
        self.run_pending_tasks();
        self.entry_count() as usize
    }

    fn contains(&self, key: &Key) -> bool {
        self.contains_key(key)
    }

    fn clear(&self) {
        self.invalidate_all();
        self.run_pending_tasks();
    }

    fn capacity(&self) -> Option<usize> {
        self.policy().max_capacity().map(|c| c as usize)
    }
}
