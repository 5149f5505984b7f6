use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard, PoisonError};

use lru::LruCache;

/// Partition is one LRU shard of an [`IdentityCache`](crate::cache::IdentityCache).
/// Every operation is O(1) under a single mutex.
pub struct Partition<K: Hash + Eq> {
    store: Mutex<LruCache<K, ()>>,
}

impl<K: Hash + Eq> Partition<K> {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            store: Mutex::new(LruCache::new(capacity)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<K, ()>> {
        // the lru map is never left half-updated, a poisoned lock is still usable
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// contains reports whether key is present and marks it most recently used.
    pub fn contains(&self, key: &K) -> bool {
        self.lock().get(key).is_some()
    }

    /// insert marks key most recently used, evicting the least recently used key if
    /// the partition is full.
    pub fn insert(&self, key: K) {
        self.lock().put(key, ());
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn capacity(&self) -> usize {
        self.lock().cap().get()
    }

    pub fn reset(&self) {
        self.lock().clear();
    }
}
