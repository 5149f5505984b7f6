use std::hash::Hash;

use kairos_utils::hash::hash_of;

use crate::cache::partition::Partition;

const MAX_PARTITIONS: usize = 16;

/// IdentityCache remembers values that have already been written to a secondary index,
/// so the write path can skip redundant index writes.
///
/// Keys are spread over up to 16 partitions by hash, each an LRU guarded by its own
/// mutex. With a single partition eviction is exactly least-recently-used across the
/// whole cache; with more, LRU order is kept per partition.
///
/// Forgetting a key is always safe: it only causes one more idempotent index write.
/// The other direction is not: callers must only [`cache`](Self::cache) a key once the
/// matching index write has been handed to a write buffer.
pub struct IdentityCache<K: Hash + Eq> {
    partitions: Vec<Partition<K>>,
}

impl<K: Hash + Eq> IdentityCache<K> {
    pub fn new(capacity: usize) -> Self {
        Self::with_partitions(capacity, 1)
    }

    /// with_partitions splits capacity evenly across n partitions, n clamped to 1..=16.
    pub fn with_partitions(capacity: usize, n: usize) -> Self {
        let n = n.clamp(1, MAX_PARTITIONS);
        let per_partition = (capacity / n).max(1);

        let partitions = (0..n).map(|_| Partition::new(per_partition)).collect();
        Self { partitions }
    }

    fn partition(&self, key: &K) -> &Partition<K> {
        if self.partitions.len() == 1 {
            return &self.partitions[0];
        }
        let n = hash_of(key);
        &self.partitions[(n % self.partitions.len() as u64) as usize]
    }

    /// is_cached returns true iff key was cached and has not been evicted since.
    pub fn is_cached(&self, key: &K) -> bool {
        self.partition(key).contains(key)
    }

    /// cache marks key as written.
    pub fn cache(&self, key: K) {
        self.partition(&key).insert(key)
    }

    pub fn len(&self) -> usize {
        self.partitions.iter().map(|p| p.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.partitions.iter().map(|p| p.capacity()).sum()
    }

    pub fn clear(&self) {
        self.partitions.iter().for_each(|p| p.reset());
    }
}
