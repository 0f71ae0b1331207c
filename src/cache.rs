// cache.rs

use std::hash::Hash;

use rustc_hash::FxHashMap;

/// An LRU cache bounded by a byte budget rather than an entry count.
/// Eviction removes whole entries, oldest first, until the budget holds.
/// Values are expected to be cheap to clone (typically `Arc`s).
///
/// Recency is tracked with a monotonic tick and eviction scans for the
/// minimum; entry populations here are small (decoded blocks, footers,
/// weight vectors), so the scan beats maintaining an intrusive list.
#[derive(Debug)]
pub struct LruCache<K, V> {
    map: FxHashMap<K, Entry<V>>,
    capacity_bytes: usize,
    size_bytes: usize,
    tick: u64,
    hits: u64,
    misses: u64,
}

#[derive(Debug)]
struct Entry<V> {
    value: V,
    weight: usize,
    last_used: u64,
}

impl<K: Hash + Eq + Clone, V: Clone> LruCache<K, V> {
    pub fn new(capacity_bytes: usize) -> Self {
        Self {
            map: FxHashMap::default(),
            capacity_bytes,
            size_bytes: 0,
            tick: 0,
            hits: 0,
            misses: 0,
        }
    }

    pub fn get(&mut self, key: &K) -> Option<V> {
        self.tick += 1;
        match self.map.get_mut(key) {
            Some(entry) => {
                entry.last_used = self.tick;
                self.hits += 1;
                Some(entry.value.clone())
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    /// Insert `value` accounting for `weight` bytes. Entries larger than
    /// the whole budget are not cached at all; callers simply keep their
    /// own handle to the value.
    pub fn insert(&mut self, key: K, value: V, weight: usize) {
        if weight > self.capacity_bytes {
            return;
        }
        self.tick += 1;
        if let Some(old) = self.map.remove(&key) {
            self.size_bytes -= old.weight;
        }
        while self.size_bytes + weight > self.capacity_bytes {
            self.evict_one();
        }
        self.size_bytes += weight;
        self.map.insert(
            key,
            Entry {
                value,
                weight,
                last_used: self.tick,
            },
        );
    }

    fn evict_one(&mut self) {
        let oldest = self
            .map
            .iter()
            .min_by_key(|(_, e)| e.last_used)
            .map(|(k, _)| k.clone());
        if let Some(key) = oldest {
            if let Some(entry) = self.map.remove(&key) {
                self.size_bytes -= entry.weight;
            }
        }
    }

    pub fn contains(&self, key: &K) -> bool {
        self.map.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn capacity_bytes(&self) -> usize {
        self.capacity_bytes
    }

    pub fn size_bytes(&self) -> usize {
        self.size_bytes
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }

    pub fn clear(&mut self) {
        self.map.clear();
        self.size_bytes = 0;
    }
}
