//! Bounded insertion-ordered cache for computed production trees

use std::collections::{HashMap, VecDeque};
use std::hash::Hash;

use tracing::debug;

pub const DEFAULT_CAPACITY: usize = 100;

/// FIFO cache: when full, the entry inserted first is evicted.
/// Reads do not refresh an entry's position.
///
/// Values are cloned on the way in and on the way out, so a caller never
/// shares a cached value with another caller.
#[derive(Debug)]
pub struct FifoCache<K, V> {
    capacity: usize,
    order: VecDeque<K>,
    entries: HashMap<K, V>,
}

impl<K, V> FifoCache<K, V>
where
    K: Eq + Hash + Clone + std::fmt::Debug,
    V: Clone,
{
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            order: VecDeque::with_capacity(capacity),
            entries: HashMap::with_capacity(capacity),
        }
    }

    pub fn get(&self, key: &K) -> Option<V> {
        self.entries.get(key).cloned()
    }

    /// Insert a copy of `value`. Replacing an existing key keeps its original position.
    pub fn insert(&mut self, key: K, value: &V) {
        if let Some(existing) = self.entries.get_mut(&key) {
            *existing = value.clone();
            return;
        }
        while self.entries.len() >= self.capacity {
            let Some(oldest) = self.order.pop_front() else {
                break;
            };
            debug!(key = ?oldest, "evicting oldest cache entry");
            self.entries.remove(&oldest);
        }
        self.order.push_back(key.clone());
        self.entries.insert(key, value.clone());
    }

    pub fn clear(&mut self) {
        self.order.clear();
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }
}

impl<K, V> Default for FifoCache<K, V>
where
    K: Eq + Hash + Clone + std::fmt::Debug,
    V: Clone,
{
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
