//! In-memory entry table for the rate limiter.
//!
//! Provides concurrent, sharded storage of per-key window counters.

use crate::application::ports::RateLimitStore;
use crate::domain::window::{RateLimitEntry, RateLimitKey};
use ahash::RandomState;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

/// Thread-safe sharded store backed by DashMap.
///
/// Each key hashes to one shard and `with_entry` holds that shard's write
/// lock for the duration of the closure, which makes check-and-consume
/// linearizable per key while keys on other shards proceed in parallel.
/// The sweep goes through `retain`, which takes the same shard locks.
#[derive(Debug)]
pub struct ShardedStore {
    map: DashMap<RateLimitKey, RateLimitEntry, RandomState>,
}

impl ShardedStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            map: DashMap::with_hasher(RandomState::new()),
        }
    }

    /// Create an empty store sized for `capacity` keys.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            map: DashMap::with_capacity_and_hasher(capacity, RandomState::new()),
        }
    }

    /// Insert or replace an entry directly.
    pub fn insert(&self, key: RateLimitKey, entry: RateLimitEntry) {
        self.map.insert(key, entry);
    }

    /// Check if a key exists.
    pub fn contains_key(&self, key: &RateLimitKey) -> bool {
        self.map.contains_key(key)
    }

    /// Copy every entry out of the table.
    pub fn snapshot(&self) -> Vec<(RateLimitKey, RateLimitEntry)> {
        self.map
            .iter()
            .map(|item| (item.key().clone(), *item.value()))
            .collect()
    }
}

impl Default for ShardedStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimitStore for ShardedStore {
    fn with_entry<F, R>(&self, key: RateLimitKey, f: F) -> R
    where
        F: FnOnce(&mut Option<RateLimitEntry>) -> R,
    {
        match self.map.entry(key) {
            Entry::Occupied(mut occupied) => {
                let mut slot = Some(*occupied.get());
                let result = f(&mut slot);
                match slot {
                    Some(entry) => *occupied.get_mut() = entry,
                    None => {
                        occupied.remove();
                    }
                }
                result
            }
            Entry::Vacant(vacant) => {
                let mut slot = None;
                let result = f(&mut slot);
                if let Some(entry) = slot {
                    vacant.insert(entry);
                }
                result
            }
        }
    }

    fn get(&self, key: &RateLimitKey) -> Option<RateLimitEntry> {
        self.map.get(key).map(|item| *item.value())
    }

    fn len(&self) -> usize {
        self.map.len()
    }

    fn clear(&self) {
        self.map.clear();
    }

    fn retain<F>(&self, mut f: F)
    where
        F: FnMut(&RateLimitKey, &RateLimitEntry) -> bool,
    {
        self.map.retain(|key, entry| f(key, entry));
    }
}
