// Copyright 2024 OctoFHIR Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Bounded LRU cache with hit/miss accounting
//!
//! Backs both the expression cache (keyed by exact source text) and the mapping-plan
//! cache (keyed by content hash). A bound of zero disables caching entirely.

use lru::LruCache;
use parking_lot::Mutex;
use serde::Serialize;
use std::hash::Hash;
use std::num::NonZeroUsize;

/// Snapshot of cache counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Current number of entries
    pub size: usize,
    /// Configured bound
    pub max_size: usize,
    /// Lookups served from the cache
    pub hits: u64,
    /// Lookups that missed
    pub misses: u64,
    /// Entries dropped to respect the bound
    pub evictions: u64,
}

impl CacheStats {
    /// Calculate hit ratio (0.0 to 1.0)
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

struct Inner<K: Hash + Eq, V> {
    entries: Option<LruCache<K, V>>,
    hits: u64,
    misses: u64,
    evictions: u64,
}

/// Thread-safe bounded LRU cache
pub struct BoundedCache<K: Hash + Eq, V> {
    name: &'static str,
    max_size: usize,
    inner: Mutex<Inner<K, V>>,
}

impl<K: Hash + Eq, V: Clone> BoundedCache<K, V> {
    /// Create a cache holding at most `max_size` entries
    pub fn new(name: &'static str, max_size: usize) -> Self {
        Self {
            name,
            max_size,
            inner: Mutex::new(Inner {
                entries: NonZeroUsize::new(max_size).map(LruCache::new),
                hits: 0,
                misses: 0,
                evictions: 0,
            }),
        }
    }

    /// Look up an entry, promoting it to most recently used
    pub fn get(&self, key: &K) -> Option<V> {
        let mut inner = self.inner.lock();
        let found = inner.entries.as_mut().and_then(|lru| lru.get(key).cloned());
        match found {
            Some(_) => inner.hits += 1,
            None => inner.misses += 1,
        }
        found
    }

    /// Insert or replace an entry, evicting the least recently used one if full
    pub fn insert(&self, key: K, value: V) {
        let mut inner = self.inner.lock();
        let Some(lru) = inner.entries.as_mut() else {
            return;
        };
        let evicting = !lru.contains(&key) && lru.len() == lru.cap().get();
        lru.put(key, value);
        if evicting {
            inner.evictions += 1;
            log::trace!(
                "{} cache full ({} entries), evicted oldest entry",
                self.name,
                self.max_size
            );
        }
    }

    /// Drop the entry stored under `key`
    pub fn invalidate(&self, key: &K) {
        if let Some(lru) = self.inner.lock().entries.as_mut() {
            lru.pop(key);
        }
    }

    /// Remove all entries and reset counters
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        if let Some(lru) = inner.entries.as_mut() {
            lru.clear();
        }
        inner.hits = 0;
        inner.misses = 0;
        inner.evictions = 0;
        log::debug!("{} cache cleared", self.name);
    }

    /// Number of cached entries
    pub fn len(&self) -> usize {
        self.inner.lock().entries.as_ref().map_or(0, LruCache::len)
    }

    /// Whether the cache holds no entries
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current counters
    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock();
        CacheStats {
            size: inner.entries.as_ref().map_or(0, LruCache::len),
            max_size: self.max_size,
            hits: inner.hits,
            misses: inner.misses,
            evictions: inner.evictions,
        }
    }
}

impl<K: Hash + Eq, V> std::fmt::Debug for BoundedCache<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundedCache")
            .field("name", &self.name)
            .field("max_size", &self.max_size)
            .finish()
    }
}
