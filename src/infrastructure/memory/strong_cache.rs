//! Strong, byte-bounded LRU tier of the memory cache.

use std::sync::Arc;

use lru::LruCache;
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::domain::entities::{CacheKey, CacheValue};

use super::WeakMemoryCache;

/// LRU cache bounded by the total byte size of its images.
///
/// Evicted entries are demoted into the weak tier rather than dropped, since
/// another owner may still be displaying them.
pub struct StrongMemoryCache {
    max_size: u64,
    state: Mutex<StrongState>,
    weak: Option<Arc<WeakMemoryCache>>,
}

struct StrongState {
    entries: LruCache<CacheKey, StrongEntry>,
    size: u64,
}

struct StrongEntry {
    value: CacheValue,
    size: u64,
}

impl StrongMemoryCache {
    /// Creates a cache holding at most `max_size` bytes, demoting into `weak`.
    #[must_use]
    pub fn new(max_size: u64, weak: Option<Arc<WeakMemoryCache>>) -> Self {
        Self {
            max_size,
            state: Mutex::new(StrongState {
                entries: LruCache::unbounded(),
                size: 0,
            }),
            weak,
        }
    }

    /// Returns the value for `key` and marks it most recently used.
    pub fn get(&self, key: &CacheKey) -> Option<CacheValue> {
        let mut state = self.state.lock();
        state.entries.get(key).map(|entry| entry.value.clone())
    }

    /// Returns the value for `key` without touching recency.
    #[must_use]
    pub fn peek(&self, key: &CacheKey) -> Option<CacheValue> {
        let state = self.state.lock();
        state.entries.peek(key).map(|entry| entry.value.clone())
    }

    /// Stores `value`, evicting least recently used entries to stay within
    /// budget. Returns `false` if the value alone exceeds the budget; it is
    /// then demoted straight to the weak tier and any entry under `key` is
    /// dropped.
    pub fn set(&self, key: CacheKey, value: CacheValue) -> bool {
        let size = value.size_bytes();
        let mut state = self.state.lock();

        if size > self.max_size {
            if let Some(old) = state.entries.pop(&key) {
                state.size -= old.size;
            }
            debug!(key = %key, size, max_size = self.max_size, "Image exceeds memory cache budget");
            if let Some(weak) = &self.weak {
                weak.set(key, &value, size);
            }
            return false;
        }

        if let Some(old) = state.entries.put(key.clone(), StrongEntry { value, size }) {
            state.size -= old.size;
        }
        state.size += size;
        trace!(key = %key, size, total = state.size, "Stored image in memory cache");

        self.trim_locked(&mut state, self.max_size);
        true
    }

    /// Removes `key` without demoting it; returns whether it was present.
    pub fn remove(&self, key: &CacheKey) -> bool {
        let mut state = self.state.lock();
        match state.entries.pop(key) {
            Some(entry) => {
                state.size -= entry.size;
                true
            }
            None => false,
        }
    }

    /// Evicts least recently used entries until at most `size` bytes remain.
    pub fn trim_to_size(&self, size: u64) {
        let mut state = self.state.lock();
        self.trim_locked(&mut state, size);
    }

    /// Drops every entry without demoting.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.entries.clear();
        state.size = 0;
    }

    /// Current total size in bytes.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.state.lock().size
    }

    /// Budget in bytes.
    #[must_use]
    pub const fn max_size(&self) -> u64 {
        self.max_size
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    /// Returns true if empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keys from most to least recently used.
    #[must_use]
    pub fn keys(&self) -> Vec<CacheKey> {
        let state = self.state.lock();
        state.entries.iter().map(|(key, _)| key.clone()).collect()
    }

    fn trim_locked(&self, state: &mut StrongState, target: u64) {
        while state.size > target {
            let Some((key, entry)) = state.entries.pop_lru() else {
                state.size = 0;
                break;
            };
            state.size -= entry.size;
            debug!(key = %key, size = entry.size, "Evicted image from memory cache");
            if let Some(weak) = &self.weak {
                weak.set(key, &entry.value, entry.size);
            }
        }
    }
}

impl std::fmt::Debug for StrongMemoryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StrongMemoryCache")
            .field("size", &self.size())
            .field("max_size", &self.max_size)
            .finish_non_exhaustive()
    }
}
