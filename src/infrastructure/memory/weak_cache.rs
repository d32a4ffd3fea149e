//! Weak tier of the memory cache.

use std::collections::HashMap;

use parking_lot::Mutex;
use tracing::trace;

use crate::domain::entities::{CacheKey, CacheValue, Extras, WeakImage};

/// Number of operations between automatic sweeps of dead entries.
pub const CLEAN_UP_INTERVAL: usize = 10;

/// Unbounded cache holding weak references to demoted images.
///
/// An entry stays retrievable only while something outside this cache still
/// holds the image. Several images may share a key; lookups return the
/// largest live one.
#[derive(Default)]
pub struct WeakMemoryCache {
    state: Mutex<WeakState>,
}

#[derive(Default)]
struct WeakState {
    entries: HashMap<CacheKey, Vec<WeakEntry>>,
    operations_since_clean_up: usize,
}

struct WeakEntry {
    image: WeakImage,
    extras: Extras,
    is_sampled: bool,
    size: u64,
}

impl WeakMemoryCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the largest live image stored under `key`.
    pub fn get(&self, key: &CacheKey) -> Option<CacheValue> {
        let mut state = self.state.lock();
        let value = state.entries.get(key).and_then(|entries| {
            entries.iter().find_map(|entry| {
                entry.image.upgrade().map(|image| CacheValue {
                    image,
                    extras: entry.extras.clone(),
                    is_sampled: entry.is_sampled,
                })
            })
        });
        state.clean_up_if_necessary();
        value
    }

    /// Tracks `value` under `key` without keeping it alive.
    ///
    /// `size` is the footprint computed when the value entered the cache.
    pub fn set(&self, key: CacheKey, value: &CacheValue, size: u64) {
        let mut state = self.state.lock();
        let entries = state.entries.entry(key).or_default();
        entries.retain(|entry| !entry.image.points_to(&value.image));

        let entry = WeakEntry {
            image: value.image.downgrade(),
            extras: value.extras.clone(),
            is_sampled: value.is_sampled,
            size,
        };
        let index = entries
            .iter()
            .position(|existing| size >= existing.size)
            .unwrap_or(entries.len());
        entries.insert(index, entry);

        state.clean_up_if_necessary();
    }

    /// Removes every image under `key`; returns whether the key was present.
    pub fn remove(&self, key: &CacheKey) -> bool {
        let mut state = self.state.lock();
        let removed = state.entries.remove(key).is_some();
        state.clean_up_if_necessary();
        removed
    }

    /// Drops dead entries and empty keys.
    pub fn clean_up(&self) {
        self.state.lock().clean_up();
    }

    /// Removes everything.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.entries.clear();
        state.operations_since_clean_up = 0;
    }

    /// Keys with at least one live image.
    #[must_use]
    pub fn keys(&self) -> Vec<CacheKey> {
        let state = self.state.lock();
        state
            .entries
            .iter()
            .filter(|(_, entries)| entries.iter().any(|e| e.image.is_alive()))
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Number of live images across all keys.
    #[must_use]
    pub fn len(&self) -> usize {
        let state = self.state.lock();
        state
            .entries
            .values()
            .map(|entries| entries.iter().filter(|e| e.image.is_alive()).count())
            .sum()
    }

    /// Returns true if no live image is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl WeakState {
    fn clean_up_if_necessary(&mut self) {
        self.operations_since_clean_up += 1;
        if self.operations_since_clean_up >= CLEAN_UP_INTERVAL {
            self.clean_up();
        }
    }

    fn clean_up(&mut self) {
        self.operations_since_clean_up = 0;
        let before = self.entries.len();
        self.entries.retain(|_, entries| {
            entries.retain(|entry| entry.image.is_alive());
            !entries.is_empty()
        });
        trace!(
            removed_keys = before - self.entries.len(),
            "Weak memory cache swept"
        );
    }
}

impl std::fmt::Debug for WeakMemoryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeakMemoryCache")
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}
