//! Two-tier in-memory image cache.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::domain::entities::{CacheKey, CacheValue};

use super::{StrongMemoryCache, WeakMemoryCache};

/// Default strong tier budget (64 MiB).
pub const DEFAULT_MAX_SIZE_BYTES: u64 = 64 * 1024 * 1024;

/// Memory pressure reported by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TrimLevel {
    /// The app moved to the background; only dead weak entries are swept.
    Background,
    /// Memory is getting low; the strong tier is halved.
    Mild,
    /// Memory is critical; the strong tier is emptied.
    Severe,
}

/// Strong LRU tier backed by a weak demotion tier.
///
/// Lookups check the strong tier first. Weak hits are returned but never
/// promoted; values only enter the strong tier through [`MemoryCache::set`].
pub struct MemoryCache {
    strong: StrongMemoryCache,
    weak: Option<Arc<WeakMemoryCache>>,
    strong_hits: AtomicU64,
    weak_hits: AtomicU64,
    misses: AtomicU64,
}

impl MemoryCache {
    /// Creates a cache with a strong budget of `max_size` bytes and a weak
    /// tier.
    #[must_use]
    pub fn new(max_size: u64) -> Self {
        Self::with_weak_references(max_size, true)
    }

    /// Creates a cache, optionally without the weak tier.
    #[must_use]
    pub fn with_weak_references(max_size: u64, weak_references_enabled: bool) -> Self {
        let weak = weak_references_enabled.then(|| Arc::new(WeakMemoryCache::new()));
        Self {
            strong: StrongMemoryCache::new(max_size, weak.clone()),
            weak,
            strong_hits: AtomicU64::new(0),
            weak_hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Creates a cache with the default budget.
    #[must_use]
    pub fn with_default_capacity() -> Self {
        Self::new(DEFAULT_MAX_SIZE_BYTES)
    }

    /// Looks up `key` in the strong tier, then the weak tier.
    pub fn get(&self, key: &CacheKey) -> Option<CacheValue> {
        if let Some(value) = self.strong.get(key) {
            self.strong_hits.fetch_add(1, Ordering::Relaxed);
            trace!(key = %key, "Memory cache hit (strong)");
            return Some(value);
        }
        if let Some(value) = self.weak.as_ref().and_then(|weak| weak.get(key)) {
            self.weak_hits.fetch_add(1, Ordering::Relaxed);
            trace!(key = %key, "Memory cache hit (weak)");
            return Some(value);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        trace!(key = %key, "Memory cache miss");
        None
    }

    /// Stores `value` in the strong tier. Returns `false` if it was too
    /// large and went straight to the weak tier.
    pub fn set(&self, key: CacheKey, value: CacheValue) -> bool {
        self.strong.set(key, value)
    }

    /// Removes `key` from both tiers; returns whether either held it.
    pub fn remove(&self, key: &CacheKey) -> bool {
        let removed_strong = self.strong.remove(key);
        let removed_weak = self.weak.as_ref().is_some_and(|weak| weak.remove(key));
        removed_strong || removed_weak
    }

    /// Responds to memory pressure.
    pub fn trim(&self, level: TrimLevel) {
        match level {
            TrimLevel::Background => {}
            TrimLevel::Mild => self.strong.trim_to_size(self.strong.size() / 2),
            TrimLevel::Severe => self.strong.trim_to_size(0),
        }
        if let Some(weak) = &self.weak {
            weak.clean_up();
        }
        debug!(?level, size = self.strong.size(), "Trimmed memory cache");
    }

    /// Drops both tiers.
    pub fn clear(&self) {
        self.strong.clear();
        if let Some(weak) = &self.weak {
            weak.clear();
        }
        debug!("Cleared memory image cache");
    }

    /// Strong tier size in bytes.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.strong.size()
    }

    /// Strong tier budget in bytes.
    #[must_use]
    pub const fn max_size(&self) -> u64 {
        self.strong.max_size()
    }

    /// Keys present in either tier.
    #[must_use]
    pub fn keys(&self) -> Vec<CacheKey> {
        let mut keys = self.strong.keys();
        if let Some(weak) = &self.weak {
            for key in weak.keys() {
                if !keys.contains(&key) {
                    keys.push(key);
                }
            }
        }
        keys
    }

    /// The strong tier.
    #[must_use]
    pub const fn strong(&self) -> &StrongMemoryCache {
        &self.strong
    }

    /// The weak tier, if enabled.
    #[must_use]
    pub fn weak(&self) -> Option<&WeakMemoryCache> {
        self.weak.as_deref()
    }

    /// Returns cache statistics.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn stats(&self) -> CacheStats {
        let strong_hits = self.strong_hits.load(Ordering::Relaxed);
        let weak_hits = self.weak_hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = strong_hits + weak_hits + misses;
        let hit_rate = if total > 0 {
            ((strong_hits + weak_hits) as f64 / total as f64) * 100.0
        } else {
            0.0
        };
        CacheStats {
            strong_hits,
            weak_hits,
            misses,
            hit_rate,
            size_bytes: self.strong.size(),
            max_size_bytes: self.strong.max_size(),
            strong_entries: self.strong.len(),
            weak_entries: self.weak.as_ref().map_or(0, |weak| weak.len()),
        }
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

impl std::fmt::Debug for MemoryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryCache")
            .field("strong", &self.strong)
            .field("weak", &self.weak)
            .finish_non_exhaustive()
    }
}

/// Statistics about cache performance.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    /// Hits served by the strong tier.
    pub strong_hits: u64,
    /// Hits served by the weak tier.
    pub weak_hits: u64,
    /// Lookups that found nothing.
    pub misses: u64,
    /// Hit rate as a percentage.
    pub hit_rate: f64,
    /// Strong tier size in bytes.
    pub size_bytes: u64,
    /// Strong tier budget in bytes.
    pub max_size_bytes: u64,
    /// Entries in the strong tier.
    pub strong_entries: usize,
    /// Live images in the weak tier.
    pub weak_entries: usize,
}

impl std::fmt::Display for CacheStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Cache: {} strong / {} weak images, {}/{} bytes, {:.1}% hit rate ({} strong hits, {} weak hits, {} misses)",
            self.strong_entries,
            self.weak_entries,
            self.size_bytes,
            self.max_size_bytes,
            self.hit_rate,
            self.strong_hits,
            self.weak_hits,
            self.misses
        )
    }
}
