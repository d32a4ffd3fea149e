//! Tiered in-memory image cache.
//!
//! This module provides:
//! - A byte-bounded strong LRU tier
//! - A weak tier receiving every evicted image
//! - The combined cache with memory pressure handling

pub mod memory_cache;
pub mod strong_cache;
pub mod weak_cache;

pub use memory_cache::{CacheStats, DEFAULT_MAX_SIZE_BYTES, MemoryCache, TrimLevel};
pub use strong_cache::StrongMemoryCache;
pub use weak_cache::WeakMemoryCache;
