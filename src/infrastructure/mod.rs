//! Infrastructure layer: configuration, cache storage and built-in components.

/// Built-in mappers, fetchers and decoders.
pub mod components;
/// Loader configuration.
pub mod config;
/// Tiered memory cache.
pub mod memory;

pub use components::{builtin_builder, builtin_components};
pub use config::{CliArgs, ExecutionContext, LoaderConfig, LogLevel};
pub use memory::{CacheStats, MemoryCache, TrimLevel};
