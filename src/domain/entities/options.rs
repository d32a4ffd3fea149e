//! Resolved per-attempt options handed to collaborators.

use super::{CachePolicy, Parameters, Scale, Size};

/// Settings a fetcher, decoder or mapper needs for one attempt.
///
/// Built by the engine after the request's defaults are merged and its size
/// is resolved.
#[derive(Debug, Clone)]
#[allow(clippy::struct_excessive_bools)]
pub struct Options {
    /// Resolved target size.
    pub size: Size,
    /// How the source is fit into `size`.
    pub scale: Scale,
    /// Whether the output may deviate from `size`.
    pub allow_inexact_size: bool,
    /// Whether hardware-backed images may be produced.
    pub allow_hardware: bool,
    /// Explicit disk cache key override.
    pub disk_cache_key: Option<String>,
    /// Memory cache policy.
    pub memory_cache_policy: CachePolicy,
    /// Disk cache policy, honoured by fetchers.
    pub disk_cache_policy: CachePolicy,
    /// Network cache policy, honoured by fetchers.
    pub network_cache_policy: CachePolicy,
    /// Include file modification times in file keys.
    pub add_file_last_modified_to_cache_key: bool,
    /// Let network fetchers honour HTTP cache headers.
    pub respect_network_cache_headers: bool,
    /// Custom request parameters.
    pub parameters: Parameters,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            size: Size::ORIGINAL,
            scale: Scale::Fit,
            allow_inexact_size: false,
            allow_hardware: true,
            disk_cache_key: None,
            memory_cache_policy: CachePolicy::Enabled,
            disk_cache_policy: CachePolicy::Enabled,
            network_cache_policy: CachePolicy::Enabled,
            add_file_last_modified_to_cache_key: true,
            respect_network_cache_headers: true,
            parameters: Parameters::default(),
        }
    }
}

impl Options {
    /// Returns a copy with a different size.
    #[must_use]
    pub fn with_size(mut self, size: Size) -> Self {
        self.size = size;
        self
    }
}
