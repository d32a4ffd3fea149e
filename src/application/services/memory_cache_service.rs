//! Memory cache reads and writes on behalf of the pipeline.

use std::sync::Arc;

use tracing::{debug, trace};

use crate::application::chain::ExecuteResult;
use crate::application::registry::ComponentRegistry;
use crate::domain::entities::{
    CacheKey, CacheValue, Data, DataSource, EXTRA_DISK_CACHE_KEY, Extras, ImageRequest, Options,
    Size, SuccessResult, size_multiplier,
};
use crate::infrastructure::memory::MemoryCache;

use super::RequestService;

/// Derives cache keys and decides whether cached values may serve a request.
#[derive(Debug, Clone)]
pub struct MemoryCacheService {
    memory_cache: Arc<MemoryCache>,
    registry: Arc<ComponentRegistry>,
}

impl MemoryCacheService {
    /// Creates a service over the loader's cache and components.
    #[must_use]
    pub const fn new(memory_cache: Arc<MemoryCache>, registry: Arc<ComponentRegistry>) -> Self {
        Self {
            memory_cache,
            registry,
        }
    }

    /// Derives the memory cache key for `request`.
    ///
    /// An explicit key on the request wins. Otherwise the first capable
    /// fetcher supplies the base key; without one the request is not
    /// cacheable. The size only takes part when transformations are present.
    #[must_use]
    pub fn new_cache_key(
        &self,
        request: &ImageRequest,
        mapped: &Data,
        options: &Options,
        size: Size,
    ) -> Option<CacheKey> {
        if let Some(key) = request.memory_cache_key() {
            return Some(key.clone());
        }

        let base_key = self.registry.key(mapped, options)?;
        let extras: Extras = request.parameters().memory_cache_keys();
        let transformation_keys = request
            .transformations()
            .iter()
            .map(|t| t.cache_key())
            .collect();
        Some(CacheKey::with_components(
            base_key,
            transformation_keys,
            size,
            extras,
        ))
    }

    /// Returns a cached value usable for `request`, honouring its read policy.
    #[must_use]
    pub fn get_cache_value(
        &self,
        request: &ImageRequest,
        key: &CacheKey,
        size: Size,
    ) -> Option<CacheValue> {
        if !request.memory_cache_policy().read_enabled() {
            return None;
        }
        let value = self.memory_cache.get(key)?;
        if Self::is_cache_value_valid(request, key, &value, size) {
            Some(value)
        } else {
            trace!(key = %key, "Cached image does not satisfy request");
            None
        }
    }

    /// Returns true if `value` may be returned for `request` at `size`.
    #[must_use]
    pub fn is_cache_value_valid(
        request: &ImageRequest,
        key: &CacheKey,
        value: &CacheValue,
        size: Size,
    ) -> bool {
        Self::is_size_valid(request, key, value, size)
            && RequestService::is_config_valid_for_hardware(request, &value.image)
    }

    /// Size check with a one-pixel tolerance per dimension.
    ///
    /// With inexact sizing allowed, an unsampled image smaller than the
    /// requested size is accepted.
    fn is_size_valid(request: &ImageRequest, key: &CacheKey, value: &CacheValue, size: Size) -> bool {
        if size.is_original() && value.is_sampled {
            return false;
        }

        // Transformed images were produced at exactly this size.
        if let Some(key_size) = key.size() {
            return key_size == size;
        }

        let src_width = value.image.width();
        let src_height = value.image.height();
        let dst_width = size.width.px_or(u32::MAX);
        let dst_height = size.height.px_or(u32::MAX);
        let multiplier = size_multiplier(src_width, src_height, dst_width, dst_height, request.scale());

        let allow_inexact_size = RequestService::allow_inexact_size(request);
        if allow_inexact_size {
            let downsample = multiplier.min(1.0);
            if (f64::from(dst_width) - downsample * f64::from(src_width)).abs() <= 1.0
                || (f64::from(dst_height) - downsample * f64::from(src_height)).abs() <= 1.0
            {
                return true;
            }
        } else if (size.width.is_undefined() || dst_width.abs_diff(src_width) <= 1)
            && (size.height.is_undefined() || dst_height.abs_diff(src_height) <= 1)
        {
            return true;
        }

        if (multiplier - 1.0).abs() > f64::EPSILON && !allow_inexact_size {
            return false;
        }
        if multiplier > 1.0 && value.is_sampled {
            return false;
        }
        true
    }

    /// Writes a pipeline result to the strong tier.
    ///
    /// Returns true only if the value is now held by the strong tier.
    pub fn set_cache_value(
        &self,
        key: Option<&CacheKey>,
        request: &ImageRequest,
        result: &ExecuteResult,
    ) -> bool {
        if !request.memory_cache_policy().write_enabled() {
            return false;
        }
        let Some(key) = key else {
            return false;
        };
        if !result.image.is_shareable() {
            debug!(key = %key, "Skipping memory cache write for exclusive image");
            return false;
        }

        let mut extras = Extras::new();
        if let Some(disk_cache_key) = &result.disk_cache_key {
            extras.insert(EXTRA_DISK_CACHE_KEY.to_string(), disk_cache_key.clone());
        }
        let value = CacheValue::new(result.image.clone(), result.is_sampled).with_extras(extras);
        self.memory_cache.set(key.clone(), value)
    }

    /// Builds the success result for a memory cache hit.
    #[must_use]
    pub fn new_result(
        request: &ImageRequest,
        key: CacheKey,
        value: CacheValue,
        is_placeholder_cached: bool,
    ) -> SuccessResult {
        SuccessResult {
            disk_cache_key: value.extras.get(EXTRA_DISK_CACHE_KEY).cloned(),
            image: value.image,
            request: request.clone(),
            data_source: DataSource::MemoryCache,
            memory_cache_key: Some(key),
            is_sampled: value.is_sampled,
            is_placeholder_cached,
        }
    }

    /// The underlying cache.
    #[must_use]
    pub fn memory_cache(&self) -> &Arc<MemoryCache> {
        &self.memory_cache
    }
}
