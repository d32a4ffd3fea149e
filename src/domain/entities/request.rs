//! Image request value and its builder.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::{CacheKey, CachePolicy, Data, DecodedImage, Extras, Lifecycle, Precision, Scale};
use crate::domain::ports::{
    FixedSizeResolver, RequestListener, SizeResolver, Target, Transformation,
};

/// A custom request parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    /// Value visible to collaborators.
    pub value: String,
    /// Value contributed to the memory cache key, if any.
    pub memory_cache_key: Option<String>,
}

/// Custom key/value parameters passed through to collaborators.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Parameters {
    entries: BTreeMap<String, Parameter>,
}

impl Parameters {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a parameter that also distinguishes memory cache entries.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let value = value.into();
        self.entries.insert(
            key.into(),
            Parameter {
                memory_cache_key: Some(value.clone()),
                value,
            },
        );
        self
    }

    /// Adds a parameter that does not affect memory cache keys.
    #[must_use]
    pub fn with_uncached(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.entries.insert(
            key.into(),
            Parameter {
                value: value.into(),
                memory_cache_key: None,
            },
        );
        self
    }

    /// Looks up a parameter value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(|p| p.value.as_str())
    }

    /// Entries that contribute to memory cache keys.
    #[must_use]
    pub fn memory_cache_keys(&self) -> Extras {
        self.entries
            .iter()
            .filter_map(|(k, p)| p.memory_cache_key.clone().map(|v| (k.clone(), v)))
            .collect()
    }

    /// Returns true if there are no parameters.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Loader-wide values applied to requests that leave them unset.
#[derive(Debug, Clone)]
pub struct RequestDefaults {
    /// Default precision.
    pub precision: Precision,
    /// Default memory cache policy.
    pub memory_cache_policy: CachePolicy,
    /// Default disk cache policy.
    pub disk_cache_policy: CachePolicy,
    /// Default network cache policy.
    pub network_cache_policy: CachePolicy,
    /// Whether hardware-backed images are allowed by default.
    pub allow_hardware: bool,
    /// Default placeholder.
    pub placeholder: Option<DecodedImage>,
    /// Default error image.
    pub error: Option<DecodedImage>,
    /// Default fallback image for null data.
    pub fallback: Option<DecodedImage>,
}

impl Default for RequestDefaults {
    fn default() -> Self {
        Self {
            precision: Precision::Automatic,
            memory_cache_policy: CachePolicy::Enabled,
            disk_cache_policy: CachePolicy::Enabled,
            network_cache_policy: CachePolicy::Enabled,
            allow_hardware: true,
            placeholder: None,
            error: None,
            fallback: None,
        }
    }
}

/// An immutable description of one image load.
///
/// Built with [`ImageRequest::builder`]. Changes produce a new request via
/// [`ImageRequest::new_builder`].
#[derive(Clone)]
pub struct ImageRequest {
    data: Option<Data>,
    target: Option<Arc<dyn Target>>,
    size_resolver: Arc<dyn SizeResolver>,
    scale: Scale,
    precision: Option<Precision>,
    memory_cache_policy: Option<CachePolicy>,
    disk_cache_policy: Option<CachePolicy>,
    network_cache_policy: Option<CachePolicy>,
    memory_cache_key: Option<CacheKey>,
    disk_cache_key: Option<String>,
    placeholder_memory_cache_key: Option<CacheKey>,
    placeholder: Option<DecodedImage>,
    error: Option<DecodedImage>,
    fallback: Option<DecodedImage>,
    transformations: Vec<Arc<dyn Transformation>>,
    parameters: Parameters,
    allow_hardware: Option<bool>,
    listener: Option<Arc<dyn RequestListener>>,
    lifecycle: Option<Lifecycle>,
    size_resolver_explicit: bool,
}

impl ImageRequest {
    /// Starts a builder for the given data.
    #[must_use]
    pub fn builder(data: impl Into<Data>) -> ImageRequestBuilder {
        ImageRequestBuilder::new().data(data)
    }

    /// Starts a builder pre-filled with this request's values.
    #[must_use]
    pub fn new_builder(&self) -> ImageRequestBuilder {
        ImageRequestBuilder {
            data: self.data.clone(),
            target: self.target.clone(),
            size_resolver: self
                .size_resolver_explicit
                .then(|| self.size_resolver.clone()),
            resolved_size_resolver: Some(self.size_resolver.clone()),
            scale: self.scale,
            precision: self.precision,
            memory_cache_policy: self.memory_cache_policy,
            disk_cache_policy: self.disk_cache_policy,
            network_cache_policy: self.network_cache_policy,
            memory_cache_key: self.memory_cache_key.clone(),
            disk_cache_key: self.disk_cache_key.clone(),
            placeholder_memory_cache_key: self.placeholder_memory_cache_key.clone(),
            placeholder: self.placeholder.clone(),
            error: self.error.clone(),
            fallback: self.fallback.clone(),
            transformations: self.transformations.clone(),
            parameters: self.parameters.clone(),
            allow_hardware: self.allow_hardware,
            listener: self.listener.clone(),
            lifecycle: self.lifecycle.clone(),
        }
    }

    /// Returns a request with every unset value taken from `defaults`.
    #[must_use]
    pub fn with_defaults(&self, defaults: &RequestDefaults) -> Self {
        let mut merged = self.clone();
        merged.precision.get_or_insert(defaults.precision);
        merged
            .memory_cache_policy
            .get_or_insert(defaults.memory_cache_policy);
        merged
            .disk_cache_policy
            .get_or_insert(defaults.disk_cache_policy);
        merged
            .network_cache_policy
            .get_or_insert(defaults.network_cache_policy);
        merged.allow_hardware.get_or_insert(defaults.allow_hardware);
        if merged.placeholder.is_none() {
            merged.placeholder.clone_from(&defaults.placeholder);
        }
        if merged.error.is_none() {
            merged.error.clone_from(&defaults.error);
        }
        if merged.fallback.is_none() {
            merged.fallback.clone_from(&defaults.fallback);
        }
        merged
    }

    /// Source descriptor, or `None` for a null request.
    #[must_use]
    pub const fn data(&self) -> Option<&Data> {
        self.data.as_ref()
    }

    /// Sink receiving callbacks.
    #[must_use]
    pub fn target(&self) -> Option<&Arc<dyn Target>> {
        self.target.as_ref()
    }

    /// Size resolver for this request.
    #[must_use]
    pub fn size_resolver(&self) -> &Arc<dyn SizeResolver> {
        &self.size_resolver
    }

    /// Scaling mode.
    #[must_use]
    pub const fn scale(&self) -> Scale {
        self.scale
    }

    /// Precision, defaulting to [`Precision::Automatic`].
    #[must_use]
    pub fn precision(&self) -> Precision {
        self.precision.unwrap_or_default()
    }

    /// Memory cache policy.
    #[must_use]
    pub fn memory_cache_policy(&self) -> CachePolicy {
        self.memory_cache_policy.unwrap_or_default()
    }

    /// Disk cache policy.
    #[must_use]
    pub fn disk_cache_policy(&self) -> CachePolicy {
        self.disk_cache_policy.unwrap_or_default()
    }

    /// Network cache policy.
    #[must_use]
    pub fn network_cache_policy(&self) -> CachePolicy {
        self.network_cache_policy.unwrap_or_default()
    }

    /// Explicit memory cache key.
    #[must_use]
    pub const fn memory_cache_key(&self) -> Option<&CacheKey> {
        self.memory_cache_key.as_ref()
    }

    /// Explicit disk cache key.
    #[must_use]
    pub fn disk_cache_key(&self) -> Option<&str> {
        self.disk_cache_key.as_deref()
    }

    /// Key of a memory cache entry to use as the placeholder.
    #[must_use]
    pub const fn placeholder_memory_cache_key(&self) -> Option<&CacheKey> {
        self.placeholder_memory_cache_key.as_ref()
    }

    /// Placeholder shown while loading.
    #[must_use]
    pub const fn placeholder(&self) -> Option<&DecodedImage> {
        self.placeholder.as_ref()
    }

    /// Image shown on failure.
    #[must_use]
    pub const fn error(&self) -> Option<&DecodedImage> {
        self.error.as_ref()
    }

    /// Image shown when the data is null.
    #[must_use]
    pub const fn fallback(&self) -> Option<&DecodedImage> {
        self.fallback.as_ref()
    }

    /// Transformations applied in order.
    #[must_use]
    pub fn transformations(&self) -> &[Arc<dyn Transformation>] {
        &self.transformations
    }

    /// Custom parameters.
    #[must_use]
    pub const fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    /// Whether hardware-backed images are allowed.
    #[must_use]
    pub fn allow_hardware(&self) -> bool {
        self.allow_hardware.unwrap_or(true)
    }

    /// Listener receiving callbacks.
    #[must_use]
    pub fn listener(&self) -> Option<&Arc<dyn RequestListener>> {
        self.listener.as_ref()
    }

    /// Lifecycle the request is bound to.
    #[must_use]
    pub const fn lifecycle(&self) -> Option<&Lifecycle> {
        self.lifecycle.as_ref()
    }
}

impl std::fmt::Debug for ImageRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageRequest")
            .field("data", &self.data)
            .field("target", &self.target.as_ref().and_then(|t| t.id()))
            .field("scale", &self.scale)
            .field("precision", &self.precision)
            .field("memory_cache_policy", &self.memory_cache_policy)
            .field("memory_cache_key", &self.memory_cache_key)
            .field("transformations", &self.transformations.len())
            .field("parameters", &self.parameters)
            .finish_non_exhaustive()
    }
}

/// Builder for [`ImageRequest`].
#[derive(Default)]
#[must_use]
pub struct ImageRequestBuilder {
    data: Option<Data>,
    target: Option<Arc<dyn Target>>,
    size_resolver: Option<Arc<dyn SizeResolver>>,
    resolved_size_resolver: Option<Arc<dyn SizeResolver>>,
    scale: Scale,
    precision: Option<Precision>,
    memory_cache_policy: Option<CachePolicy>,
    disk_cache_policy: Option<CachePolicy>,
    network_cache_policy: Option<CachePolicy>,
    memory_cache_key: Option<CacheKey>,
    disk_cache_key: Option<String>,
    placeholder_memory_cache_key: Option<CacheKey>,
    placeholder: Option<DecodedImage>,
    error: Option<DecodedImage>,
    fallback: Option<DecodedImage>,
    transformations: Vec<Arc<dyn Transformation>>,
    parameters: Parameters,
    allow_hardware: Option<bool>,
    listener: Option<Arc<dyn RequestListener>>,
    lifecycle: Option<Lifecycle>,
}

impl ImageRequestBuilder {
    /// Creates a builder with no data.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the data.
    pub fn data(mut self, data: impl Into<Data>) -> Self {
        self.data = Some(data.into());
        self
    }

    /// Clears the data, producing a null request.
    pub fn null_data(mut self) -> Self {
        self.data = None;
        self
    }

    /// Sets the target.
    pub fn target(mut self, target: Arc<dyn Target>) -> Self {
        self.target = Some(target);
        self.resolved_size_resolver = None;
        self
    }

    /// Sets an explicit size resolver.
    pub fn size_resolver(mut self, resolver: Arc<dyn SizeResolver>) -> Self {
        self.size_resolver = Some(resolver);
        self
    }

    /// Requests a fixed size.
    pub fn size(self, size: super::Size) -> Self {
        self.size_resolver(Arc::new(FixedSizeResolver::new(size)))
    }

    /// Sets the scale.
    pub fn scale(mut self, scale: Scale) -> Self {
        self.scale = scale;
        self
    }

    /// Sets the precision.
    pub fn precision(mut self, precision: Precision) -> Self {
        self.precision = Some(precision);
        self
    }

    /// Sets the memory cache policy.
    pub fn memory_cache_policy(mut self, policy: CachePolicy) -> Self {
        self.memory_cache_policy = Some(policy);
        self
    }

    /// Sets the disk cache policy.
    pub fn disk_cache_policy(mut self, policy: CachePolicy) -> Self {
        self.disk_cache_policy = Some(policy);
        self
    }

    /// Sets the network cache policy.
    pub fn network_cache_policy(mut self, policy: CachePolicy) -> Self {
        self.network_cache_policy = Some(policy);
        self
    }

    /// Overrides the memory cache key.
    pub fn memory_cache_key(mut self, key: CacheKey) -> Self {
        self.memory_cache_key = Some(key);
        self
    }

    /// Overrides the disk cache key.
    pub fn disk_cache_key(mut self, key: impl Into<String>) -> Self {
        self.disk_cache_key = Some(key.into());
        self
    }

    /// Uses a memory cache entry as the placeholder.
    pub fn placeholder_memory_cache_key(mut self, key: CacheKey) -> Self {
        self.placeholder_memory_cache_key = Some(key);
        self
    }

    /// Sets the placeholder.
    pub fn placeholder(mut self, image: DecodedImage) -> Self {
        self.placeholder = Some(image);
        self
    }

    /// Sets the error image.
    pub fn error(mut self, image: DecodedImage) -> Self {
        self.error = Some(image);
        self
    }

    /// Sets the fallback image.
    pub fn fallback(mut self, image: DecodedImage) -> Self {
        self.fallback = Some(image);
        self
    }

    /// Appends a transformation.
    pub fn transformation(mut self, transformation: Arc<dyn Transformation>) -> Self {
        self.transformations.push(transformation);
        self
    }

    /// Replaces all transformations.
    pub fn transformations(mut self, transformations: Vec<Arc<dyn Transformation>>) -> Self {
        self.transformations = transformations;
        self
    }

    /// Sets the parameters.
    pub fn parameters(mut self, parameters: Parameters) -> Self {
        self.parameters = parameters;
        self
    }

    /// Allows or forbids hardware-backed images.
    pub fn allow_hardware(mut self, allow: bool) -> Self {
        self.allow_hardware = Some(allow);
        self
    }

    /// Sets the listener.
    pub fn listener(mut self, listener: Arc<dyn RequestListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Binds the request to a lifecycle.
    pub fn lifecycle(mut self, lifecycle: Lifecycle) -> Self {
        self.lifecycle = Some(lifecycle);
        self
    }

    /// Builds the request.
    ///
    /// Without an explicit size resolver the target's resolver is used, then
    /// the original size.
    #[must_use]
    pub fn build(self) -> ImageRequest {
        let size_resolver_explicit = self.size_resolver.is_some();
        let size_resolver = self
            .size_resolver
            .or(self.resolved_size_resolver)
            .or_else(|| self.target.as_ref().and_then(|t| t.size_resolver()))
            .unwrap_or_else(|| Arc::new(FixedSizeResolver::original()));

        ImageRequest {
            data: self.data,
            target: self.target,
            size_resolver,
            scale: self.scale,
            precision: self.precision,
            memory_cache_policy: self.memory_cache_policy,
            disk_cache_policy: self.disk_cache_policy,
            network_cache_policy: self.network_cache_policy,
            memory_cache_key: self.memory_cache_key,
            disk_cache_key: self.disk_cache_key,
            placeholder_memory_cache_key: self.placeholder_memory_cache_key,
            placeholder: self.placeholder,
            error: self.error,
            fallback: self.fallback,
            transformations: self.transformations,
            parameters: self.parameters,
            allow_hardware: self.allow_hardware,
            listener: self.listener,
            lifecycle: self.lifecycle,
            size_resolver_explicit,
        }
    }
}
