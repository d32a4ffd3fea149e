//! Port definition for pipeline instrumentation.

use crate::domain::entities::{
    CacheKey, Data, DataSource, ErrorResult, ImageRequest, Size, SuccessResult,
};

/// Loader-wide observer of every pipeline step.
///
/// All methods default to doing nothing.
#[allow(unused_variables)]
pub trait EventListener: Send + Sync {
    /// An attempt started.
    fn on_start(&self, request: &ImageRequest) {}

    /// Size resolution started.
    fn resolve_size_start(&self, request: &ImageRequest) {}

    /// Size resolution finished.
    fn resolve_size_end(&self, request: &ImageRequest, size: Size) {}

    /// Data mapping started.
    fn map_start(&self, request: &ImageRequest, input: &Data) {}

    /// Data mapping finished.
    fn map_end(&self, request: &ImageRequest, output: &Data) {}

    /// A memory cache key was derived, or the request is not cacheable.
    fn key_end(&self, request: &ImageRequest, key: Option<&CacheKey>) {}

    /// A fetcher was selected and started.
    fn fetch_start(&self, request: &ImageRequest, fetcher_index: usize) {}

    /// A fetch finished.
    fn fetch_end(&self, request: &ImageRequest, data_source: DataSource) {}

    /// A decoder was selected and started.
    fn decode_start(&self, request: &ImageRequest, decoder_index: usize) {}

    /// A decode finished.
    fn decode_end(&self, request: &ImageRequest, is_sampled: bool) {}

    /// Transformations started.
    fn transform_start(&self, request: &ImageRequest) {}

    /// Transformations finished.
    fn transform_end(&self, request: &ImageRequest) {}

    /// The attempt was cancelled.
    fn on_cancel(&self, request: &ImageRequest) {}

    /// The attempt succeeded.
    fn on_success(&self, request: &ImageRequest, result: &SuccessResult) {}

    /// The attempt failed.
    fn on_error(&self, request: &ImageRequest, result: &ErrorResult) {}
}

/// Listener that ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopEventListener;

impl EventListener for NoopEventListener {}
