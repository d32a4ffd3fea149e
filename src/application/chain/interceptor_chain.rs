//! Interceptor chain driving a request through the pipeline.

use std::sync::Arc;

use async_trait::async_trait;

use crate::application::cancellation::CancellationToken;
use crate::domain::entities::{ImageRequest, ImageResult, Lifecycle, Size};
use crate::domain::errors::ImageError;
use crate::domain::ports::{EventListener, Target};

/// Observes and optionally short-circuits requests on their way to the
/// engine.
///
/// An interceptor either returns a result itself or hands the (possibly
/// substituted) request to [`Chain::proceed`]. Substituted requests must
/// keep the original target, size resolver and lifecycle.
#[async_trait]
pub trait Interceptor: Send + Sync {
    /// Handles one step of the chain.
    async fn intercept(&self, chain: Chain) -> Result<ImageResult, ImageError>;
}

/// Position in the interceptor list for one attempt.
///
/// [`Chain::proceed`] consumes the chain, so each interceptor can move on
/// at most once.
pub struct Chain {
    initial_request: ImageRequest,
    interceptors: Arc<[Arc<dyn Interceptor>]>,
    index: usize,
    request: ImageRequest,
    size: Size,
    token: CancellationToken,
    event_listener: Arc<dyn EventListener>,
    is_placeholder_cached: bool,
}

impl Chain {
    /// Creates the head of a chain.
    #[must_use]
    pub fn new(
        request: ImageRequest,
        size: Size,
        interceptors: Arc<[Arc<dyn Interceptor>]>,
        token: CancellationToken,
        event_listener: Arc<dyn EventListener>,
        is_placeholder_cached: bool,
    ) -> Self {
        Self {
            initial_request: request.clone(),
            interceptors,
            index: 0,
            request,
            size,
            token,
            event_listener,
            is_placeholder_cached,
        }
    }

    /// The current request.
    #[must_use]
    pub const fn request(&self) -> &ImageRequest {
        &self.request
    }

    /// The resolved size.
    #[must_use]
    pub const fn size(&self) -> Size {
        self.size
    }

    /// Replaces the size seen by later interceptors.
    #[must_use]
    pub fn with_size(mut self, size: Size) -> Self {
        self.size = size;
        self
    }

    /// Token that is cancelled when the attempt is disposed.
    #[must_use]
    pub const fn cancellation(&self) -> &CancellationToken {
        &self.token
    }

    /// Loader-wide event listener.
    #[must_use]
    pub fn event_listener(&self) -> &Arc<dyn EventListener> {
        &self.event_listener
    }

    /// Whether the placeholder was served from the memory cache.
    #[must_use]
    pub const fn is_placeholder_cached(&self) -> bool {
        self.is_placeholder_cached
    }

    /// Passes `request` to the next interceptor.
    ///
    /// # Errors
    /// Returns [`ImageError::InterceptorContract`] if the calling interceptor
    /// swapped the target, size resolver or lifecycle, or nulled the data.
    /// Otherwise returns whatever the rest of the chain returns.
    pub async fn proceed(self, request: ImageRequest) -> Result<ImageResult, ImageError> {
        if self.index > 0 {
            self.check_request(&request, self.index - 1)?;
        }
        let Some(interceptor) = self.interceptors.get(self.index).cloned() else {
            return Err(ImageError::contract(
                self.index.saturating_sub(1),
                "proceeded past the end of the chain",
            ));
        };
        let next = Self {
            index: self.index + 1,
            request,
            ..self
        };
        interceptor.intercept(next).await
    }

    fn check_request(&self, request: &ImageRequest, index: usize) -> Result<(), ImageError> {
        let initial = &self.initial_request;
        if request.data().is_none() {
            return Err(ImageError::contract(index, "cannot set the request's data to null"));
        }
        if !same_target(initial.target(), request.target()) {
            return Err(ImageError::contract(index, "cannot modify the request's target"));
        }
        if !Arc::ptr_eq(initial.size_resolver(), request.size_resolver()) {
            return Err(ImageError::contract(index, "cannot modify the request's size resolver"));
        }
        if !same_lifecycle(initial.lifecycle(), request.lifecycle()) {
            return Err(ImageError::contract(index, "cannot modify the request's lifecycle"));
        }
        Ok(())
    }
}

fn same_target(a: Option<&Arc<dyn Target>>, b: Option<&Arc<dyn Target>>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => Arc::ptr_eq(a, b),
        _ => false,
    }
}

fn same_lifecycle(a: Option<&Lifecycle>, b: Option<&Lifecycle>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => a.ptr_eq(b),
        _ => false,
    }
}

impl std::fmt::Debug for Chain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chain")
            .field("index", &self.index)
            .field("request", &self.request)
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}
