//! The image loader: request entry points, target slots and shutdown.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::application::cancellation::CancellationToken;
use crate::application::chain::{Chain, EngineInterceptor, Interceptor};
use crate::application::disposable::{AttemptOutcome, Disposable};
use crate::application::registry::ComponentRegistry;
use crate::application::request_delegate::RequestDelegate;
use crate::application::services::{MemoryCacheService, RequestService};
use crate::application::target_slots::TargetSlots;
use crate::domain::entities::{
    DecodedImage, ErrorResult, ImageRequest, ImageResult, RequestDefaults, SuccessResult,
};
use crate::domain::errors::{Cancelled, ImageError};
use crate::domain::ports::{EventListener, NoopEventListener, TargetId};
use crate::infrastructure::components::builtin_components;
use crate::infrastructure::config::LoaderConfig;
use crate::infrastructure::memory::{MemoryCache, TrimLevel};

/// Loads images through the interceptor chain into targets.
///
/// Cheap to clone; clones share caches, slots and shutdown state.
#[derive(Clone)]
pub struct ImageLoader {
    inner: Arc<LoaderInner>,
}

struct LoaderInner {
    config: LoaderConfig,
    defaults: RequestDefaults,
    memory_cache: Arc<MemoryCache>,
    interceptors: Arc<[Arc<dyn Interceptor>]>,
    event_listener: Arc<dyn EventListener>,
    targets: Arc<TargetSlots>,
    shutdown_token: CancellationToken,
    is_shutdown: AtomicBool,
    pressure_task: Mutex<Option<JoinHandle<()>>>,
}

impl ImageLoader {
    /// Starts a builder with default configuration.
    #[must_use]
    pub fn builder() -> ImageLoaderBuilder {
        ImageLoaderBuilder::default()
    }

    /// Creates a loader with the built-in components.
    #[must_use]
    pub fn new(config: LoaderConfig) -> Self {
        Self::builder().config(config).build()
    }

    /// Schedules `request` and returns immediately.
    ///
    /// Results reach the request's target and listeners. A target-bound
    /// request disposes the target's previous request before this returns.
    /// After shutdown, or outside a tokio runtime, the returned handle is
    /// already disposed.
    pub fn enqueue(&self, request: ImageRequest) -> Disposable {
        if self.is_shutdown() {
            debug!("Loader is shut down, dropping request");
            return Disposable::disposed();
        }
        let Ok(runtime) = Handle::try_current() else {
            warn!("No tokio runtime available, dropping request");
            return Disposable::disposed();
        };

        let delegate = self.inner.new_delegate(request);
        let (sender, outcome) = watch::channel(None);
        let (handle, lease) = match delegate.target() {
            Some(id) => {
                if self.inner.targets.occupy(id, &delegate).is_err() {
                    delegate.dispose();
                    debug!(target_id = %id, "Target detached, parking request");
                    return Disposable::disposed();
                }
                (
                    Disposable::target(self.inner.targets.clone(), id, delegate.clone(), outcome),
                    Some(self.inner.targets.lease(id, &delegate)),
                )
            }
            None => (Disposable::attempt(delegate.clone(), outcome), None),
        };

        let inner = self.inner.clone();
        runtime.spawn(async move {
            let result = inner.run_attempt(delegate, true).await;
            drop(lease);
            sender.send_replace(Some(result));
        });
        handle
    }

    /// Runs `request` and waits for its result.
    ///
    /// Failures come back as [`ImageResult::Error`]. Does not wait for the
    /// request's lifecycle to start.
    ///
    /// # Errors
    /// Returns [`Cancelled`] if the attempt was disposed, superseded or the
    /// loader was shut down.
    pub async fn execute(&self, request: ImageRequest) -> AttemptOutcome {
        if self.is_shutdown() {
            return Err(Cancelled);
        }
        let delegate = self.inner.new_delegate(request);
        let _lease = match delegate.target() {
            Some(id) => {
                if self.inner.targets.occupy(id, &delegate).is_err() {
                    delegate.dispose();
                    return Err(Cancelled);
                }
                Some(self.inner.targets.lease(id, &delegate))
            }
            None => None,
        };
        self.inner.run_attempt(delegate, false).await
    }

    /// Cancels all work and releases the loader's resources. Idempotent.
    ///
    /// Clears the strong cache tier.
    pub fn shutdown(&self) {
        if self.inner.is_shutdown.swap(true, Ordering::SeqCst) {
            return;
        }
        self.inner.shutdown_token.cancel();
        self.inner.targets.dispose_all();
        self.inner.memory_cache.strong().clear();
        if let Some(task) = self.inner.pressure_task.lock().take() {
            task.abort();
        }
        info!("Image loader shut down");
    }

    /// Returns true once [`ImageLoader::shutdown`] has run.
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.inner.is_shutdown.load(Ordering::SeqCst)
    }

    /// Trims the memory cache in response to memory pressure.
    pub fn trim_memory(&self, level: TrimLevel) {
        self.inner.memory_cache.trim(level);
    }

    /// Disposes the target's running request and parks it for restart.
    ///
    /// Returns true if a request was running on the target. Requests that
    /// already finished have released the target and are not parked.
    pub fn detach_target(&self, id: TargetId) -> bool {
        self.inner.targets.detach(id)
    }

    /// Disposes the target's request and drops everything kept for it,
    /// including a parked request.
    ///
    /// Returns true if the loader knew the target.
    pub fn forget_target(&self, id: TargetId) -> bool {
        self.inner.targets.forget(id)
    }

    /// Re-attaches a detached target, restarting its parked request.
    pub fn attach_target(&self, id: TargetId) -> Option<Disposable> {
        let request = self.inner.targets.attach(id)?;
        debug!(target_id = %id, "Restarting parked request");
        Some(self.enqueue(request))
    }

    /// The loader's memory cache.
    #[must_use]
    pub fn memory_cache(&self) -> &Arc<MemoryCache> {
        &self.inner.memory_cache
    }

    /// The configuration the loader was built with.
    #[must_use]
    pub fn config(&self) -> &LoaderConfig {
        &self.inner.config
    }

    /// Defaults applied to every request.
    #[must_use]
    pub fn defaults(&self) -> &RequestDefaults {
        &self.inner.defaults
    }
}

impl std::fmt::Debug for ImageLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageLoader")
            .field("memory_cache", &self.inner.memory_cache)
            .field("targets", &self.inner.targets)
            .field("interceptors", &self.inner.interceptors.len())
            .field("is_shutdown", &self.is_shutdown())
            .finish_non_exhaustive()
    }
}

impl LoaderInner {
    fn new_delegate(&self, request: ImageRequest) -> Arc<RequestDelegate> {
        Arc::new(RequestDelegate::new(
            request,
            self.shutdown_token.child_token(),
        ))
    }

    async fn run_attempt(&self, delegate: Arc<RequestDelegate>, enqueued: bool) -> AttemptOutcome {
        let request = delegate.request().with_defaults(&self.defaults);
        let mut attempt = delegate.start();

        let outcome = if request.data().is_none() {
            Err(ImageError::NullData)
        } else {
            tokio::select! {
                biased;
                () = delegate.cancellation().cancelled() => Err(ImageError::Cancelled),
                () = attempt.destroyed() => {
                    debug!(attempt = %delegate.attempt(), "Lifecycle destroyed, disposing request");
                    if let Some(id) = delegate.target() {
                        self.targets.dispose_if_current(id, &delegate);
                    }
                    delegate.dispose();
                    Err(ImageError::Cancelled)
                }
                result = self.proceed(&delegate, &request, enqueued) => result,
            }
        };

        let result = match outcome {
            Ok(result) => result,
            Err(error) if error.is_cancelled() => {
                self.notify_cancel(&request);
                return Err(Cancelled);
            }
            Err(error) => ImageResult::Error(RequestService::error_result(&request, error)),
        };

        let delivered = delegate.deliver(|| match &result {
            ImageResult::Success(success) => self.notify_success(&request, success),
            ImageResult::Error(error) => self.notify_error(&request, error),
        });
        drop(attempt);
        if delivered {
            Ok(result)
        } else {
            self.notify_cancel(&request);
            Err(Cancelled)
        }
    }

    async fn proceed(
        &self,
        delegate: &RequestDelegate,
        request: &ImageRequest,
        enqueued: bool,
    ) -> Result<ImageResult, ImageError> {
        if enqueued && let Some(lifecycle) = request.lifecycle() {
            trace!(attempt = %delegate.attempt(), "Waiting for lifecycle to start");
            if !lifecycle.await_started().await {
                return Err(ImageError::Cancelled);
            }
        }

        let cached_placeholder = request
            .placeholder_memory_cache_key()
            .and_then(|key| self.memory_cache.get(key))
            .map(|value| value.image);
        let is_placeholder_cached = cached_placeholder.is_some();
        let placeholder: Option<DecodedImage> =
            cached_placeholder.or_else(|| request.placeholder().cloned());

        let started = delegate.deliver(|| {
            if let Some(target) = request.target() {
                target.on_start(placeholder.as_ref());
            }
            self.event_listener.on_start(request);
            if let Some(listener) = request.listener() {
                listener.on_start(request);
            }
        });
        if !started {
            return Err(ImageError::Cancelled);
        }

        self.event_listener.resolve_size_start(request);
        let size = request.size_resolver().size().await;
        self.event_listener.resolve_size_end(request, size);
        trace!(attempt = %delegate.attempt(), %size, "Resolved size");

        Chain::new(
            request.clone(),
            size,
            self.interceptors.clone(),
            delegate.cancellation().clone(),
            self.event_listener.clone(),
            is_placeholder_cached,
        )
        .proceed(request.clone())
        .await
    }

    fn notify_success(&self, request: &ImageRequest, result: &SuccessResult) {
        if let Some(target) = request.target() {
            target.on_success(&result.image);
        }
        self.event_listener.on_success(request, result);
        if let Some(listener) = request.listener() {
            listener.on_success(request, result);
        }
    }

    fn notify_error(&self, request: &ImageRequest, result: &ErrorResult) {
        if result.error.is_configuration_fault() {
            warn!(data = ?request.data(), error = %result.error, "Request failed");
        } else {
            debug!(data = ?request.data(), error = %result.error, "Request failed");
        }
        if let Some(target) = request.target() {
            target.on_error(result.image.as_ref());
        }
        self.event_listener.on_error(request, result);
        if let Some(listener) = request.listener() {
            listener.on_error(request, result);
        }
    }

    fn notify_cancel(&self, request: &ImageRequest) {
        trace!(data = ?request.data(), "Request cancelled");
        if let Some(listener) = request.listener() {
            listener.on_cancel(request);
        }
        self.event_listener.on_cancel(request);
    }
}

impl Drop for LoaderInner {
    fn drop(&mut self) {
        self.shutdown_token.cancel();
        if let Some(task) = self.pressure_task.get_mut().take() {
            task.abort();
        }
    }
}

/// Builder for [`ImageLoader`].
pub struct ImageLoaderBuilder {
    config: LoaderConfig,
    components: Option<ComponentRegistry>,
    memory_cache: Option<Arc<MemoryCache>>,
    event_listener: Arc<dyn EventListener>,
    placeholder: Option<DecodedImage>,
    error: Option<DecodedImage>,
    fallback: Option<DecodedImage>,
    trim_signals: Option<broadcast::Receiver<TrimLevel>>,
}

impl Default for ImageLoaderBuilder {
    fn default() -> Self {
        Self {
            config: LoaderConfig::default(),
            components: None,
            memory_cache: None,
            event_listener: Arc::new(NoopEventListener),
            placeholder: None,
            error: None,
            fallback: None,
            trim_signals: None,
        }
    }
}

impl ImageLoaderBuilder {
    /// Sets the configuration.
    #[must_use]
    pub fn config(mut self, config: LoaderConfig) -> Self {
        self.config = config;
        self
    }

    /// Replaces the built-in mappers, fetchers, decoders and interceptors.
    #[must_use]
    pub fn components(mut self, components: ComponentRegistry) -> Self {
        self.components = Some(components);
        self
    }

    /// Shares an existing memory cache instead of creating one from the
    /// configured budget.
    #[must_use]
    pub fn memory_cache(mut self, memory_cache: Arc<MemoryCache>) -> Self {
        self.memory_cache = Some(memory_cache);
        self
    }

    /// Sets the loader-wide event listener.
    #[must_use]
    pub fn event_listener(mut self, listener: Arc<dyn EventListener>) -> Self {
        self.event_listener = listener;
        self
    }

    /// Default placeholder for requests that set none.
    #[must_use]
    pub fn placeholder(mut self, image: DecodedImage) -> Self {
        self.placeholder = Some(image);
        self
    }

    /// Default error image for requests that set none.
    #[must_use]
    pub fn error(mut self, image: DecodedImage) -> Self {
        self.error = Some(image);
        self
    }

    /// Default fallback image for requests that set none.
    #[must_use]
    pub fn fallback(mut self, image: DecodedImage) -> Self {
        self.fallback = Some(image);
        self
    }

    /// Trims the memory cache whenever a level arrives, until shutdown.
    #[must_use]
    pub fn trim_signals(mut self, signals: broadcast::Receiver<TrimLevel>) -> Self {
        self.trim_signals = Some(signals);
        self
    }

    /// Builds the loader.
    ///
    /// Trim signals are only observed when built inside a tokio runtime.
    #[must_use]
    pub fn build(self) -> ImageLoader {
        let config = self.config;
        let registry = Arc::new(self.components.unwrap_or_else(builtin_components));
        let memory_cache = self.memory_cache.unwrap_or_else(|| {
            Arc::new(MemoryCache::with_weak_references(
                config.memory_cache_max_bytes,
                config.weak_references_enabled,
            ))
        });

        let engine = EngineInterceptor::new(
            registry.clone(),
            MemoryCacheService::new(memory_cache.clone(), registry.clone()),
            RequestService::new(
                config.add_file_last_modified_to_cache_key,
                config.respect_network_cache_headers,
            ),
            config.effective_fetch_parallelism(),
            config.decoder_context,
            config.transformation_context,
        );
        let interceptors: Arc<[Arc<dyn Interceptor>]> = registry
            .interceptors()
            .iter()
            .cloned()
            .chain(std::iter::once(Arc::new(engine) as Arc<dyn Interceptor>))
            .collect();

        let defaults = RequestDefaults {
            placeholder: self.placeholder,
            error: self.error,
            fallback: self.fallback,
            ..config.request_defaults()
        };

        let shutdown_token = CancellationToken::new();
        let pressure_task = self.trim_signals.and_then(|signals| {
            spawn_trim_observer(signals, memory_cache.clone(), shutdown_token.clone())
        });

        info!(
            memory_cache_max_bytes = memory_cache.max_size(),
            fetch_parallelism = config.effective_fetch_parallelism(),
            interceptors = interceptors.len(),
            "Image loader ready"
        );

        ImageLoader {
            inner: Arc::new(LoaderInner {
                config,
                defaults,
                memory_cache,
                interceptors,
                event_listener: self.event_listener,
                targets: Arc::new(TargetSlots::new()),
                shutdown_token,
                is_shutdown: AtomicBool::new(false),
                pressure_task: Mutex::new(pressure_task),
            }),
        }
    }
}

fn spawn_trim_observer(
    mut signals: broadcast::Receiver<TrimLevel>,
    memory_cache: Arc<MemoryCache>,
    shutdown: CancellationToken,
) -> Option<JoinHandle<()>> {
    let Ok(runtime) = Handle::try_current() else {
        warn!("No tokio runtime available, ignoring memory pressure signals");
        return None;
    };
    Some(runtime.spawn(async move {
        loop {
            tokio::select! {
                biased;
                () = shutdown.cancelled() => break,
                signal = signals.recv() => match signal {
                    Ok(level) => memory_cache.trim(level),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Missed memory pressure signals");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            }
        }
    }))
}
