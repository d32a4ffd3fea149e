//! Terminal interceptor performing the actual load.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Semaphore;
use tracing::{debug, trace};

use crate::application::cancellation::CancellationToken;
use crate::application::registry::ComponentRegistry;
use crate::application::services::{MemoryCacheService, RequestService};
use crate::domain::entities::{
    Data, DataSource, DecodedImage, ImageRequest, ImageResult, Options, Size, SuccessResult,
};
use crate::domain::errors::ImageError;
use crate::domain::ports::{ByteSource, DecodeResult, EventListener, FetchResult};
use crate::infrastructure::config::ExecutionContext;

use super::{Chain, Interceptor};

/// Output of the slow path before it is cached.
#[derive(Debug, Clone)]
pub struct ExecuteResult {
    /// Final image after transformations.
    pub image: DecodedImage,
    /// Whether the image is below the source's full resolution.
    pub is_sampled: bool,
    /// Where the data came from.
    pub data_source: DataSource,
    /// Disk cache key reported by the fetcher.
    pub disk_cache_key: Option<String>,
}

/// Maps, keys, probes the memory cache, then fetches, decodes, transforms
/// and caches.
pub struct EngineInterceptor {
    registry: Arc<ComponentRegistry>,
    memory_cache_service: MemoryCacheService,
    request_service: RequestService,
    fetch_permits: Arc<Semaphore>,
    decoder_context: ExecutionContext,
    transformation_context: ExecutionContext,
}

impl EngineInterceptor {
    /// Creates the engine.
    #[must_use]
    pub fn new(
        registry: Arc<ComponentRegistry>,
        memory_cache_service: MemoryCacheService,
        request_service: RequestService,
        fetch_parallelism: usize,
        decoder_context: ExecutionContext,
        transformation_context: ExecutionContext,
    ) -> Self {
        Self {
            registry,
            memory_cache_service,
            request_service,
            fetch_permits: Arc::new(Semaphore::new(fetch_parallelism.max(1))),
            decoder_context,
            transformation_context,
        }
    }

    async fn execute(
        &self,
        request: &ImageRequest,
        mapped: Data,
        options: Options,
        token: &CancellationToken,
        listener: &dyn EventListener,
    ) -> Result<ExecuteResult, ImageError> {
        let (fetcher_index, fetcher) = self
            .registry
            .fetcher_for(&mapped)
            .ok_or_else(|| ImageError::no_fetcher(mapped.kind(), mapped.to_string()))?;
        let fetcher = fetcher.clone();

        listener.fetch_start(request, fetcher_index);
        let fetched = {
            let _permit = token
                .run_until_cancelled(self.fetch_permits.acquire())
                .await?
                .map_err(|_| ImageError::Cancelled)?;
            token
                .run_until_cancelled(fetcher.fetch(&mapped, &options))
                .await??
        };
        token.check()?;

        let result = match fetched {
            FetchResult::Source {
                source,
                mime_type,
                data_source,
                disk_cache_key,
            } => {
                listener.fetch_end(request, data_source);
                let decoded = self
                    .decode(request, source, mime_type, options.clone(), token, listener)
                    .await?;
                ExecuteResult {
                    image: decoded.image,
                    is_sampled: decoded.is_sampled,
                    data_source,
                    disk_cache_key,
                }
            }
            FetchResult::Image {
                image,
                is_sampled,
                data_source,
            } => {
                listener.fetch_end(request, data_source);
                ExecuteResult {
                    image,
                    is_sampled,
                    data_source,
                    disk_cache_key: None,
                }
            }
        };

        let image = self
            .transform(request, result.image, options.size, token, listener)
            .await?;
        Ok(ExecuteResult { image, ..result })
    }

    async fn decode(
        &self,
        request: &ImageRequest,
        source: ByteSource,
        mime_type: Option<String>,
        options: Options,
        token: &CancellationToken,
        listener: &dyn EventListener,
    ) -> Result<DecodeResult, ImageError> {
        let Some((decoder_index, decoder)) = self.registry.decoder_for(&source, mime_type.as_deref())
        else {
            return Err(ImageError::no_decoder(mime_type.as_deref()));
        };
        let decoder = decoder.clone();

        listener.decode_start(request, decoder_index);
        let decoded = run_in_context(self.decoder_context, token, move || {
            decoder.decode(source, &options)
        })
        .await?;
        token.check()?;
        listener.decode_end(request, decoded.is_sampled);
        Ok(decoded)
    }

    async fn transform(
        &self,
        request: &ImageRequest,
        image: DecodedImage,
        size: Size,
        token: &CancellationToken,
        listener: &dyn EventListener,
    ) -> Result<DecodedImage, ImageError> {
        let transformations = request.transformations();
        if transformations.is_empty() {
            return Ok(image);
        }

        listener.transform_start(request);
        let scale = request.scale();
        let mut image = image;
        for transformation in transformations {
            let transformation = transformation.clone();
            trace!(key = %transformation.cache_key(), "Applying transformation");
            image = run_in_context(self.transformation_context, token, move || {
                transformation.transform(image, &size, scale)
            })
            .await?;
            token.check()?;
        }
        listener.transform_end(request);
        Ok(image)
    }
}

#[async_trait]
impl Interceptor for EngineInterceptor {
    async fn intercept(&self, chain: Chain) -> Result<ImageResult, ImageError> {
        let request = chain.request().clone();
        let size = chain.size();
        let token = chain.cancellation().clone();
        let listener = chain.event_listener().clone();
        let data = request.data().cloned().ok_or(ImageError::NullData)?;
        let options = self.request_service.options(&request, size);

        listener.map_start(&request, &data);
        let mapped = self.registry.map(data, &options)?;
        listener.map_end(&request, &mapped);

        let cache_key = self
            .memory_cache_service
            .new_cache_key(&request, &mapped, &options, size);
        listener.key_end(&request, cache_key.as_ref());

        if let Some(key) = &cache_key {
            if let Some(value) = self.memory_cache_service.get_cache_value(&request, key, size) {
                trace!(key = %key, "Serving image from memory cache");
                return Ok(ImageResult::Success(MemoryCacheService::new_result(
                    &request,
                    key.clone(),
                    value,
                    chain.is_placeholder_cached(),
                )));
            }
        }

        let result = self
            .execute(&request, mapped, options, &token, listener.as_ref())
            .await?;
        let is_cached = self
            .memory_cache_service
            .set_cache_value(cache_key.as_ref(), &request, &result);
        debug!(
            data_source = %result.data_source,
            cached = is_cached,
            sampled = result.is_sampled,
            "Loaded image"
        );

        Ok(ImageResult::Success(SuccessResult {
            image: result.image,
            request,
            data_source: result.data_source,
            memory_cache_key: cache_key.filter(|_| is_cached),
            disk_cache_key: result.disk_cache_key,
            is_sampled: result.is_sampled,
            is_placeholder_cached: chain.is_placeholder_cached(),
        }))
    }
}

impl std::fmt::Debug for EngineInterceptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineInterceptor")
            .field("registry", &self.registry)
            .field("decoder_context", &self.decoder_context)
            .field("transformation_context", &self.transformation_context)
            .finish_non_exhaustive()
    }
}

/// Runs CPU-bound `work` in the configured context.
///
/// On the blocking pool the wait is raced against `token`; a cancelled job
/// finishes in the background and drops whatever it owns.
async fn run_in_context<T, F>(
    context: ExecutionContext,
    token: &CancellationToken,
    work: F,
) -> Result<T, ImageError>
where
    F: FnOnce() -> Result<T, ImageError> + Send + 'static,
    T: Send + 'static,
{
    match context {
        ExecutionContext::Inline => work(),
        ExecutionContext::Blocking => {
            let handle = tokio::task::spawn_blocking(work);
            token
                .run_until_cancelled(handle)
                .await?
                .map_err(|e| ImageError::other(format!("worker task failed: {e}")))?
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    use mockall::Sequence;

    use super::*;
    use crate::domain::entities::{CacheKey, CachePolicy, Precision};
    use crate::domain::ports::mocks::{MockDecoder, MockFetcher};
    use crate::domain::ports::{Decoder, Fetcher, MockTransformation, NoopEventListener};
    use crate::infrastructure::memory::MemoryCache;

    struct Harness {
        engine: Arc<EngineInterceptor>,
        cache: Arc<MemoryCache>,
    }

    fn harness_with(
        fetchers: Vec<Arc<dyn Fetcher>>,
        decoder: Arc<dyn Decoder>,
        context: ExecutionContext,
        cache_bytes: u64,
    ) -> Harness {
        let mut builder = ComponentRegistry::builder();
        for fetcher in fetchers {
            builder = builder.add_shared_fetcher(fetcher);
        }
        let registry = Arc::new(builder.add_shared_decoder(decoder).build());
        let cache = Arc::new(MemoryCache::new(cache_bytes));
        let engine = EngineInterceptor::new(
            registry.clone(),
            MemoryCacheService::new(cache.clone(), registry),
            RequestService::default(),
            2,
            context,
            context,
        );
        Harness {
            engine: Arc::new(engine),
            cache,
        }
    }

    async fn run(
        harness: &Harness,
        request: ImageRequest,
        size: Size,
        token: CancellationToken,
    ) -> Result<ImageResult, ImageError> {
        let interceptors: Vec<Arc<dyn Interceptor>> = vec![harness.engine.clone()];
        Chain::new(
            request.clone(),
            size,
            interceptors.into(),
            token,
            Arc::new(NoopEventListener),
            false,
        )
        .proceed(request)
        .await
    }

    #[tokio::test]
    async fn test_slow_path_then_memory_hit() {
        let fetcher = Arc::new(MockFetcher::new("mock:", &b"png"[..]));
        let decoder = Arc::new(MockDecoder::new(8, 8));
        let harness = harness_with(vec![fetcher.clone()], decoder.clone(), ExecutionContext::Inline, 1 << 20);
        let request = ImageRequest::builder("mock:a").build();

        let first = run(&harness, request.clone(), Size::ORIGINAL, CancellationToken::new())
            .await
            .unwrap();
        let first = first.as_success().unwrap();
        assert_eq!(first.data_source, DataSource::Network);
        assert_eq!(first.memory_cache_key, Some(CacheKey::new("mock:a")));

        let second = run(&harness, request, Size::ORIGINAL, CancellationToken::new())
            .await
            .unwrap();
        let second = second.as_success().unwrap();
        assert_eq!(second.data_source, DataSource::MemoryCache);
        assert!(second.image.ptr_eq(&first.image));
        assert_eq!(fetcher.fetches.load(Ordering::SeqCst), 1);
        assert_eq!(fetcher.closes.load(Ordering::SeqCst), 1);
        assert_eq!(decoder.decodes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_read_disabled_still_writes() {
        let fetcher = Arc::new(MockFetcher::new("mock:", &b"png"[..]));
        let harness = harness_with(
            vec![fetcher.clone()],
            Arc::new(MockDecoder::new(8, 8)),
            ExecutionContext::Inline,
            1 << 20,
        );
        let key = CacheKey::new("mock:a");
        let stale = crate::domain::entities::CacheValue::new(DecodedImage::opaque(8, 8), false);
        harness.cache.set(key.clone(), stale.clone());

        let request = ImageRequest::builder("mock:a")
            .memory_cache_policy(CachePolicy::WriteOnly)
            .build();
        let result = run(&harness, request, Size::ORIGINAL, CancellationToken::new())
            .await
            .unwrap();
        let success = result.as_success().unwrap();

        assert_eq!(success.data_source, DataSource::Network);
        assert_eq!(fetcher.fetches.load(Ordering::SeqCst), 1);
        let cached = harness.cache.get(&key).unwrap();
        assert!(cached.image.ptr_eq(&success.image));
        assert!(!cached.image.ptr_eq(&stale.image));
    }

    #[tokio::test]
    async fn test_no_fetcher_found() {
        let harness = harness_with(
            vec![Arc::new(MockFetcher::new("mock:", &b"png"[..]))],
            Arc::new(MockDecoder::new(1, 1)),
            ExecutionContext::Inline,
            1 << 20,
        );
        let request = ImageRequest::builder("other:a").build();
        let err = run(&harness, request, Size::ORIGINAL, CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ImageError::NoFetcherFound { kind: "text", .. }));
    }

    #[tokio::test]
    async fn test_no_decoder_closes_source() {
        let fetcher = Arc::new(MockFetcher::new("mock:", &b""[..]));
        let harness = harness_with(
            vec![fetcher.clone()],
            Arc::new(MockDecoder::new(1, 1)),
            ExecutionContext::Inline,
            1 << 20,
        );
        let request = ImageRequest::builder("mock:empty").build();
        let err = run(&harness, request, Size::ORIGINAL, CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ImageError::NoDecoderFound { .. }));
        assert_eq!(fetcher.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_decode_failure_propagates() {
        let harness = harness_with(
            vec![Arc::new(MockFetcher::new("mock:", &b"x"[..]))],
            Arc::new(MockDecoder::new(1, 1).failing()),
            ExecutionContext::Blocking,
            1 << 20,
        );
        let request = ImageRequest::builder("mock:a").build();
        let err = run(&harness, request, Size::ORIGINAL, CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ImageError::DecodeFailure { .. }));
        assert!(harness.cache.keys().is_empty());
    }

    #[tokio::test]
    async fn test_transformations_run_in_order_at_resolved_size() {
        let harness = harness_with(
            vec![Arc::new(MockFetcher::new("mock:", &b"x"[..]))],
            Arc::new(MockDecoder::new(100, 100)),
            ExecutionContext::Blocking,
            1 << 20,
        );

        let mut seq = Sequence::new();
        let mut first = MockTransformation::new();
        first.expect_cache_key().returning(|| "first".to_string());
        first
            .expect_transform()
            .times(1)
            .in_sequence(&mut seq)
            .withf(|image, size, _| image.width() == 100 && *size == Size::new(10, 10))
            .returning(|_, _, _| Ok(DecodedImage::opaque(50, 50)));
        let mut second = MockTransformation::new();
        second.expect_cache_key().returning(|| "second".to_string());
        second
            .expect_transform()
            .times(1)
            .in_sequence(&mut seq)
            .withf(|image, _, _| image.width() == 50)
            .returning(|_, _, _| Ok(DecodedImage::opaque(10, 10)));

        let request = ImageRequest::builder("mock:a")
            .transformation(Arc::new(first))
            .transformation(Arc::new(second))
            .precision(Precision::Exact)
            .build();
        let result = run(&harness, request, Size::new(10, 10), CancellationToken::new())
            .await
            .unwrap();
        let success = result.as_success().unwrap();

        assert_eq!(success.image.width(), 10);
        let key = success.memory_cache_key.clone().unwrap();
        assert_eq!(key.transformation_keys(), ["first", "second"]);
        assert_eq!(key.size(), Some(Size::new(10, 10)));
    }

    #[tokio::test]
    async fn test_oversized_result_carries_no_key() {
        let harness = harness_with(
            vec![Arc::new(MockFetcher::new("mock:", &b"x"[..]))],
            Arc::new(MockDecoder::new(100, 100)),
            ExecutionContext::Inline,
            100,
        );
        let request = ImageRequest::builder("mock:big").build();
        let result = run(&harness, request, Size::ORIGINAL, CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(result.as_success().unwrap().memory_cache_key, None);
    }

    #[tokio::test]
    async fn test_cancel_mid_fetch_closes_source_once() {
        let fetcher = Arc::new(MockFetcher::new("hang:", &b"x"[..]).hanging());
        let harness = harness_with(
            vec![fetcher.clone()],
            Arc::new(MockDecoder::new(1, 1)),
            ExecutionContext::Inline,
            1 << 20,
        );
        let token = CancellationToken::new();
        let cancel = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            cancel.cancel();
        });

        let request = ImageRequest::builder("hang:a").build();
        let err = run(&harness, request, Size::ORIGINAL, token).await.unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(fetcher.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancel_mid_decode_closes_source_once() {
        let fetcher = Arc::new(MockFetcher::new("mock:", &b"x"[..]));
        let (decoder, gate) = MockDecoder::new(4, 4).gated();
        let decoder = Arc::new(decoder);
        let harness = harness_with(
            vec![fetcher.clone()],
            decoder.clone(),
            ExecutionContext::Blocking,
            1 << 20,
        );
        let token = CancellationToken::new();
        let cancel = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            cancel.cancel();
        });

        let request = ImageRequest::builder("mock:a").build();
        let err = run(&harness, request, Size::ORIGINAL, token).await.unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(fetcher.closes.load(Ordering::SeqCst), 0);

        gate.send(()).unwrap();
        for _ in 0..100 {
            if fetcher.closes.load(Ordering::SeqCst) > 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(fetcher.closes.load(Ordering::SeqCst), 1);
        assert!(harness.cache.keys().is_empty());
    }
}
