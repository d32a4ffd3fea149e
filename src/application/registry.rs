//! Ordered collaborator lists used by the pipeline.

use std::sync::Arc;

use tracing::trace;

use crate::application::chain::Interceptor;
use crate::domain::entities::{Data, Options};
use crate::domain::errors::ImageError;
use crate::domain::ports::{ByteSource, Decoder, Fetcher, Mapper};

/// Maximum number of mapping steps before data is considered cyclic.
pub const MAX_MAP_DEPTH: usize = 32;

/// Registered mappers, fetchers, decoders and interceptors.
///
/// Lookups walk each list in registration order and stop at the first
/// component that accepts the input.
#[derive(Clone, Default)]
pub struct ComponentRegistry {
    mappers: Vec<Arc<dyn Mapper>>,
    fetchers: Vec<Arc<dyn Fetcher>>,
    decoders: Vec<Arc<dyn Decoder>>,
    interceptors: Vec<Arc<dyn Interceptor>>,
}

impl ComponentRegistry {
    /// Starts an empty builder.
    #[must_use]
    pub fn builder() -> ComponentRegistryBuilder {
        ComponentRegistryBuilder::default()
    }

    /// Starts a builder pre-filled with this registry's components.
    #[must_use]
    pub fn new_builder(&self) -> ComponentRegistryBuilder {
        ComponentRegistryBuilder {
            registry: self.clone(),
        }
    }

    /// Applies mappers until none of them applies any more.
    ///
    /// # Errors
    /// Returns an error if mapping does not settle within
    /// [`MAX_MAP_DEPTH`] steps.
    pub fn map(&self, data: Data, options: &Options) -> Result<Data, ImageError> {
        let mut current = data;
        for _ in 0..MAX_MAP_DEPTH {
            let Some(mapped) = self
                .mappers
                .iter()
                .find_map(|mapper| mapper.map(&current, options))
            else {
                return Ok(current);
            };
            trace!(from = current.kind(), to = mapped.kind(), "Mapped request data");
            current = mapped;
        }
        Err(ImageError::other(format!(
            "data mapping did not settle after {MAX_MAP_DEPTH} steps: {current}"
        )))
    }

    /// Base cache key from the first fetcher that accepts `data`.
    #[must_use]
    pub fn key(&self, data: &Data, options: &Options) -> Option<String> {
        self.fetcher_for(data)
            .and_then(|(_, fetcher)| fetcher.key(data, options))
    }

    /// First fetcher accepting `data`, with its index.
    #[must_use]
    pub fn fetcher_for(&self, data: &Data) -> Option<(usize, &Arc<dyn Fetcher>)> {
        self.fetchers
            .iter()
            .enumerate()
            .find(|(_, fetcher)| fetcher.capable(data))
    }

    /// First decoder accepting `source`, with its index.
    #[must_use]
    pub fn decoder_for(
        &self,
        source: &ByteSource,
        mime_type: Option<&str>,
    ) -> Option<(usize, &Arc<dyn Decoder>)> {
        self.decoders
            .iter()
            .enumerate()
            .find(|(_, decoder)| decoder.capable(source, mime_type))
    }

    /// Interceptors in execution order.
    #[must_use]
    pub fn interceptors(&self) -> &[Arc<dyn Interceptor>] {
        &self.interceptors
    }
}

impl std::fmt::Debug for ComponentRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentRegistry")
            .field("mappers", &self.mappers.len())
            .field("fetchers", &self.fetchers.len())
            .field("decoders", &self.decoders.len())
            .field("interceptors", &self.interceptors.len())
            .finish()
    }
}

/// Builder for [`ComponentRegistry`].
#[derive(Default)]
#[must_use]
pub struct ComponentRegistryBuilder {
    registry: ComponentRegistry,
}

impl ComponentRegistryBuilder {
    /// Appends a mapper.
    pub fn add_mapper(mut self, mapper: impl Mapper + 'static) -> Self {
        self.registry.mappers.push(Arc::new(mapper));
        self
    }

    /// Appends a fetcher.
    pub fn add_fetcher(mut self, fetcher: impl Fetcher + 'static) -> Self {
        self.registry.fetchers.push(Arc::new(fetcher));
        self
    }

    /// Appends a shared fetcher.
    pub fn add_shared_fetcher(mut self, fetcher: Arc<dyn Fetcher>) -> Self {
        self.registry.fetchers.push(fetcher);
        self
    }

    /// Appends a decoder.
    pub fn add_decoder(mut self, decoder: impl Decoder + 'static) -> Self {
        self.registry.decoders.push(Arc::new(decoder));
        self
    }

    /// Appends a shared decoder.
    pub fn add_shared_decoder(mut self, decoder: Arc<dyn Decoder>) -> Self {
        self.registry.decoders.push(decoder);
        self
    }

    /// Appends an interceptor. The engine always runs after all of them.
    pub fn add_interceptor(mut self, interceptor: impl Interceptor + 'static) -> Self {
        self.registry.interceptors.push(Arc::new(interceptor));
        self
    }

    /// Finishes the registry.
    #[must_use]
    pub fn build(self) -> ComponentRegistry {
        self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::mocks::{MockDecoder, MockFetcher};

    struct PrefixMapper;

    impl Mapper for PrefixMapper {
        fn map(&self, data: &Data, _options: &Options) -> Option<Data> {
            match data {
                Data::Text(text) if text.starts_with("alias:") => {
                    Some(Data::Text(text.replacen("alias:", "mock:", 1)))
                }
                _ => None,
            }
        }
    }

    struct LoopingMapper;

    impl Mapper for LoopingMapper {
        fn map(&self, data: &Data, _options: &Options) -> Option<Data> {
            Some(data.clone())
        }
    }

    #[test]
    fn test_map_until_settled() {
        let registry = ComponentRegistry::builder().add_mapper(PrefixMapper).build();
        let mapped = registry
            .map(Data::from("alias:cat"), &Options::default())
            .unwrap();
        assert!(matches!(mapped, Data::Text(ref t) if t == "mock:cat"));
    }

    #[test]
    fn test_map_cycle_is_error() {
        let registry = ComponentRegistry::builder().add_mapper(LoopingMapper).build();
        let err = registry
            .map(Data::from("x"), &Options::default())
            .unwrap_err();
        assert!(matches!(err, ImageError::Other { .. }));
    }

    #[test]
    fn test_first_capable_fetcher_wins() {
        let registry = ComponentRegistry::builder()
            .add_fetcher(MockFetcher::new("a:", &b"1"[..]))
            .add_fetcher(MockFetcher::new("", &b"2"[..]).unkeyed())
            .build();

        let (index, _) = registry.fetcher_for(&Data::from("a:x")).unwrap();
        assert_eq!(index, 0);
        let (index, _) = registry.fetcher_for(&Data::from("b:x")).unwrap();
        assert_eq!(index, 1);
        assert_eq!(
            registry.key(&Data::from("a:x"), &Options::default()),
            Some("a:x".to_string())
        );
        assert_eq!(registry.key(&Data::from("b:x"), &Options::default()), None);
    }

    #[test]
    fn test_decoder_lookup_does_not_consume() {
        let registry = ComponentRegistry::builder()
            .add_decoder(MockDecoder::new(1, 1))
            .build();
        let source = ByteSource::new(&b"bytes"[..]);

        assert!(registry.decoder_for(&source, None).is_some());
        assert!(!source.is_closed());
        assert_eq!(source.len(), 5);
        assert!(registry.decoder_for(&ByteSource::new(&b""[..]), None).is_none());
    }
}
