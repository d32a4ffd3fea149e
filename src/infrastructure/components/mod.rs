//! Built-in mappers, fetchers and decoders.

mod data_uri_fetcher;
mod file_fetcher;
mod memory_fetcher;
mod raster_decoder;
mod text_mapper;

pub use data_uri_fetcher::{DataUriFetcher, parse_data_uri};
pub use file_fetcher::{FileFetcher, mime_type_for};
pub use memory_fetcher::MemoryFetcher;
pub use raster_decoder::RasterDecoder;
pub use text_mapper::TextMapper;

use crate::application::registry::{ComponentRegistry, ComponentRegistryBuilder};

/// Builder pre-filled with the built-in components, for adding more.
#[must_use]
pub fn builtin_builder() -> ComponentRegistryBuilder {
    ComponentRegistry::builder()
        .add_mapper(TextMapper)
        .add_fetcher(FileFetcher)
        .add_fetcher(DataUriFetcher)
        .add_fetcher(MemoryFetcher)
        .add_decoder(RasterDecoder)
}

/// Registry with the built-in components only.
#[must_use]
pub fn builtin_components() -> ComponentRegistry {
    builtin_builder().build()
}

#[cfg(test)]
mod tests {
    use std::io::{Cursor, Write};

    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use bytes::Bytes;
    use image::{DynamicImage, ImageFormat};

    use crate::application::ImageLoader;
    use crate::domain::entities::{DataSource, DecodedImage, ImageRequest};
    use crate::domain::errors::ImageError;
    use crate::infrastructure::config::LoaderConfig;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let mut bytes = Vec::new();
        DynamicImage::new_rgba8(width, height)
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    #[tokio::test]
    async fn test_data_uri_round_trip_through_loader() {
        let loader = ImageLoader::new(LoaderConfig::default());
        let uri = format!("data:image/png;base64,{}", STANDARD.encode(png(6, 3)));

        let first = loader.execute(ImageRequest::builder(uri.as_str()).build()).await.unwrap();
        let first = first.as_success().unwrap();
        assert_eq!((first.image.width(), first.image.height()), (6, 3));
        assert_eq!(first.data_source, DataSource::Memory);
        assert!(first.memory_cache_key.is_some());

        let second = loader.execute(ImageRequest::builder(uri).build()).await.unwrap();
        assert_eq!(second.as_success().unwrap().data_source, DataSource::MemoryCache);
    }

    #[tokio::test]
    async fn test_file_path_through_loader() {
        let mut file = tempfile::Builder::new().suffix(".png").tempfile().unwrap();
        file.write_all(&png(5, 5)).unwrap();
        let loader = ImageLoader::new(LoaderConfig::default());

        let result = loader
            .execute(ImageRequest::builder(file.path().display().to_string()).build())
            .await
            .unwrap();
        let success = result.as_success().unwrap();
        assert_eq!(success.data_source, DataSource::Disk);
        assert_eq!(success.image.width(), 5);
    }

    #[tokio::test]
    async fn test_bytes_and_images_are_not_cached() {
        let loader = ImageLoader::new(LoaderConfig::default());

        let from_bytes = loader
            .execute(ImageRequest::builder(Bytes::from(png(2, 2))).build())
            .await
            .unwrap();
        assert_eq!(from_bytes.as_success().unwrap().memory_cache_key, None);

        let image = DecodedImage::opaque(7, 7);
        let passed = loader
            .execute(ImageRequest::builder(image.clone()).build())
            .await
            .unwrap();
        assert!(passed.as_success().unwrap().image.ptr_eq(&image));
        assert!(loader.memory_cache().keys().is_empty());
    }

    #[tokio::test]
    async fn test_gif_has_no_decoder() {
        let loader = ImageLoader::new(LoaderConfig::default());
        let gif = STANDARD.encode(b"GIF89a\x01\x00\x01\x00\x00\x00\x00;");
        let result = loader
            .execute(ImageRequest::builder(format!("data:image/gif;base64,{gif}")).build())
            .await
            .unwrap();
        match &*result.as_error().unwrap().error {
            ImageError::NoDecoderFound { mime_type } => {
                assert_eq!(mime_type.as_deref(), Some("image/gif"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_unknown_scheme_has_no_fetcher() {
        let loader = ImageLoader::new(LoaderConfig::default());
        let result = loader
            .execute(ImageRequest::builder("gopher://example/a.png").build())
            .await
            .unwrap();
        assert!(matches!(
            *result.as_error().unwrap().error,
            ImageError::NoFetcherFound { kind: "text", .. }
        ));
    }
}
