//! Sources already held in memory.

use async_trait::async_trait;

use crate::domain::entities::{Data, DataSource, Options};
use crate::domain::errors::ImageError;
use crate::domain::ports::{ByteSource, FetchResult, Fetcher};

/// Serves [`Data::Bytes`] and [`Data::Image`].
///
/// Neither has a stable identity, so results are not memory cached.
#[derive(Debug, Default, Clone, Copy)]
pub struct MemoryFetcher;

#[async_trait]
impl Fetcher for MemoryFetcher {
    fn capable(&self, data: &Data) -> bool {
        matches!(data, Data::Bytes(_) | Data::Image(_))
    }

    async fn fetch(&self, data: &Data, _options: &Options) -> Result<FetchResult, ImageError> {
        match data {
            Data::Bytes(bytes) => Ok(FetchResult::Source {
                source: ByteSource::new(bytes.clone()),
                mime_type: None,
                data_source: DataSource::Memory,
                disk_cache_key: None,
            }),
            Data::Image(image) => Ok(FetchResult::Image {
                image: image.clone(),
                is_sampled: false,
                data_source: DataSource::Memory,
            }),
            other => Err(ImageError::other(format!("memory fetcher cannot read {other}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;
    use crate::domain::entities::DecodedImage;

    #[tokio::test]
    async fn test_image_is_passed_through() {
        let image = DecodedImage::opaque(3, 3);
        let result = MemoryFetcher
            .fetch(&Data::Image(image.clone()), &Options::default())
            .await
            .unwrap();
        assert!(matches!(result, FetchResult::Image { image: ref out, .. } if out.ptr_eq(&image)));
    }

    #[tokio::test]
    async fn test_bytes_become_source() {
        let result = MemoryFetcher
            .fetch(&Data::Bytes(Bytes::from_static(b"abc")), &Options::default())
            .await
            .unwrap();
        assert!(matches!(result, FetchResult::Source { ref source, .. } if source.len() == 3));
    }

    #[test]
    fn test_memory_sources_have_no_key() {
        let data = Data::Bytes(Bytes::from_static(b"abc"));
        assert!(MemoryFetcher.capable(&data));
        assert_eq!(MemoryFetcher.key(&data, &Options::default()), None);
        assert!(!MemoryFetcher.capable(&Data::from("abc")));
    }
}
