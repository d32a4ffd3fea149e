//! Inline `data:` URI fetching.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use sha2::{Digest, Sha256};

use crate::domain::entities::{Data, DataSource, Options};
use crate::domain::errors::ImageError;
use crate::domain::ports::{ByteSource, FetchResult, Fetcher};

/// Decodes [`Data::DataUri`] payloads.
///
/// Keys are the SHA-256 digest of the whole URI, so large inline images do
/// not bloat the cache's key space.
#[derive(Debug, Default, Clone, Copy)]
pub struct DataUriFetcher;

#[async_trait]
impl Fetcher for DataUriFetcher {
    fn capable(&self, data: &Data) -> bool {
        matches!(data, Data::DataUri(_))
    }

    fn key(&self, data: &Data, _options: &Options) -> Option<String> {
        let Data::DataUri(uri) = data else {
            return None;
        };
        Some(hex::encode(Sha256::digest(uri.as_bytes())))
    }

    async fn fetch(&self, data: &Data, _options: &Options) -> Result<FetchResult, ImageError> {
        let Data::DataUri(uri) = data else {
            return Err(ImageError::other(format!("data URI fetcher cannot read {data}")));
        };
        let (mime_type, bytes) = parse_data_uri(uri)?;
        Ok(FetchResult::Source {
            source: ByteSource::new(bytes),
            mime_type,
            data_source: DataSource::Memory,
            disk_cache_key: None,
        })
    }
}

/// Splits a `data:` URI into its MIME type and decoded payload.
///
/// # Errors
/// Returns [`ImageError::Other`] for URIs without a payload separator or
/// with invalid base64.
pub fn parse_data_uri(uri: &str) -> Result<(Option<String>, Vec<u8>), ImageError> {
    let rest = uri
        .strip_prefix("data:")
        .ok_or_else(|| ImageError::other("not a data URI"))?;
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| ImageError::other("data URI has no payload"))?;

    let (media_type, is_base64) = match header.strip_suffix(";base64") {
        Some(media_type) => (media_type, true),
        None => (header, false),
    };
    let mime_type = media_type
        .split(';')
        .next()
        .filter(|mime| !mime.is_empty())
        .map(str::to_string);

    let bytes = if is_base64 {
        STANDARD
            .decode(payload.trim())
            .map_err(|e| ImageError::other(format!("invalid base64 in data URI: {e}")))?
    } else {
        payload.as_bytes().to_vec()
    };
    Ok((mime_type, bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_base64_payload() {
        let uri = format!("data:image/png;base64,{}", STANDARD.encode(b"\x89PNG"));
        let (mime, bytes) = parse_data_uri(&uri).unwrap();
        assert_eq!(mime.as_deref(), Some("image/png"));
        assert_eq!(bytes, b"\x89PNG");
    }

    #[test]
    fn test_parse_plain_payload_without_mime() {
        let (mime, bytes) = parse_data_uri("data:,hello").unwrap();
        assert_eq!(mime, None);
        assert_eq!(bytes, b"hello");
    }

    #[test]
    fn test_malformed_uris_fail() {
        assert!(parse_data_uri("data:image/png;base64").is_err());
        assert!(parse_data_uri("data:image/png;base64,!!!").is_err());
        assert!(parse_data_uri("image/png,abc").is_err());
    }

    #[test]
    fn test_key_is_stable_digest() {
        let a = Data::DataUri("data:,a".to_string());
        let b = Data::DataUri("data:,b".to_string());
        let options = Options::default();

        let key = DataUriFetcher.key(&a, &options).unwrap();
        assert_eq!(key.len(), 64);
        assert_eq!(DataUriFetcher.key(&a, &options), Some(key));
        assert_ne!(DataUriFetcher.key(&a, &options), DataUriFetcher.key(&b, &options));
    }

    #[tokio::test]
    async fn test_fetch_yields_memory_source() {
        let data = Data::DataUri("data:text/plain,abc".to_string());
        let result = DataUriFetcher.fetch(&data, &Options::default()).await.unwrap();
        assert!(matches!(
            result,
            FetchResult::Source { data_source: DataSource::Memory, ref mime_type, .. }
                if mime_type.as_deref() == Some("text/plain")
        ));
    }
}
