//! Local file fetching.

use std::path::Path;
use std::time::UNIX_EPOCH;

use async_trait::async_trait;
use tokio::fs;
use tracing::trace;

use crate::domain::entities::{Data, DataSource, Options};
use crate::domain::errors::ImageError;
use crate::domain::ports::{ByteSource, FetchResult, Fetcher};

/// Reads [`Data::Path`] sources from disk.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileFetcher;

#[async_trait]
impl Fetcher for FileFetcher {
    fn capable(&self, data: &Data) -> bool {
        matches!(data, Data::Path(_))
    }

    /// The path, suffixed with its modification time when enabled.
    ///
    /// Keys are derived synchronously before the cache probe, so the
    /// modification time comes from a single blocking `stat`. The file
    /// itself is only read in [`Fetcher::fetch`].
    fn key(&self, data: &Data, options: &Options) -> Option<String> {
        let Data::Path(path) = data else {
            return None;
        };
        let key = path.display().to_string();
        if options.add_file_last_modified_to_cache_key
            && let Some(modified) = last_modified_millis(path)
        {
            return Some(format!("{key}:{modified}"));
        }
        Some(key)
    }

    async fn fetch(&self, data: &Data, _options: &Options) -> Result<FetchResult, ImageError> {
        let Data::Path(path) = data else {
            return Err(ImageError::other(format!("file fetcher cannot read {data}")));
        };
        let bytes = fs::read(path)
            .await
            .map_err(|e| ImageError::other(format!("failed to read {}: {e}", path.display())))?;
        trace!(path = %path.display(), len = bytes.len(), "Read image file");

        Ok(FetchResult::Source {
            source: ByteSource::new(bytes),
            mime_type: mime_type_for(path).map(str::to_string),
            data_source: DataSource::Disk,
            disk_cache_key: None,
        })
    }
}

/// Metadata-only lookup; a missing or unreadable file yields `None`.
fn last_modified_millis(path: &Path) -> Option<u128> {
    let modified = std::fs::metadata(path).ok()?.modified().ok()?;
    Some(modified.duration_since(UNIX_EPOCH).ok()?.as_millis())
}

/// MIME type implied by a path's extension.
#[must_use]
pub fn mime_type_for(path: &Path) -> Option<&'static str> {
    let extension = path.extension()?.to_str()?.to_ascii_lowercase();
    match extension.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        "bmp" => Some("image/bmp"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::path::PathBuf;

    use test_case::test_case;

    use super::*;

    fn temp_png(contents: &[u8]) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".png").tempfile().unwrap();
        file.write_all(contents).unwrap();
        file
    }

    #[tokio::test]
    async fn test_fetch_reads_file() {
        let file = temp_png(b"\x89PNG fake");
        let data = Data::Path(file.path().to_path_buf());

        let result = FileFetcher.fetch(&data, &Options::default()).await.unwrap();
        let FetchResult::Source {
            source,
            mime_type,
            data_source,
            ..
        } = result
        else {
            panic!("expected a byte source");
        };
        assert_eq!(&source.into_bytes()[..], b"\x89PNG fake");
        assert_eq!(mime_type.as_deref(), Some("image/png"));
        assert_eq!(data_source, DataSource::Disk);
    }

    #[tokio::test]
    async fn test_missing_file_fails() {
        let data = Data::Path(PathBuf::from("/nonexistent/pixelpipe/a.png"));
        let err = FileFetcher.fetch(&data, &Options::default()).await.unwrap_err();
        assert!(matches!(err, ImageError::Other { .. }));
    }

    #[test]
    fn test_key_includes_mtime_when_enabled() {
        let file = temp_png(b"x");
        let data = Data::Path(file.path().to_path_buf());
        let plain = file.path().display().to_string();

        let with_mtime = FileFetcher.key(&data, &Options::default()).unwrap();
        assert!(with_mtime.starts_with(&format!("{plain}:")));

        let options = Options {
            add_file_last_modified_to_cache_key: false,
            ..Options::default()
        };
        assert_eq!(FileFetcher.key(&data, &options), Some(plain));
    }

    #[test]
    fn test_key_for_missing_file_is_plain_path() {
        let path = PathBuf::from("/nonexistent/pixelpipe/a.png");
        assert_eq!(
            FileFetcher.key(&Data::Path(path.clone()), &Options::default()),
            Some(path.display().to_string())
        );
    }

    #[test]
    fn test_only_paths_are_capable() {
        assert!(FileFetcher.capable(&Data::Path(PathBuf::from("a.png"))));
        assert!(!FileFetcher.capable(&Data::from("a.png")));
    }

    #[test_case("a.PNG", Some("image/png"))]
    #[test_case("a.jpeg", Some("image/jpeg"))]
    #[test_case("a.webp", Some("image/webp"))]
    #[test_case("a.txt", None)]
    #[test_case("noext", None)]
    fn test_mime_type_for(path: &str, expected: Option<&str>) {
        assert_eq!(mime_type_for(Path::new(path)), expected);
    }
}
