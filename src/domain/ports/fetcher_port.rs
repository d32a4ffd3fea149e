//! Port definition for fetching image sources.

use async_trait::async_trait;
use bytes::Bytes;

use crate::domain::entities::{Data, DataSource, DecodedImage, Options};
use crate::domain::errors::ImageError;

/// Encoded image bytes that must be closed exactly once.
///
/// Closing happens on [`ByteSource::close`], on [`ByteSource::into_bytes`]
/// or on drop, whichever comes first, so every exit path releases the
/// underlying resource.
pub struct ByteSource {
    bytes: Bytes,
    on_close: Option<Box<dyn FnOnce() + Send>>,
    closed: bool,
}

impl ByteSource {
    /// Wraps bytes held in memory.
    #[must_use]
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self {
            bytes: bytes.into(),
            on_close: None,
            closed: false,
        }
    }

    /// Registers a hook that runs when the source is closed.
    #[must_use]
    pub fn on_close(mut self, hook: impl FnOnce() + Send + 'static) -> Self {
        self.on_close = Some(Box::new(hook));
        self
    }

    /// Returns up to `len` leading bytes without consuming the source.
    #[must_use]
    pub fn peek(&self, len: usize) -> &[u8] {
        &self.bytes[..len.min(self.bytes.len())]
    }

    /// Total length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns true if the source holds no bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Returns true once the source has been closed.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.closed
    }

    /// Consumes the source, closing it and returning its bytes.
    #[must_use]
    pub fn into_bytes(mut self) -> Bytes {
        let bytes = std::mem::take(&mut self.bytes);
        self.close();
        bytes
    }

    /// Closes the source. Later calls do nothing.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Some(hook) = self.on_close.take() {
            hook();
        }
    }
}

impl Drop for ByteSource {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for ByteSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ByteSource")
            .field("len", &self.bytes.len())
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

/// Output of a fetcher.
#[derive(Debug)]
pub enum FetchResult {
    /// Encoded bytes that still need a decoder.
    Source {
        /// The encoded bytes.
        source: ByteSource,
        /// MIME type hint, if known.
        mime_type: Option<String>,
        /// Where the bytes came from.
        data_source: DataSource,
        /// Disk cache key the bytes are stored under, if any.
        disk_cache_key: Option<String>,
    },
    /// An image that needs no decoding.
    Image {
        /// The image.
        image: DecodedImage,
        /// Whether the image is below full resolution.
        is_sampled: bool,
        /// Where the image came from.
        data_source: DataSource,
    },
}

/// Port for turning mapped data into bytes or an image.
///
/// Fetchers are tried in registration order; the first whose
/// [`Fetcher::capable`] accepts the data wins.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Returns true if this fetcher handles the data. Must not perform I/O.
    fn capable(&self, data: &Data) -> bool;

    /// Stable identity of the data, or `None` if it should not be cached.
    fn key(&self, _data: &Data, _options: &Options) -> Option<String> {
        None
    }

    /// Fetches the data.
    async fn fetch(&self, data: &Data, options: &Options) -> Result<FetchResult, ImageError>;
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counted(bytes: &'static [u8]) -> (ByteSource, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        let hook_count = count.clone();
        let source = ByteSource::new(bytes).on_close(move || {
            hook_count.fetch_add(1, Ordering::SeqCst);
        });
        (source, count)
    }

    #[test]
    fn test_close_runs_hook_once() {
        let (mut source, count) = counted(b"abc");
        source.close();
        source.close();
        assert!(source.is_closed());
        drop(source);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_drop_closes() {
        let (source, count) = counted(b"abc");
        drop(source);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_into_bytes_closes_once() {
        let (source, count) = counted(b"abc");
        let bytes = source.into_bytes();
        assert_eq!(&bytes[..], b"abc");
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_peek_does_not_consume() {
        let source = ByteSource::new(&b"\x89PNG rest"[..]);
        assert_eq!(source.peek(4), b"\x89PNG");
        assert_eq!(source.peek(100).len(), 9);
        assert_eq!(source.len(), 9);
    }
}
