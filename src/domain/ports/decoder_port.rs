//! Port definition for decoding fetched bytes.

use crate::domain::entities::{DecodedImage, Options};
use crate::domain::errors::ImageError;

use super::ByteSource;

/// Output of a decoder.
#[derive(Debug, Clone)]
pub struct DecodeResult {
    /// The decoded image.
    pub image: DecodedImage,
    /// Whether it was decoded below the source's full resolution.
    pub is_sampled: bool,
}

/// Port for decoding a [`ByteSource`] into an image.
///
/// Decoding is CPU bound and may run on the blocking pool, so it is
/// synchronous. Decoders are tried in registration order.
pub trait Decoder: Send + Sync {
    /// Returns true if this decoder handles the source.
    ///
    /// Receives a shared borrow, so it can only peek.
    fn capable(&self, source: &ByteSource, mime_type: Option<&str>) -> bool;

    /// Decodes the source. The source is closed when it is dropped.
    fn decode(&self, source: ByteSource, options: &Options) -> Result<DecodeResult, ImageError>;
}
