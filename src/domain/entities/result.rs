//! Outcomes of an image request.

use std::sync::Arc;

use super::{CacheKey, DataSource, DecodedImage, ImageRequest};
use crate::domain::errors::ImageError;

/// Outcome of a completed attempt.
#[derive(Debug, Clone)]
pub enum ImageResult {
    /// The image was produced.
    Success(SuccessResult),
    /// The attempt failed.
    Error(ErrorResult),
}

impl ImageResult {
    /// Image to display, if any.
    #[must_use]
    pub fn image(&self) -> Option<&DecodedImage> {
        match self {
            Self::Success(success) => Some(&success.image),
            Self::Error(error) => error.image.as_ref(),
        }
    }

    /// Request that produced this result.
    #[must_use]
    pub fn request(&self) -> &ImageRequest {
        match self {
            Self::Success(success) => &success.request,
            Self::Error(error) => &error.request,
        }
    }

    /// Returns true for a success.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Returns the success payload.
    #[must_use]
    pub const fn as_success(&self) -> Option<&SuccessResult> {
        match self {
            Self::Success(success) => Some(success),
            Self::Error(_) => None,
        }
    }

    /// Returns the error payload.
    #[must_use]
    pub const fn as_error(&self) -> Option<&ErrorResult> {
        match self {
            Self::Success(_) => None,
            Self::Error(error) => Some(error),
        }
    }
}

/// A successfully produced image.
#[derive(Debug, Clone)]
pub struct SuccessResult {
    /// The image.
    pub image: DecodedImage,
    /// The request, with defaults merged.
    pub request: ImageRequest,
    /// Where the image came from.
    pub data_source: DataSource,
    /// Memory cache key, set when the image is held by the memory cache.
    pub memory_cache_key: Option<CacheKey>,
    /// Disk cache key reported by the fetcher.
    pub disk_cache_key: Option<String>,
    /// Whether the image was decoded below full resolution.
    pub is_sampled: bool,
    /// Whether the placeholder came from the memory cache.
    pub is_placeholder_cached: bool,
}

/// A failed attempt.
#[derive(Debug, Clone)]
pub struct ErrorResult {
    /// Fallback or error image chosen by the request.
    pub image: Option<DecodedImage>,
    /// The request, with defaults merged.
    pub request: ImageRequest,
    /// The original fault.
    pub error: Arc<ImageError>,
}

impl ErrorResult {
    /// Builds an error result, picking the fallback image for null data and
    /// the error image otherwise.
    #[must_use]
    pub fn new(request: ImageRequest, error: ImageError) -> Self {
        let image = if matches!(error, ImageError::NullData) {
            request.fallback().or_else(|| request.error()).cloned()
        } else {
            request.error().cloned()
        };
        Self {
            image,
            request,
            error: Arc::new(error),
        }
    }
}
