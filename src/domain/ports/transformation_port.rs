//! Port definition for image transformations.

use crate::domain::entities::{DecodedImage, Scale, Size};
use crate::domain::errors::ImageError;

/// Produces a new image from a decoded one.
#[cfg_attr(test, mockall::automock)]
pub trait Transformation: Send + Sync {
    /// Identity of this transformation and its configuration.
    fn cache_key(&self) -> String;

    /// Applies the transformation at the resolved size and scale.
    fn transform(
        &self,
        image: DecodedImage,
        size: &Size,
        scale: Scale,
    ) -> Result<DecodedImage, ImageError>;
}
