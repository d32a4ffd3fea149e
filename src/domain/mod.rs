//! Domain layer with request entities, errors, and collaborator ports.

/// Entity definitions.
pub mod entities;
/// Error types.
pub mod errors;
/// Port definitions.
pub mod ports;

pub use entities::{DecodedImage, ImageRequest, ImageResult};
pub use errors::{Cancelled, ImageError};
pub use ports::{Decoder, Fetcher, Mapper, Target, TargetId, Transformation};
