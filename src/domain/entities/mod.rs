//! Domain entity definitions.

mod cache_key;
mod cache_policy;
mod data;
mod image;
mod lifecycle;
mod options;
mod request;
mod result;
mod size;

pub use cache_key::{CacheKey, CacheValue, EXTRA_DISK_CACHE_KEY, Extras};
pub use cache_policy::CachePolicy;
pub use data::Data;
pub use image::{DataSource, DecodedImage, RGBA_BYTES_PER_PIXEL, WeakImage};
pub use lifecycle::{Lifecycle, LifecycleState};
pub use options::Options;
pub use request::{ImageRequest, ImageRequestBuilder, Parameter, Parameters, RequestDefaults};
pub use result::{ErrorResult, ImageResult, SuccessResult};
pub use size::{Dimension, Precision, Scale, Size, size_multiplier};
