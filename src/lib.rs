//! Pixelpipe - a concurrent image request engine.
//!
//! Requests flow through an interceptor chain into an engine that maps,
//! fetches, decodes and transforms images, backed by a two-tier memory cache
//! (a byte-bounded LRU plus a weak tier for evicted images still in use).
//! Target-bound requests occupy one slot per target and follow the target's
//! lifecycle.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

/// Application layer containing the loader, interceptor chain and request state.
pub mod application;
/// Domain layer containing entities, errors, and port definitions.
pub mod domain;
/// Infrastructure layer containing configuration, caches and built-in components.
pub mod infrastructure;

pub use application::{Disposable, ImageLoader, ImageLoaderBuilder};
pub use domain::{Cancelled, DecodedImage, ImageError, ImageRequest, ImageResult};

/// Current version of the library.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name.
pub const NAME: &str = "pixelpipe";
