//! Decoded image handle and provenance types.

use std::sync::{Arc, Weak};

/// Bytes used per pixel for 8-bit RGBA rasters.
pub const RGBA_BYTES_PER_PIXEL: u64 = 4;

/// Opaque, cheaply cloneable handle to a decoded image.
///
/// Clones share one allocation; the memory cache tracks that allocation
/// weakly once an entry is demoted, so an image stays reachable exactly as
/// long as somebody outside the weak tier still holds a handle.
#[derive(Clone)]
pub struct DecodedImage {
    inner: Arc<ImageData>,
}

struct ImageData {
    width: u32,
    height: u32,
    size_bytes: u64,
    shareable: bool,
    hardware: bool,
    raster: Option<image::DynamicImage>,
}

impl DecodedImage {
    /// Wraps a raster decoded by the `image` crate.
    #[must_use]
    pub fn from_raster(raster: image::DynamicImage) -> Self {
        let size_bytes = raster.as_bytes().len() as u64;
        Self {
            inner: Arc::new(ImageData {
                width: raster.width(),
                height: raster.height(),
                size_bytes,
                shareable: true,
                hardware: false,
                raster: Some(raster),
            }),
        }
    }

    /// Creates an image without pixel storage, sized as an RGBA raster.
    ///
    /// Used for platform-owned images whose pixels live elsewhere.
    #[must_use]
    pub fn opaque(width: u32, height: u32) -> Self {
        Self::opaque_with_size(
            width,
            height,
            u64::from(width) * u64::from(height) * RGBA_BYTES_PER_PIXEL,
        )
    }

    /// Creates an image without pixel storage and an explicit footprint.
    #[must_use]
    pub fn opaque_with_size(width: u32, height: u32, size_bytes: u64) -> Self {
        Self {
            inner: Arc::new(ImageData {
                width,
                height,
                size_bytes,
                shareable: true,
                hardware: false,
                raster: None,
            }),
        }
    }

    /// Returns a copy of this handle's metadata marked as non-shareable.
    ///
    /// Non-shareable images are owned by a single target and never written
    /// to the memory cache. The pixels are not copied.
    #[must_use]
    pub fn into_exclusive(self) -> Self {
        self.rebuild(|data| data.shareable = false)
    }

    /// Returns a copy of this handle's metadata marked as hardware backed.
    #[must_use]
    pub fn into_hardware(self) -> Self {
        self.rebuild(|data| data.hardware = true)
    }

    fn rebuild(self, apply: impl FnOnce(&mut ImageData)) -> Self {
        let mut data = match Arc::try_unwrap(self.inner) {
            Ok(data) => data,
            Err(shared) => ImageData {
                width: shared.width,
                height: shared.height,
                size_bytes: shared.size_bytes,
                shareable: shared.shareable,
                hardware: shared.hardware,
                raster: shared.raster.clone(),
            },
        };
        apply(&mut data);
        Self {
            inner: Arc::new(data),
        }
    }

    /// Width in pixels.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.inner.width
    }

    /// Height in pixels.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.inner.height
    }

    /// Memory footprint in bytes.
    #[must_use]
    pub fn size_bytes(&self) -> u64 {
        self.inner.size_bytes
    }

    /// Whether the image may be shared between targets through the cache.
    #[must_use]
    pub fn is_shareable(&self) -> bool {
        self.inner.shareable
    }

    /// Whether the pixels live in hardware-accelerated memory.
    #[must_use]
    pub fn is_hardware(&self) -> bool {
        self.inner.hardware
    }

    /// Pixel data, when the image was decoded in process.
    #[must_use]
    pub fn raster(&self) -> Option<&image::DynamicImage> {
        self.inner.raster.as_ref()
    }

    /// Returns true if both handles point at the same allocation.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Creates a weak reference that does not keep the image alive.
    #[must_use]
    pub fn downgrade(&self) -> WeakImage {
        WeakImage {
            inner: Arc::downgrade(&self.inner),
        }
    }
}

impl std::fmt::Debug for DecodedImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecodedImage")
            .field("width", &self.width())
            .field("height", &self.height())
            .field("size_bytes", &self.size_bytes())
            .field("shareable", &self.is_shareable())
            .field("hardware", &self.is_hardware())
            .finish_non_exhaustive()
    }
}

/// Weak counterpart of [`DecodedImage`].
#[derive(Clone, Debug)]
pub struct WeakImage {
    inner: Weak<ImageData>,
}

impl WeakImage {
    /// Returns the image if something still holds it.
    #[must_use]
    pub fn upgrade(&self) -> Option<DecodedImage> {
        self.inner.upgrade().map(|inner| DecodedImage { inner })
    }

    /// Returns true while at least one strong handle exists.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.inner.strong_count() > 0
    }

    /// Returns true if this reference tracks the given image.
    #[must_use]
    pub fn points_to(&self, image: &DecodedImage) -> bool {
        std::ptr::eq(self.inner.as_ptr(), Arc::as_ptr(&image.inner))
    }
}

impl std::fmt::Debug for ImageData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageData")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}

/// Where an image was loaded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    /// Served from the in-process memory cache.
    MemoryCache,
    /// Produced from bytes or an image already held in memory.
    Memory,
    /// Read from local storage or a disk cache.
    Disk,
    /// Downloaded from the network.
    Network,
}

impl std::fmt::Display for DataSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MemoryCache => write!(f, "memory-cache"),
            Self::Memory => write!(f, "memory"),
            Self::Disk => write!(f, "disk"),
            Self::Network => write!(f, "network"),
        }
    }
}
