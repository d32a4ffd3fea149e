//! Memory cache keys and values.

use std::collections::BTreeMap;

use super::{DecodedImage, Size};

/// String metadata stored alongside a cached image.
pub type Extras = BTreeMap<String, String>;

/// Extras key holding the disk cache key the image was produced from.
pub const EXTRA_DISK_CACHE_KEY: &str = "pixelpipe#disk_cache_key";

/// Identity of an entry in the memory cache.
///
/// The size is only part of the key when transformations are present, since
/// an untransformed image can serve any requested size.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    base_key: String,
    transformation_keys: Vec<String>,
    size: Option<Size>,
    extras: Extras,
}

impl CacheKey {
    /// Creates a key for untransformed data.
    #[must_use]
    pub fn new(base_key: impl Into<String>) -> Self {
        Self {
            base_key: base_key.into(),
            transformation_keys: Vec::new(),
            size: None,
            extras: Extras::new(),
        }
    }

    /// Creates a key from all components, dropping `size` when there are no
    /// transformations.
    #[must_use]
    pub fn with_components(
        base_key: impl Into<String>,
        transformation_keys: Vec<String>,
        size: Size,
        extras: Extras,
    ) -> Self {
        let size = (!transformation_keys.is_empty()).then_some(size);
        Self {
            base_key: base_key.into(),
            transformation_keys,
            size,
            extras,
        }
    }

    /// Adds an extra entry.
    #[must_use]
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extras.insert(key.into(), value.into());
        self
    }

    /// Fetcher-derived identity of the underlying data.
    #[must_use]
    pub fn base_key(&self) -> &str {
        &self.base_key
    }

    /// Cache keys of the applied transformations, in order.
    #[must_use]
    pub fn transformation_keys(&self) -> &[String] {
        &self.transformation_keys
    }

    /// Size the transformations were applied at.
    #[must_use]
    pub const fn size(&self) -> Option<Size> {
        self.size
    }

    /// Extra parameters that distinguish this entry.
    #[must_use]
    pub const fn extras(&self) -> &Extras {
        &self.extras
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.base_key)?;
        if !self.transformation_keys.is_empty() {
            write!(f, "[{}]", self.transformation_keys.join(","))?;
        }
        if let Some(size) = self.size {
            write!(f, "@{size}")?;
        }
        if !self.extras.is_empty() {
            write!(f, "{:?}", self.extras)?;
        }
        Ok(())
    }
}

impl From<&str> for CacheKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// A cached image together with its metadata.
#[derive(Debug, Clone)]
pub struct CacheValue {
    /// The cached image.
    pub image: DecodedImage,
    /// Metadata stored with the image.
    pub extras: Extras,
    /// Whether the image was decoded below the source's full resolution.
    pub is_sampled: bool,
}

impl CacheValue {
    /// Creates a value with no extras.
    #[must_use]
    pub fn new(image: DecodedImage, is_sampled: bool) -> Self {
        Self {
            image,
            extras: Extras::new(),
            is_sampled,
        }
    }

    /// Attaches extras.
    #[must_use]
    pub fn with_extras(mut self, extras: Extras) -> Self {
        self.extras = extras;
        self
    }

    /// Footprint used for budget accounting.
    #[must_use]
    pub fn size_bytes(&self) -> u64 {
        self.image.size_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_ignored_without_transformations() {
        let a = CacheKey::with_components("a", Vec::new(), Size::new(10, 10), Extras::new());
        let b = CacheKey::with_components("a", Vec::new(), Size::new(99, 1), Extras::new());
        assert_eq!(a, b);
        assert_eq!(a.size(), None);
    }

    #[test]
    fn test_size_kept_with_transformations() {
        let keys = vec!["blur".to_string()];
        let a = CacheKey::with_components("a", keys.clone(), Size::new(10, 10), Extras::new());
        let b = CacheKey::with_components("a", keys, Size::new(20, 10), Extras::new());
        assert_ne!(a, b);
        assert_eq!(a.size(), Some(Size::new(10, 10)));
    }

    #[test]
    fn test_extras_participate_in_equality() {
        let a = CacheKey::new("a").with_extra("lang", "en");
        let b = CacheKey::new("a").with_extra("lang", "fr");
        assert_ne!(a, b);
        assert_eq!(a, CacheKey::new("a").with_extra("lang", "en"));
    }

    #[test]
    fn test_display() {
        let key = CacheKey::with_components(
            "file.png",
            vec!["crop".to_string()],
            Size::new(4, 4),
            Extras::new(),
        );
        assert_eq!(key.to_string(), "file.png[crop]@Size(4, 4)");
    }
}
