//! Source descriptors accepted by requests.

use std::path::PathBuf;

use bytes::Bytes;

use super::DecodedImage;

/// Describes where a request's image comes from.
///
/// Mappers convert loosely typed variants (such as [`Data::Text`]) into the
/// concrete variants fetchers understand.
#[derive(Debug, Clone)]
pub enum Data {
    /// A string that still needs to be interpreted by a mapper.
    Text(String),
    /// A local file.
    Path(PathBuf),
    /// A `data:` URI.
    DataUri(String),
    /// An absolute URL for a network fetcher.
    Url(String),
    /// Encoded bytes already in memory.
    Bytes(Bytes),
    /// An image that is already decoded.
    Image(DecodedImage),
}

impl Data {
    /// Short variant name used in logs and errors.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Path(_) => "path",
            Self::DataUri(_) => "data-uri",
            Self::Url(_) => "url",
            Self::Bytes(_) => "bytes",
            Self::Image(_) => "image",
        }
    }
}

impl std::fmt::Display for Data {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text(text) => write!(f, "text({text})"),
            Self::Path(path) => write!(f, "path({})", path.display()),
            Self::DataUri(uri) => {
                let head: String = uri.chars().take(32).collect();
                write!(f, "data-uri({head}...)")
            }
            Self::Url(url) => write!(f, "url({url})"),
            Self::Bytes(bytes) => write!(f, "bytes({} bytes)", bytes.len()),
            Self::Image(image) => write!(f, "image({}x{})", image.width(), image.height()),
        }
    }
}

impl From<&str> for Data {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for Data {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<PathBuf> for Data {
    fn from(path: PathBuf) -> Self {
        Self::Path(path)
    }
}

impl From<Bytes> for Data {
    fn from(bytes: Bytes) -> Self {
        Self::Bytes(bytes)
    }
}

impl From<DecodedImage> for Data {
    fn from(image: DecodedImage) -> Self {
        Self::Image(image)
    }
}
