//! Image request error types.

use thiserror::Error;

/// Result alias for pipeline operations.
pub type ImageResultOf<T> = Result<T, ImageError>;

/// Errors raised while executing an image request.
#[derive(Debug, Clone, Error)]
#[allow(missing_docs)]
pub enum ImageError {
    #[error("request data is null")]
    NullData,

    #[error("no fetcher supports data of kind '{kind}': {data}")]
    NoFetcherFound { kind: &'static str, data: String },

    #[error("no decoder supports the fetched source (mime type: {mime_type:?})")]
    NoDecoderFound { mime_type: Option<String> },

    #[error("failed to decode image: {message}")]
    DecodeFailure { message: String },

    #[error("request was cancelled")]
    Cancelled,

    #[error("interceptor at index {index} broke the chain contract: {reason}")]
    InterceptorContract { index: usize, reason: String },

    #[error("{message}")]
    Other { message: String },
}

impl ImageError {
    /// Creates a no-fetcher error for the given data description.
    #[must_use]
    pub fn no_fetcher(kind: &'static str, data: impl Into<String>) -> Self {
        Self::NoFetcherFound {
            kind,
            data: data.into(),
        }
    }

    /// Creates a no-decoder error.
    #[must_use]
    pub fn no_decoder(mime_type: Option<&str>) -> Self {
        Self::NoDecoderFound {
            mime_type: mime_type.map(str::to_string),
        }
    }

    /// Creates a decode failure.
    #[must_use]
    pub fn decode(message: impl Into<String>) -> Self {
        Self::DecodeFailure {
            message: message.into(),
        }
    }

    /// Creates a chain contract violation.
    #[must_use]
    pub fn contract(index: usize, reason: impl Into<String>) -> Self {
        Self::InterceptorContract {
            index,
            reason: reason.into(),
        }
    }

    /// Creates an uncategorised collaborator fault.
    #[must_use]
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            message: message.into(),
        }
    }

    /// Returns whether this is a cancellation rather than a failure.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Returns whether the error points at loader configuration rather than
    /// the data itself.
    #[must_use]
    pub const fn is_configuration_fault(&self) -> bool {
        matches!(
            self,
            Self::NoFetcherFound { .. } | Self::NoDecoderFound { .. } | Self::InterceptorContract { .. }
        )
    }
}

impl From<std::io::Error> for ImageError {
    fn from(err: std::io::Error) -> Self {
        Self::other(format!("io error: {err}"))
    }
}

impl From<image::ImageError> for ImageError {
    fn from(err: image::ImageError) -> Self {
        Self::decode(err.to_string())
    }
}

/// Signal returned when a request was cancelled before it completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("image request was cancelled")]
pub struct Cancelled;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert!(ImageError::Cancelled.is_cancelled());
        assert!(!ImageError::NullData.is_cancelled());
        assert!(ImageError::no_decoder(Some("image/png")).is_configuration_fault());
        assert!(ImageError::no_fetcher("text", "x").is_configuration_fault());
        assert!(!ImageError::decode("bad header").is_configuration_fault());
    }

    #[test]
    fn test_messages() {
        assert_eq!(
            ImageError::decode("bad header").to_string(),
            "failed to decode image: bad header"
        );
        assert_eq!(ImageError::other("boom").to_string(), "boom");
    }

    #[test]
    fn test_io_conversion() {
        let err: ImageError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert!(matches!(err, ImageError::Other { .. }));
    }
}
