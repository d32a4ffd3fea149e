//! Per-attempt request resolution.

use crate::domain::entities::{DecodedImage, ErrorResult, ImageRequest, Options, Precision, Size};
use crate::domain::errors::ImageError;

/// Derives per-attempt [`Options`] and error results from requests.
#[derive(Debug, Clone, Copy)]
pub struct RequestService {
    add_file_last_modified_to_cache_key: bool,
    respect_network_cache_headers: bool,
}

impl RequestService {
    /// Creates a service with loader-wide fetch flags.
    #[must_use]
    pub const fn new(
        add_file_last_modified_to_cache_key: bool,
        respect_network_cache_headers: bool,
    ) -> Self {
        Self {
            add_file_last_modified_to_cache_key,
            respect_network_cache_headers,
        }
    }

    /// Builds the options collaborators see for `request` at `size`.
    #[must_use]
    pub fn options(&self, request: &ImageRequest, size: Size) -> Options {
        Options {
            size,
            scale: request.scale(),
            allow_inexact_size: Self::allow_inexact_size(request),
            allow_hardware: request.allow_hardware(),
            disk_cache_key: request.disk_cache_key().map(str::to_string),
            memory_cache_policy: request.memory_cache_policy(),
            disk_cache_policy: request.disk_cache_policy(),
            network_cache_policy: request.network_cache_policy(),
            add_file_last_modified_to_cache_key: self.add_file_last_modified_to_cache_key,
            respect_network_cache_headers: self.respect_network_cache_headers,
            parameters: request.parameters().clone(),
        }
    }

    /// Whether the output may deviate from the requested size.
    ///
    /// Automatic precision is inexact only when the size is measured from
    /// the target itself.
    #[must_use]
    pub fn allow_inexact_size(request: &ImageRequest) -> bool {
        match request.precision() {
            Precision::Exact => false,
            Precision::Inexact => true,
            Precision::Automatic => request.size_resolver().is_target_bound(),
        }
    }

    /// Whether `image` may be shown for `request` given its hardware flag.
    #[must_use]
    pub fn is_config_valid_for_hardware(request: &ImageRequest, image: &DecodedImage) -> bool {
        !image.is_hardware() || request.allow_hardware()
    }

    /// Wraps a failure in a result carrying the request's fallback or error
    /// image.
    #[must_use]
    pub fn error_result(request: &ImageRequest, error: ImageError) -> ErrorResult {
        ErrorResult::new(request.clone(), error)
    }
}

impl Default for RequestService {
    fn default() -> Self {
        Self::new(true, true)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use test_case::test_case;

    use super::*;
    use crate::domain::entities::CachePolicy;
    use crate::domain::ports::FixedSizeResolver;

    #[test_case(Precision::Exact, false, false ; "exact fixed")]
    #[test_case(Precision::Exact, true, false ; "exact measured")]
    #[test_case(Precision::Inexact, false, true ; "inexact fixed")]
    #[test_case(Precision::Automatic, false, false ; "automatic fixed")]
    #[test_case(Precision::Automatic, true, true ; "automatic measured")]
    fn test_allow_inexact_size(precision: Precision, measured: bool, expected: bool) {
        let resolver = if measured {
            FixedSizeResolver::measured(Size::new(10, 10))
        } else {
            FixedSizeResolver::new(Size::new(10, 10))
        };
        let request = ImageRequest::builder("a")
            .size_resolver(Arc::new(resolver))
            .precision(precision)
            .build();
        assert_eq!(RequestService::allow_inexact_size(&request), expected);
    }

    #[test]
    fn test_options_carry_request_values() {
        let request = ImageRequest::builder("a")
            .disk_cache_key("disk")
            .memory_cache_policy(CachePolicy::ReadOnly)
            .allow_hardware(false)
            .build();
        let options = RequestService::new(false, true).options(&request, Size::new(4, 4));

        assert_eq!(options.size, Size::new(4, 4));
        assert_eq!(options.disk_cache_key.as_deref(), Some("disk"));
        assert_eq!(options.memory_cache_policy, CachePolicy::ReadOnly);
        assert!(!options.allow_hardware);
        assert!(!options.add_file_last_modified_to_cache_key);
        assert!(options.respect_network_cache_headers);
    }

    #[test]
    fn test_hardware_validity() {
        let hardware = DecodedImage::opaque(1, 1).into_hardware();
        let allowed = ImageRequest::builder("a").build();
        let denied = ImageRequest::builder("a").allow_hardware(false).build();

        assert!(RequestService::is_config_valid_for_hardware(&allowed, &hardware));
        assert!(!RequestService::is_config_valid_for_hardware(&denied, &hardware));
        assert!(RequestService::is_config_valid_for_hardware(
            &denied,
            &DecodedImage::opaque(1, 1)
        ));
    }
}
