//! Raster decoding with the `image` crate.

use image::ImageFormat;
use image::imageops::FilterType;
use tracing::trace;

use crate::domain::entities::{DecodedImage, Options, size_multiplier};
use crate::domain::errors::ImageError;
use crate::domain::ports::{ByteSource, DecodeResult, Decoder};

/// Bytes inspected when sniffing the container format.
const SNIFF_LEN: usize = 32;

/// Decodes PNG, JPEG and WebP sources.
///
/// Sources at least twice the requested size are downsampled while
/// decoding and reported as sampled.
#[derive(Debug, Default, Clone, Copy)]
pub struct RasterDecoder;

impl Decoder for RasterDecoder {
    fn capable(&self, source: &ByteSource, _mime_type: Option<&str>) -> bool {
        image::guess_format(source.peek(SNIFF_LEN)).is_ok_and(is_supported)
    }

    fn decode(&self, source: ByteSource, options: &Options) -> Result<DecodeResult, ImageError> {
        let bytes = source.into_bytes();
        let format = image::guess_format(&bytes)?;
        if !is_supported(format) {
            return Err(ImageError::decode(format!("unsupported format {format:?}")));
        }
        let raster = image::load_from_memory_with_format(&bytes, format)?;
        let (width, height) = (raster.width(), raster.height());

        if let Some((sampled_width, sampled_height)) = sampled_dimensions(width, height, options) {
            trace!(width, height, sampled_width, sampled_height, "Downsampling decoded image");
            let sampled = raster.resize_exact(sampled_width, sampled_height, FilterType::Triangle);
            return Ok(DecodeResult {
                image: DecodedImage::from_raster(sampled),
                is_sampled: true,
            });
        }

        Ok(DecodeResult {
            image: DecodedImage::from_raster(raster),
            is_sampled: false,
        })
    }
}

const fn is_supported(format: ImageFormat) -> bool {
    matches!(format, ImageFormat::Png | ImageFormat::Jpeg | ImageFormat::WebP)
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn sampled_dimensions(width: u32, height: u32, options: &Options) -> Option<(u32, u32)> {
    if options.size.is_original() {
        return None;
    }
    let multiplier = size_multiplier(
        width,
        height,
        options.size.width.px_or(u32::MAX),
        options.size.height.px_or(u32::MAX),
        options.scale,
    );
    if multiplier > 0.5 {
        return None;
    }
    let scaled = |dimension: u32| ((f64::from(dimension) * multiplier).round() as u32).max(1);
    Some((scaled(width), scaled(height)))
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use image::{DynamicImage, ImageFormat};
    use test_case::test_case;

    use super::*;
    use crate::domain::entities::Size;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let mut bytes = Vec::new();
        DynamicImage::new_rgba8(width, height)
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    #[test]
    fn test_capable_sniffs_without_consuming() {
        let source = ByteSource::new(png(4, 4));
        assert!(RasterDecoder.capable(&source, None));
        assert!(!source.is_closed());
        assert!(!RasterDecoder.capable(&ByteSource::new(&b"hello world"[..]), Some("image/png")));
    }

    #[test_case(b"GIF89a\x01\x00\x01\x00\x00\x00\x00;" ; "gif")]
    #[test_case(b"BM\x3a\x00\x00\x00\x00\x00\x00\x00\x36\x00" ; "bmp")]
    #[test_case(b"II*\x00\x08\x00\x00\x00" ; "tiff")]
    fn test_recognised_but_unsupported_formats_are_declined(bytes: &'static [u8]) {
        assert!(!RasterDecoder.capable(&ByteSource::new(bytes), None));
    }

    #[test_case(Size::ORIGINAL, 64, 32, false ; "original size")]
    #[test_case(Size::new(16, 16), 16, 8, true ; "quarter size")]
    #[test_case(Size::new(40, 40), 64, 32, false ; "less than half")]
    fn test_decode_sampling(size: Size, width: u32, height: u32, sampled: bool) {
        let options = Options::default().with_size(size);
        let decoded = RasterDecoder.decode(ByteSource::new(png(64, 32)), &options).unwrap();
        assert_eq!(decoded.image.width(), width);
        assert_eq!(decoded.image.height(), height);
        assert_eq!(decoded.is_sampled, sampled);
        assert!(decoded.image.raster().is_some());
    }

    #[test]
    fn test_corrupt_source_fails() {
        let mut bytes = png(8, 8);
        bytes.truncate(40);
        let err = RasterDecoder
            .decode(ByteSource::new(bytes), &Options::default())
            .unwrap_err();
        assert!(matches!(err, ImageError::DecodeFailure { .. }));
    }
}
