//! Upload sanitisation.
//!
//! Every submission is decoded and re-encoded to PNG before anything else
//! touches it. Re-encoding drops EXIF and other embedded metadata and
//! defeats polyglot files; the sanitised bytes are also what the content
//! fingerprint is computed over.

use image::{DynamicImage, ImageFormat};
use std::io::Cursor;
use thiserror::Error;

use deckscan_core::types::{ImageKind, SanitizedImage};
use deckscan_core::{ScanConfig, ScanError, MAX_IMAGE_DIMENSION};

/// Boundary rejection reasons. All map to `BAD_IMAGE`.
#[derive(Error, Debug)]
pub enum SanitizeError {
    /// Payload larger than the configured cap.
    #[error("image is {actual} bytes, cap is {cap}")]
    TooLarge {
        /// Submitted size.
        actual: usize,
        /// Configured cap.
        cap: usize,
    },

    /// Magic-number sniff found no supported format.
    #[error("unsupported or unrecognised image format")]
    UnsupportedFormat,

    /// The decoder rejected the payload.
    #[error("image decode failed: {0}")]
    Decode(String),

    /// An axis exceeds the hard dimension cap.
    #[error("image is {width}x{height}, maximum axis is {max}")]
    TooBig {
        /// Decoded width.
        width: u32,
        /// Decoded height.
        height: u32,
        /// The cap.
        max: u32,
    },

    /// PNG re-encoding failed.
    #[error("image re-encode failed: {0}")]
    Encode(String),
}

impl From<SanitizeError> for ScanError {
    fn from(err: SanitizeError) -> Self {
        Self::BadImage(err.to_string())
    }
}

fn classify(format: ImageFormat) -> Option<ImageKind> {
    match format {
        ImageFormat::Jpeg => Some(ImageKind::Jpeg),
        ImageFormat::Png => Some(ImageKind::Png),
        ImageFormat::WebP => Some(ImageKind::Webp),
        ImageFormat::Gif => Some(ImageKind::Gif),
        ImageFormat::Bmp => Some(ImageKind::Bmp),
        ImageFormat::Tiff => Some(ImageKind::Tiff),
        _ => None,
    }
}

/// Validate and re-encode an upload.
///
/// Checks, in order: size cap, magic-number sniff against the accepted
/// formats, decode, dimension cap, PNG re-encode. The decoded pixels are
/// returned alongside the sanitised bytes so the preprocessor does not
/// decode twice.
///
/// # Errors
///
/// Any [`SanitizeError`]; callers map it to `BAD_IMAGE`.
pub fn sanitize(
    bytes: &[u8],
    config: &ScanConfig,
) -> Result<(SanitizedImage, DynamicImage), SanitizeError> {
    if bytes.len() > config.max_image_bytes {
        return Err(SanitizeError::TooLarge {
            actual: bytes.len(),
            cap: config.max_image_bytes,
        });
    }

    let format = image::guess_format(bytes).map_err(|_| SanitizeError::UnsupportedFormat)?;
    let source_kind = classify(format).ok_or(SanitizeError::UnsupportedFormat)?;

    let decoded =
        image::load_from_memory(bytes).map_err(|e| SanitizeError::Decode(e.to_string()))?;

    let (width, height) = (decoded.width(), decoded.height());
    if width > MAX_IMAGE_DIMENSION || height > MAX_IMAGE_DIMENSION {
        return Err(SanitizeError::TooBig {
            width,
            height,
            max: MAX_IMAGE_DIMENSION,
        });
    }

    let mut png = Vec::new();
    decoded
        .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
        .map_err(|e| SanitizeError::Encode(e.to_string()))?;

    log::debug!(
        "sanitised {}x{} {} upload ({} -> {} bytes)",
        width,
        height,
        source_kind.mime(),
        bytes.len(),
        png.len()
    );

    Ok((
        SanitizedImage {
            png,
            width,
            height,
            source_kind,
        },
        decoded,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(
            width,
            height,
            image::Rgb([200, 200, 200]),
        ));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        buf
    }

    #[test]
    fn accepts_a_plain_png() {
        let bytes = png_bytes(64, 48);
        let (sanitized, decoded) = sanitize(&bytes, &ScanConfig::default()).unwrap();
        assert_eq!(sanitized.width, 64);
        assert_eq!(sanitized.height, 48);
        assert_eq!(sanitized.source_kind, ImageKind::Png);
        assert_eq!(decoded.width(), 64);
        assert!(!sanitized.png.is_empty());
    }

    #[test]
    fn size_cap_is_exact() {
        let bytes = png_bytes(64, 48);
        let mut config = ScanConfig::default();
        config.max_image_bytes = bytes.len();
        assert!(sanitize(&bytes, &config).is_ok());
        config.max_image_bytes = bytes.len() - 1;
        let err = sanitize(&bytes, &config).unwrap_err();
        assert!(matches!(err, SanitizeError::TooLarge { .. }));
    }

    #[test]
    fn dimension_cap_is_exact() {
        let ok = png_bytes(MAX_IMAGE_DIMENSION, 1);
        assert!(sanitize(&ok, &ScanConfig::default()).is_ok());
        let too_wide = png_bytes(MAX_IMAGE_DIMENSION + 1, 1);
        let err = sanitize(&too_wide, &ScanConfig::default()).unwrap_err();
        assert!(matches!(err, SanitizeError::TooBig { .. }));
    }

    #[test]
    fn rejects_non_image_payloads() {
        let err = sanitize(b"#!/bin/sh\necho pwned", &ScanConfig::default()).unwrap_err();
        assert!(matches!(err, SanitizeError::UnsupportedFormat));
    }

    #[test]
    fn rejects_truncated_image() {
        let mut bytes = png_bytes(64, 48);
        bytes.truncate(bytes.len() / 2);
        let err = sanitize(&bytes, &ScanConfig::default()).unwrap_err();
        assert!(matches!(err, SanitizeError::Decode(_)));
    }

    #[test]
    fn reencode_is_stable_for_fingerprinting() {
        let bytes = png_bytes(32, 32);
        let (a, _) = sanitize(&bytes, &ScanConfig::default()).unwrap();
        let (b, _) = sanitize(&bytes, &ScanConfig::default()).unwrap();
        assert_eq!(a.png, b.png);
    }

    #[test]
    fn maps_into_bad_image() {
        let err: ScanError = SanitizeError::UnsupportedFormat.into();
        assert_eq!(err.code(), deckscan_core::ErrorCode::BadImage);
    }
}
