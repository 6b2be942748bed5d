//! Sanitised image metadata.

use serde::{Deserialize, Serialize};

/// Accepted input encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageKind {
    Jpeg,
    Png,
    Webp,
    Gif,
    Bmp,
    Tiff,
}

impl ImageKind {
    /// MIME type of the source encoding.
    #[must_use]
    pub const fn mime(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Webp => "image/webp",
            Self::Gif => "image/gif",
            Self::Bmp => "image/bmp",
            Self::Tiff => "image/tiff",
        }
    }
}

/// A decoded, re-encoded upload.
///
/// Re-encoding to PNG drops embedded metadata and trailing payloads, so the
/// bytes here are safe to hash and to hand to the OCR engines. The source
/// bytes are discarded at construction.
#[derive(Debug, Clone)]
pub struct SanitizedImage {
    /// PNG re-encoding of the decoded pixels.
    pub png: Vec<u8>,
    /// Pixel width.
    pub width: u32,
    /// Pixel height.
    pub height: u32,
    /// Encoding the upload arrived in.
    pub source_kind: ImageKind,
}
