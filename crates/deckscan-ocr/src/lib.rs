//! # deckscan-ocr
//!
//! OCR capabilities for deckscan_rs.
//!
//! The pipeline consumes text recognition through the [`TextRecognizer`]
//! trait; the bundled implementations are:
//!
//! - [`PaddleOcr`] — the primary engine: ONNX Runtime sessions running
//!   PaddleOCR detection + recognition models, fully local.
//! - [`VisionOcr`] — the optional secondary fallback: a vision-capable chat
//!   model reached over HTTPS, used only when quantitative triggers fire.
//! - [`TesseractOcr`] — an alternative local engine behind the `tesseract`
//!   cargo feature.
//! - [`testing::FakeRecognizer`] — canned spans for tests.
//!
//! Engines return plain span lists; the strategy layer assembles them into
//! scored [`deckscan_core::OcrRun`]s.

pub mod paddle;
pub mod testing;
pub mod vision;

#[cfg(feature = "tesseract")]
pub mod tesseract;

use image::DynamicImage;
use thiserror::Error;

use deckscan_core::types::Span;
use deckscan_core::ScanError;

pub use paddle::PaddleOcr;
#[cfg(feature = "tesseract")]
pub use tesseract::TesseractOcr;
pub use vision::VisionOcr;

/// OCR-specific failures.
#[derive(Error, Debug)]
pub enum OcrError {
    /// Model files missing or unloadable.
    #[error("failed to load OCR model: {0}")]
    ModelLoad(String),

    /// ONNX Runtime fault during inference.
    #[error("onnx runtime: {0}")]
    Runtime(#[from] ort::Error),

    /// Input could not be shaped for the model.
    #[error("OCR preprocessing failed: {0}")]
    Preprocess(String),

    /// The secondary provider call failed.
    #[error("vision provider: {0}")]
    Provider(String),

    /// The secondary provider returned an unusable payload.
    #[error("vision provider returned malformed payload: {0}")]
    MalformedResponse(String),
}

impl From<OcrError> for ScanError {
    fn from(err: OcrError) -> Self {
        Self::Ocr(err.to_string())
    }
}

/// A synchronous text-recognition capability.
///
/// Implementations must be deterministic for identical input and identical
/// model weights, must not touch the network, and must be safe to call from
/// multiple threads for independent images. Calls may take seconds and
/// allocate heavily; callers run them on blocking threads.
pub trait TextRecognizer: Send + Sync {
    /// Recognise text in `image`, returning spans in reading order.
    ///
    /// # Errors
    ///
    /// Returns [`OcrError`] when the engine itself fails; an image with no
    /// text yields `Ok(vec![])`.
    fn recognize(&self, image: &DynamicImage) -> Result<Vec<Span>, OcrError>;
}
