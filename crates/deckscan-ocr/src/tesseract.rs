//! Alternative local engine backed by Tesseract (via leptess).
//!
//! Slower and less accurate on stylised client fonts than the ONNX engine,
//! but useful where ONNX Runtime is unavailable. Enabled with the
//! `tesseract` cargo feature.

use std::sync::Mutex;

use image::DynamicImage;
use leptess::LepTess;

use deckscan_core::types::{BoundingBox, Span};

use crate::{OcrError, TextRecognizer};

/// Tesseract-backed recognizer.
pub struct TesseractOcr {
    inner: Mutex<LepTess>,
}

impl TesseractOcr {
    /// Initialise with the English model from the default tessdata path.
    ///
    /// # Errors
    ///
    /// [`OcrError::ModelLoad`] when tessdata is missing.
    pub fn new() -> Result<Self, OcrError> {
        let inner = LepTess::new(None, "eng")
            .map_err(|e| OcrError::ModelLoad(format!("tesseract init: {e}")))?;
        Ok(Self {
            inner: Mutex::new(inner),
        })
    }
}

impl TextRecognizer for TesseractOcr {
    fn recognize(&self, image: &DynamicImage) -> Result<Vec<Span>, OcrError> {
        let mut png = Vec::new();
        image
            .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
            .map_err(|e| OcrError::Preprocess(e.to_string()))?;

        let mut engine = self
            .inner
            .lock()
            .map_err(|_| OcrError::Preprocess("tesseract session poisoned".to_string()))?;
        engine
            .set_image_from_mem(&png)
            .map_err(|e| OcrError::Preprocess(format!("set image: {e}")))?;

        let text = engine
            .get_utf8_text()
            .map_err(|e| OcrError::Provider(format!("tesseract text: {e}")))?;
        #[allow(clippy::cast_precision_loss)]
        let confidence = engine.mean_text_conf().clamp(0, 100) as f32 / 100.0;

        let spans = text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .enumerate()
            .map(|(i, line)| {
                #[allow(clippy::cast_precision_loss)]
                let y = i as f32 * 24.0;
                Span::new(
                    line.to_string(),
                    confidence,
                    BoundingBox::new(0.0, y, 0.0, 24.0),
                )
            })
            .collect();
        Ok(spans)
    }
}
