//! Test doubles for the OCR capability.
//!
//! Pipeline and job tests need deterministic spans without model weights;
//! [`FakeRecognizer`] plays back canned results and counts invocations.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use image::DynamicImage;

use deckscan_core::types::{BoundingBox, Span};

use crate::{OcrError, TextRecognizer};

/// A recognizer that returns pre-recorded span lists in order, repeating
/// the last one when exhausted.
pub struct FakeRecognizer {
    scripted: Mutex<Vec<Vec<Span>>>,
    calls: AtomicUsize,
    fail: bool,
}

impl FakeRecognizer {
    /// Always return `spans`.
    #[must_use]
    pub fn constant(spans: Vec<Span>) -> Self {
        Self {
            scripted: Mutex::new(vec![spans]),
            calls: AtomicUsize::new(0),
            fail: false,
        }
    }

    /// Return each element of `runs` for successive calls, repeating the
    /// last one.
    #[must_use]
    pub fn scripted(runs: Vec<Vec<Span>>) -> Self {
        assert!(!runs.is_empty(), "scripted recognizer needs at least one run");
        Self {
            scripted: Mutex::new(runs),
            calls: AtomicUsize::new(0),
            fail: false,
        }
    }

    /// A recognizer whose every call errors.
    #[must_use]
    pub fn failing() -> Self {
        Self {
            scripted: Mutex::new(vec![Vec::new()]),
            calls: AtomicUsize::new(0),
            fail: true,
        }
    }

    /// Number of `recognize` invocations so far.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl TextRecognizer for FakeRecognizer {
    fn recognize(&self, _image: &DynamicImage) -> Result<Vec<Span>, OcrError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(OcrError::Preprocess("scripted failure".to_string()));
        }
        let scripted = self
            .scripted
            .lock()
            .map_err(|_| OcrError::Preprocess("lock poisoned".to_string()))?;
        let index = call.min(scripted.len() - 1);
        Ok(scripted[index].clone())
    }
}

/// Build a span with the given confidence and a line-index box.
#[must_use]
pub fn span_line(index: usize, text: &str, confidence: f32) -> Span {
    #[allow(clippy::cast_precision_loss)]
    let y = index as f32 * 24.0;
    Span::new(
        text.to_string(),
        confidence,
        BoundingBox::new(0.0, y, 200.0, 24.0),
    )
}

/// Spans for a whole decklist, one per line, uniform confidence.
#[must_use]
pub fn spans_from_lines(lines: &[&str], confidence: f32) -> Vec<Span> {
    lines
        .iter()
        .enumerate()
        .map(|(i, l)| span_line(i, l, confidence))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image() -> DynamicImage {
        DynamicImage::new_rgb8(8, 8)
    }

    #[test]
    fn scripted_runs_play_back_in_order() {
        let fake = FakeRecognizer::scripted(vec![
            spans_from_lines(&["4 Opt"], 0.5),
            spans_from_lines(&["4 Opt", "4 Island"], 0.9),
        ]);
        assert_eq!(fake.recognize(&image()).unwrap().len(), 1);
        assert_eq!(fake.recognize(&image()).unwrap().len(), 2);
        assert_eq!(fake.recognize(&image()).unwrap().len(), 2);
        assert_eq!(fake.calls(), 3);
    }

    #[test]
    fn failing_recognizer_errors() {
        let fake = FakeRecognizer::failing();
        assert!(fake.recognize(&image()).is_err());
        assert_eq!(fake.calls(), 1);
    }
}
