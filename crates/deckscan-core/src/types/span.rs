//! OCR span and run types.

use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box of a recognised text region, in source-image
/// pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Left coordinate.
    pub x: f32,
    /// Top coordinate.
    pub y: f32,
    /// Width.
    pub width: f32,
    /// Height.
    pub height: f32,
}

impl BoundingBox {
    /// Create a new bounding box.
    #[inline]
    #[must_use]
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Zero-sized box for spans whose provider reports no geometry.
    #[inline]
    #[must_use]
    pub const fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0, 0.0)
    }

    /// Vertical centre, used for reading-order sorting.
    #[inline]
    #[must_use]
    pub fn center_y(&self) -> f32 {
        self.y + self.height / 2.0
    }
}

/// A single recognised text region with the engine's self-reported certainty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Span {
    /// Recognised text content.
    pub text: String,
    /// Confidence in `[0, 1]`.
    pub confidence: f32,
    /// Region the text was read from.
    pub bbox: BoundingBox,
}

impl Span {
    /// Create a new span.
    #[inline]
    #[must_use]
    pub const fn new(text: String, confidence: f32, bbox: BoundingBox) -> Self {
        Self {
            text,
            confidence,
            bbox,
        }
    }
}

/// Tag of a preprocessed image variant.
///
/// The declaration order here is the required processing order; the
/// super-resolution variant, when produced, runs first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariantKind {
    /// 4x cubic upscale plus unsharp mask, for low-resolution inputs.
    Superres,
    /// The sanitised input, untouched apart from the working-height cap.
    Original,
    /// Non-local-means denoised.
    Denoised,
    /// Adaptive-threshold binarised.
    Binarised,
    /// Unsharp-masked.
    Sharpened,
}

impl VariantKind {
    /// Short label for logs and job reports.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Superres => "superres",
            Self::Original => "original",
            Self::Denoised => "denoised",
            Self::Binarised => "binarised",
            Self::Sharpened => "sharpened",
        }
    }
}

/// Which OCR capability produced a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineKind {
    /// The default local engine.
    Primary,
    /// The optional higher-quality fallback provider.
    Secondary,
}

/// A complete OCR result for one image variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrRun {
    /// Variant the engine consumed.
    pub variant: VariantKind,
    /// Capability that produced the spans.
    pub engine: EngineKind,
    /// All spans as reported, including low-confidence ones.
    pub spans: Vec<Span>,
    /// Arithmetic mean of span confidences at or above the span threshold
    /// the run was built with. Zero when no span qualifies.
    pub mean_confidence: f32,
    /// Number of spans that met the span threshold.
    pub line_count: usize,
}

impl OcrRun {
    /// Build a run from raw spans, computing the mean over spans whose
    /// confidence is at least `min_span_confidence`. Spans below the
    /// threshold stay in `spans` for diagnostics but contribute neither to
    /// the mean nor to `line_count`.
    #[must_use]
    pub fn from_spans(
        variant: VariantKind,
        engine: EngineKind,
        spans: Vec<Span>,
        min_span_confidence: f32,
    ) -> Self {
        let qualifying: Vec<f32> = spans
            .iter()
            .filter(|s| s.confidence >= min_span_confidence)
            .map(|s| s.confidence)
            .collect();
        #[allow(clippy::cast_precision_loss)]
        let mean_confidence = if qualifying.is_empty() {
            0.0
        } else {
            qualifying.iter().sum::<f32>() / qualifying.len() as f32
        };
        Self {
            variant,
            engine,
            spans,
            mean_confidence,
            line_count: qualifying.len(),
        }
    }

    /// Spans that met the construction threshold, in reading order.
    pub fn usable_spans(&self, min_span_confidence: f32) -> impl Iterator<Item = &Span> + '_ {
        self.spans
            .iter()
            .filter(move |s| s.confidence >= min_span_confidence)
    }

    /// True when no span qualified.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.line_count == 0
    }
}
