//! Data model shared across the scanning pipeline.

mod deck;
mod image;
mod job;
mod line;
mod span;

pub use deck::{DeckWarning, NormalizedDeck, ResolvedCard, WarningCode};
pub use image::{ImageKind, SanitizedImage};
pub use job::{
    FallbackReason, Job, JobError, JobState, ScanReport, StageTimings,
};
pub use line::{Candidate, FormatHint, ParsedLine, Section};
pub use span::{BoundingBox, EngineKind, OcrRun, Span, VariantKind};
