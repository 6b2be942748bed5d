//! # deckscan-core
//!
//! Core types for deckscan_rs: the deck/job data model, card-name
//! normalisation, the configuration surface, the error taxonomy, and the
//! four deck export serializers.
//!
//! Everything here is pure and deterministic; imaging, OCR, networking, and
//! job execution live in the sibling crates.

pub mod config;
pub mod error;
pub mod normalize;
pub mod serializer;
pub mod types;

pub use config::{ScanConfig, MAX_IMAGE_DIMENSION, MAX_WORKING_HEIGHT};
pub use error::{ErrorCode, Result, ScanError};
pub use serializer::{export_deck, ExportFormat};
pub use types::{
    BoundingBox, Candidate, DeckWarning, EngineKind, FallbackReason, FormatHint, ImageKind, Job,
    JobError, JobState, NormalizedDeck, OcrRun, ParsedLine, ResolvedCard, SanitizedImage,
    ScanReport, Section, Span, StageTimings, VariantKind, WarningCode,
};
