//! Error types for deck scanning operations.
//!
//! [`ScanError`] is the workspace-wide error enum; stage-local errors in the
//! other crates convert into it at the pipeline boundary. [`ErrorCode`] is
//! the stable, serialisable taxonomy surfaced on failed jobs.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Stable error taxonomy surfaced to clients on jobs and exports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Submission rejected at the boundary: unsupported type, size,
    /// dimensions, or decode failure.
    BadImage,
    /// Pipeline completed but confidence stayed below thresholds and no
    /// fallback rescued it. Attached as a warning, never a job failure.
    OcrLowConf,
    /// A parsed line could not be resolved to a single card. Per-line.
    MatchAmbiguous,
    /// Unknown target format or malformed deck handed to an exporter.
    ExportInvalid,
    /// Submission refused due to backpressure or per-caller limits.
    RateLimit,
    /// Job exceeded its wall-clock deadline.
    Timeout,
    /// Any unclassified fault.
    Internal,
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::BadImage => "BAD_IMAGE",
            Self::OcrLowConf => "OCR_LOW_CONF",
            Self::MatchAmbiguous => "MATCH_AMBIGUOUS",
            Self::ExportInvalid => "EXPORT_INVALID",
            Self::RateLimit => "RATE_LIMIT",
            Self::Timeout => "TIMEOUT",
            Self::Internal => "INTERNAL",
        };
        f.write_str(s)
    }
}

/// Error type covering every failure mode of the scanning pipeline.
#[derive(Error, Debug)]
pub enum ScanError {
    /// Image rejected at the submission boundary.
    #[error("bad image: {0}")]
    BadImage(String),

    /// Submission refused because the queue is full or a caller limit hit.
    #[error("rate limited: {0}")]
    RateLimit(String),

    /// Job exceeded its wall-clock deadline.
    #[error("job exceeded deadline of {seconds}s")]
    Timeout {
        /// The configured deadline that elapsed.
        seconds: u64,
    },

    /// Export requested for an unknown format or a malformed deck.
    #[error("export invalid: {0}")]
    ExportInvalid(String),

    /// Primary OCR engine fault. Fails the job as `INTERNAL`.
    #[error("OCR failure: {0}")]
    Ocr(String),

    /// Card database (corpus or online) fault.
    #[error("card database failure: {0}")]
    CardDb(String),

    /// Job storage fault.
    #[error("job store failure: {0}")]
    Store(String),

    /// File I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialisation error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Any unclassified fault.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ScanError {
    /// Map this error onto the stable client-facing taxonomy.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::BadImage(_) => ErrorCode::BadImage,
            Self::RateLimit(_) => ErrorCode::RateLimit,
            Self::Timeout { .. } => ErrorCode::Timeout,
            Self::ExportInvalid(_) => ErrorCode::ExportInvalid,
            Self::Ocr(_)
            | Self::CardDb(_)
            | Self::Store(_)
            | Self::Io(_)
            | Self::Json(_)
            | Self::Internal(_) => ErrorCode::Internal,
        }
    }
}

impl From<anyhow::Error> for ScanError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

/// Type alias for [`Result<T, ScanError>`].
pub type Result<T> = std::result::Result<T, ScanError>;
