//! Job lifecycle types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::deck::NormalizedDeck;
use super::line::{FormatHint, ParsedLine};
use super::span::OcrRun;
use crate::error::ErrorCode;

/// Job lifecycle state.
///
/// Transitions out of `Processing` are one-shot and irreversible; `progress`
/// reaches 100 exactly once, on the transition to `Completed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl JobState {
    /// True for states no worker will mutate again.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Why the secondary OCR fallback fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackReason {
    /// Primary mean confidence fell below the fallback threshold.
    LowConfidence,
    /// Primary qty-name line count fell below the minimum.
    MinLines,
    /// The primary engine errored on every variant.
    Error,
}

/// Typed error recorded on a failed job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobError {
    /// Stable taxonomy code.
    pub code: ErrorCode,
    /// Human-readable message.
    pub message: String,
}

/// Wall-clock cost of each pipeline stage, in milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageTimings {
    pub preprocess_ms: u64,
    pub ocr_ms: u64,
    pub parse_ms: u64,
    pub resolve_ms: u64,
    pub total_ms: u64,
}

/// Everything a completed scan knows, embedded in the job record and
/// returned verbatim to status pollers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanReport {
    /// The normalised deck.
    pub deck: NormalizedDeck,
    /// The OCR run the strategy selected.
    pub ocr: OcrRun,
    /// Parsed main-section lines with candidate suggestions.
    pub parsed_main: Vec<ParsedLine>,
    /// Parsed side-section lines with candidate suggestions.
    pub parsed_side: Vec<ParsedLine>,
    /// Source-format guess.
    pub format_hint: FormatHint,
    /// Present when the secondary OCR was triggered, with the reason.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback: Option<FallbackReason>,
    /// Per-stage timings.
    pub timings: StageTimings,
    /// Correlation identifier for log lookup; equals the job id.
    pub correlation_id: String,
}

/// A unit of scanning work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// Opaque identifier handed to the submitter.
    pub id: String,
    /// Content fingerprint of the sanitised image (hex SHA-256).
    pub fingerprint: String,
    /// Lifecycle state.
    pub state: JobState,
    /// Monotonic progress in `[0, 100]`.
    pub progress: u8,
    /// Submission time.
    pub created_at: DateTime<Utc>,
    /// Last mutation time.
    pub updated_at: DateTime<Utc>,
    /// Incremented on every write; supports optimistic reads.
    pub revision: u64,
    /// Scan output, present iff `state == Completed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<ScanReport>,
    /// Failure details, present iff `state == Failed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JobError>,
}

impl Job {
    /// Create a freshly queued job.
    #[must_use]
    pub fn queued(id: String, fingerprint: String) -> Self {
        let now = Utc::now();
        Self {
            id,
            fingerprint,
            state: JobState::Queued,
            progress: 0,
            created_at: now,
            updated_at: now,
            revision: 0,
            result: None,
            error: None,
        }
    }

    /// Advance progress, clamped to be monotonic and below 100 while
    /// processing. The terminal transition to 100 happens in
    /// [`Job::complete`].
    pub fn advance_progress(&mut self, progress: u8) {
        let capped = progress.min(99);
        if capped > self.progress {
            self.progress = capped;
            self.touch();
        }
    }

    /// Transition `Queued -> Processing`.
    pub fn start(&mut self) {
        debug_assert_eq!(self.state, JobState::Queued);
        self.state = JobState::Processing;
        self.touch();
    }

    /// Terminal success transition; sets progress to exactly 100.
    pub fn complete(&mut self, report: ScanReport) {
        debug_assert_eq!(self.state, JobState::Processing);
        self.state = JobState::Completed;
        self.progress = 100;
        self.result = Some(report);
        self.touch();
    }

    /// Terminal failure transition. Progress stays below 100.
    pub fn fail(&mut self, code: ErrorCode, message: impl Into<String>) {
        self.state = JobState::Failed;
        self.error = Some(JobError {
            code,
            message: message.into(),
        });
        self.touch();
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
        self.revision += 1;
    }
}
