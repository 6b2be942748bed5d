//! Pipeline stage counters.
//!
//! Plain atomics shared across workers; the idempotency tests assert on
//! these to prove that duplicate submissions never multiply OCR work.

use std::sync::atomic::{AtomicU64, Ordering};

/// Process-wide pipeline counters.
#[derive(Debug, Default)]
pub struct PipelineMetrics {
    primary_ocr_calls: AtomicU64,
    secondary_ocr_calls: AtomicU64,
    scans_completed: AtomicU64,
}

impl PipelineMetrics {
    /// Fresh zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_primary_ocr(&self) {
        self.primary_ocr_calls.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn record_secondary_ocr(&self) {
        self.secondary_ocr_calls.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn record_scan_completed(&self) {
        self.scans_completed.fetch_add(1, Ordering::SeqCst);
    }

    /// Primary-engine invocations (one per variant attempted).
    #[must_use]
    pub fn primary_ocr_calls(&self) -> u64 {
        self.primary_ocr_calls.load(Ordering::SeqCst)
    }

    /// Secondary-provider invocations.
    #[must_use]
    pub fn secondary_ocr_calls(&self) -> u64 {
        self.secondary_ocr_calls.load(Ordering::SeqCst)
    }

    /// Scans that ran the full pipeline to completion.
    #[must_use]
    pub fn scans_completed(&self) -> u64 {
        self.scans_completed.load(Ordering::SeqCst)
    }
}
