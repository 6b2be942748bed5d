//! Runtime configuration for the scanning pipeline.
//!
//! One flat [`ScanConfig`] struct covers every recognised option. The struct
//! carries a container-level serde default so partial TOML/JSON configs
//! deserialize cleanly on top of [`ScanConfig::default`].

use serde::{Deserialize, Serialize};

/// Hard upper bound on either image axis. Larger inputs are rejected with
/// `BAD_IMAGE` before any work beyond the header sniff.
pub const MAX_IMAGE_DIMENSION: u32 = 4096;

/// Heights above this are downscaled before variant generation.
pub const MAX_WORKING_HEIGHT: u32 = 1500;

/// Full configuration surface of the scanning core.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// OCR strategy stops at the first variant whose mean confidence meets
    /// this threshold.
    pub ocr_early_stop_conf: f32,
    /// Below this mean confidence the secondary-OCR fallback is a candidate.
    pub ocr_min_conf: f32,
    /// Below this qty-name line count the fallback is a candidate.
    pub ocr_min_lines: usize,
    /// Spans below this confidence are dropped from the mean and parsing.
    pub ocr_min_span_conf: f32,
    /// Master switch for the secondary vision-model OCR.
    pub enable_vision_fallback: bool,
    /// Credential for the secondary provider. `None` suppresses the fallback.
    pub vision_api_key: Option<String>,
    /// Endpoint for the secondary provider.
    pub vision_endpoint: String,
    /// Per-minute budget for secondary-OCR calls.
    pub vision_rate_per_minute: u32,
    /// Master switch for the super-resolution variant.
    pub enable_superres: bool,
    /// Width below which the super-resolution variant is inserted.
    pub superres_min_width: u32,
    /// If true, every parsed name must flow through the resolver.
    pub always_verify_carddb: bool,
    /// Allows the online resolution steps (named lookup, autocomplete).
    pub enable_carddb_online_fallback: bool,
    /// Base URL of the online card database.
    pub carddb_base_url: String,
    /// Per-call timeout for online card-database requests, in seconds.
    pub carddb_api_timeout_s: u64,
    /// Minimum inter-request interval for the online card database, in
    /// milliseconds.
    pub carddb_api_rate_limit_ms: u64,
    /// Size of the fuzzy candidate list attached to each parsed line.
    pub fuzzy_topk: usize,
    /// Submission size cap; exceeding yields `BAD_IMAGE`.
    pub max_image_bytes: usize,
    /// Completed-job retention, in seconds.
    pub job_ttl_s: u64,
    /// Idempotency (fingerprint) index retention, in seconds.
    pub fingerprint_ttl_s: u64,
    /// Per-job wall-clock deadline, in seconds.
    pub job_deadline_s: u64,
    /// Queue depth beyond which submissions are refused with `RATE_LIMIT`.
    pub max_queue_depth: usize,
    /// Number of pipeline workers consuming the job queue.
    pub workers: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            ocr_early_stop_conf: 0.85,
            ocr_min_conf: 0.62,
            ocr_min_lines: 10,
            ocr_min_span_conf: 0.3,
            enable_vision_fallback: false,
            vision_api_key: None,
            vision_endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            vision_rate_per_minute: 10,
            enable_superres: false,
            superres_min_width: 1200,
            always_verify_carddb: true,
            enable_carddb_online_fallback: true,
            carddb_base_url: "https://api.scryfall.com".to_string(),
            carddb_api_timeout_s: 5,
            carddb_api_rate_limit_ms: 120,
            fuzzy_topk: 5,
            max_image_bytes: 10 * 1024 * 1024,
            job_ttl_s: 3600,
            fingerprint_ttl_s: 604_800,
            job_deadline_s: 30,
            max_queue_depth: 64,
            workers: 2,
        }
    }
}

impl ScanConfig {
    /// True when the secondary-OCR provider can actually be called:
    /// flag on and credential present.
    #[must_use]
    pub fn vision_fallback_usable(&self) -> bool {
        self.enable_vision_fallback && self.vision_api_key.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[allow(clippy::float_cmp)]
    fn defaults_match_documented_values() {
        let cfg = ScanConfig::default();
        assert_eq!(cfg.ocr_early_stop_conf, 0.85);
        assert_eq!(cfg.ocr_min_conf, 0.62);
        assert_eq!(cfg.ocr_min_lines, 10);
        assert_eq!(cfg.ocr_min_span_conf, 0.3);
        assert!(!cfg.enable_vision_fallback);
        assert!(!cfg.enable_superres);
        assert_eq!(cfg.superres_min_width, 1200);
        assert!(cfg.always_verify_carddb);
        assert!(cfg.enable_carddb_online_fallback);
        assert_eq!(cfg.carddb_api_timeout_s, 5);
        assert_eq!(cfg.carddb_api_rate_limit_ms, 120);
        assert_eq!(cfg.fuzzy_topk, 5);
        assert_eq!(cfg.max_image_bytes, 10 * 1024 * 1024);
        assert_eq!(cfg.job_ttl_s, 3600);
        assert_eq!(cfg.fingerprint_ttl_s, 604_800);
        assert_eq!(cfg.job_deadline_s, 30);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let cfg: ScanConfig =
            serde_json::from_str(r#"{"ocr_min_lines": 4, "enable_superres": true}"#).unwrap();
        assert_eq!(cfg.ocr_min_lines, 4);
        assert!(cfg.enable_superres);
        assert_eq!(cfg.job_deadline_s, 30);
    }

    #[test]
    fn vision_fallback_requires_credential() {
        let mut cfg = ScanConfig {
            enable_vision_fallback: true,
            ..ScanConfig::default()
        };
        assert!(!cfg.vision_fallback_usable());
        cfg.vision_api_key = Some("sk-test".into());
        assert!(cfg.vision_fallback_usable());
    }
}
