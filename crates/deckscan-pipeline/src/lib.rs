//! # deckscan-pipeline
//!
//! The scan pipeline: variant generation, OCR strategy, decklist parsing,
//! and card resolution, assembled behind one [`ScanPipeline`] entry point.
//!
//! Stages are pure over immutable data; OCR and the online card database
//! are the impure edges, reached through the traits and clients of the
//! sibling crates.

pub mod metrics;
pub mod parser;
pub mod resolver;
pub mod strategy;

use std::sync::Arc;
use std::time::Instant;

use image::DynamicImage;

use deckscan_carddb::{CardCorpus, ScryfallClient};
use deckscan_core::types::{ScanReport, StageTimings, WarningCode};
use deckscan_core::{DeckWarning, ScanConfig, ScanError};
use deckscan_ocr::{TextRecognizer, VisionOcr};
use deckscan_preprocess::variant_ladder;

pub use metrics::PipelineMetrics;
pub use parser::{parse_line, parse_run, ParseOutcome};
pub use resolver::Resolver;
pub use strategy::{OcrStrategy, StrategyOutcome};

/// Progress observer; receives values in `[0, 100)` (the job layer owns
/// the terminal 100).
pub type ProgressSink = dyn Fn(u8) + Send + Sync;

/// Progress checkpoints reported while a scan runs.
mod checkpoint {
    pub const SANITISED: u8 = 10;
    pub const VARIANTS: u8 = 25;
    pub const OCR: u8 = 60;
    pub const PARSED: u8 = 75;
    pub const RESOLVED: u8 = 95;
}

/// The assembled scanning pipeline. Cheap to clone via `Arc` fields; one
/// instance serves all workers.
pub struct ScanPipeline {
    config: Arc<ScanConfig>,
    strategy: OcrStrategy,
    resolver: Resolver,
    metrics: Arc<PipelineMetrics>,
}

impl ScanPipeline {
    /// Assemble a pipeline from its capabilities.
    ///
    /// `vision` and `online` are optional: absent, the fallback and the
    /// online resolution steps are disabled regardless of configuration.
    #[must_use]
    pub fn new(
        config: ScanConfig,
        primary: Arc<dyn TextRecognizer>,
        vision: Option<Arc<VisionOcr>>,
        corpus: Arc<CardCorpus>,
        online: Option<Arc<ScryfallClient>>,
    ) -> Self {
        let config = Arc::new(config);
        let metrics = Arc::new(PipelineMetrics::new());
        Self {
            strategy: OcrStrategy::new(
                primary,
                vision,
                Arc::clone(&config),
                Arc::clone(&metrics),
            ),
            resolver: Resolver::new(corpus, online, Arc::clone(&config)),
            config,
            metrics,
        }
    }

    /// Shared counters; the job layer exposes these for observability.
    #[must_use]
    pub fn metrics(&self) -> Arc<PipelineMetrics> {
        Arc::clone(&self.metrics)
    }

    /// The configuration this pipeline runs with.
    #[must_use]
    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Run the full scan on an already-sanitised image.
    ///
    /// `correlation_id` threads through logs and the final report;
    /// `progress` fires at each stage checkpoint.
    ///
    /// # Errors
    ///
    /// OCR engine faults and corpus faults fail the scan; parsing and
    /// resolution shortfalls surface as warnings instead.
    pub async fn scan_image(
        &self,
        decoded: &DynamicImage,
        correlation_id: &str,
        progress: &ProgressSink,
    ) -> Result<ScanReport, ScanError> {
        let started = Instant::now();
        progress(checkpoint::SANITISED);

        let preprocess_started = Instant::now();
        let variants = variant_ladder(decoded, &self.config);
        let preprocess_ms = elapsed_ms(preprocess_started);
        log::debug!("[{correlation_id}] {} variant(s) prepared", variants.len());
        progress(checkpoint::VARIANTS);

        let ocr_started = Instant::now();
        let outcome = self.strategy.select(&variants).await?;
        let ocr_ms = elapsed_ms(ocr_started);
        log::info!(
            "[{correlation_id}] selected {} run from {} engine (confidence {:.3})",
            outcome.run.variant.as_str(),
            match outcome.run.engine {
                deckscan_core::EngineKind::Primary => "primary",
                deckscan_core::EngineKind::Secondary => "secondary",
            },
            outcome.run.mean_confidence
        );
        progress(checkpoint::OCR);

        let parse_started = Instant::now();
        let parsed = parse_run(&outcome.run, self.config.ocr_min_span_conf);
        let parse_ms = elapsed_ms(parse_started);
        log::debug!(
            "[{correlation_id}] parsed {} main / {} side line(s), {} unparseable",
            parsed.main.len(),
            parsed.side.len(),
            parsed.unparseable
        );
        progress(checkpoint::PARSED);

        let resolve_started = Instant::now();
        let mut deck = self.resolver.resolve_deck(&parsed).await?;
        let resolve_ms = elapsed_ms(resolve_started);
        progress(checkpoint::RESOLVED);

        if outcome.run.mean_confidence < self.config.ocr_min_conf {
            deck.warnings.push(DeckWarning::new(
                WarningCode::OcrLowConf,
                format!(
                    "mean OCR confidence {:.2} stayed below {:.2}",
                    outcome.run.mean_confidence, self.config.ocr_min_conf
                ),
            ));
        }

        self.metrics.record_scan_completed();
        Ok(ScanReport {
            deck,
            parsed_main: parsed.main,
            parsed_side: parsed.side,
            format_hint: parsed.hint,
            fallback: outcome.fallback,
            ocr: outcome.run,
            timings: StageTimings {
                preprocess_ms,
                ocr_ms,
                parse_ms,
                resolve_ms,
                total_ms: elapsed_ms(started),
            },
            correlation_id: correlation_id.to_string(),
        })
    }
}

fn elapsed_ms(since: Instant) -> u64 {
    u64::try_from(since.elapsed().as_millis()).unwrap_or(u64::MAX)
}
