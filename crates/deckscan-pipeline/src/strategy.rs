//! OCR strategy: variant ladder execution and fallback policy.
//!
//! Walks the preprocessor's variant ladder in order, stopping early at the
//! configured confidence. When every variant is exhausted the best run wins
//! by the `(qty-name line count, mean confidence)` tuple, and the secondary
//! provider is consulted iff the quantitative triggers and every gate
//! (flag, credential, per-minute budget) agree.

use std::sync::Arc;

use deckscan_core::types::{EngineKind, FallbackReason, OcrRun, VariantKind};
use deckscan_core::{ScanConfig, ScanError};
use deckscan_ocr::{TextRecognizer, VisionOcr};
use deckscan_preprocess::Variant;

use crate::metrics::PipelineMetrics;
use crate::parser;

/// The selected run plus fallback bookkeeping for the job record.
#[derive(Debug)]
pub struct StrategyOutcome {
    /// The winning run.
    pub run: OcrRun,
    /// Why the secondary provider was invoked, when it was.
    pub fallback: Option<FallbackReason>,
}

/// Orchestrates the primary engine over the variant ladder.
pub struct OcrStrategy {
    primary: Arc<dyn TextRecognizer>,
    vision: Option<Arc<VisionOcr>>,
    config: Arc<ScanConfig>,
    metrics: Arc<PipelineMetrics>,
}

impl OcrStrategy {
    /// Build a strategy over the given engines.
    #[must_use]
    pub fn new(
        primary: Arc<dyn TextRecognizer>,
        vision: Option<Arc<VisionOcr>>,
        config: Arc<ScanConfig>,
        metrics: Arc<PipelineMetrics>,
    ) -> Self {
        Self {
            primary,
            vision,
            config,
            metrics,
        }
    }

    /// Select the best OCR run for the given variant ladder.
    ///
    /// # Errors
    ///
    /// [`ScanError::Ocr`] when the primary engine fails on every variant
    /// and no fallback rescues the scan.
    pub async fn select(&self, variants: &[Variant]) -> Result<StrategyOutcome, ScanError> {
        let min_span_conf = self.config.ocr_min_span_conf;
        let mut best: Option<(usize, OcrRun)> = None;
        let mut last_error: Option<ScanError> = None;

        for variant in variants {
            self.metrics.record_primary_ocr();
            let run = match self.recognize_blocking(variant).await {
                Ok(spans) => {
                    OcrRun::from_spans(variant.kind, EngineKind::Primary, spans, min_span_conf)
                }
                Err(err) => {
                    log::warn!("primary OCR failed on {} variant: {err}", variant.kind.as_str());
                    last_error = Some(err);
                    continue;
                }
            };

            log::debug!(
                "variant {}: mean confidence {:.3}, {} span(s)",
                variant.kind.as_str(),
                run.mean_confidence,
                run.line_count
            );

            if run.mean_confidence >= self.config.ocr_early_stop_conf {
                log::debug!("early stop on {} variant", variant.kind.as_str());
                return Ok(StrategyOutcome {
                    run,
                    fallback: None,
                });
            }

            let lines = parser::count_qty_lines(&run, min_span_conf);
            let better = match &best {
                None => true,
                Some((best_lines, best_run)) => {
                    (lines, run.mean_confidence) > (*best_lines, best_run.mean_confidence)
                }
            };
            if better {
                best = Some((lines, run));
            }
        }

        match best {
            Some((lines, run)) => {
                let trigger = if run.mean_confidence < self.config.ocr_min_conf {
                    Some(FallbackReason::LowConfidence)
                } else if lines < self.config.ocr_min_lines {
                    Some(FallbackReason::MinLines)
                } else {
                    None
                };
                match trigger {
                    Some(reason) => Ok(self.try_fallback(variants, run, reason).await),
                    None => Ok(StrategyOutcome {
                        run,
                        fallback: None,
                    }),
                }
            }
            None => {
                // Primary produced nothing at all; the fallback is the last
                // line of defence before failing the job.
                if let Some(outcome) = self.fallback_run(variants, FallbackReason::Error).await {
                    return Ok(outcome);
                }
                Err(last_error
                    .unwrap_or_else(|| ScanError::Ocr("no variants to recognise".to_string())))
            }
        }
    }

    async fn recognize_blocking(
        &self,
        variant: &Variant,
    ) -> Result<Vec<deckscan_core::types::Span>, ScanError> {
        let engine = Arc::clone(&self.primary);
        let image = variant.image.clone();
        let spans = tokio::task::spawn_blocking(move || engine.recognize(&image))
            .await
            .map_err(|e| ScanError::Internal(format!("OCR task join: {e}")))?
            .map_err(ScanError::from)?;
        Ok(spans)
    }

    /// Try the secondary provider; on empty or failed output keep the
    /// primary run. The trigger reason is recorded either way once the
    /// provider was actually invoked.
    async fn try_fallback(
        &self,
        variants: &[Variant],
        primary_best: OcrRun,
        reason: FallbackReason,
    ) -> StrategyOutcome {
        match self.fallback_run(variants, reason).await {
            Some(outcome) => outcome,
            None => StrategyOutcome {
                run: primary_best,
                fallback: None,
            },
        }
    }

    /// Invoke the secondary provider on the original variant when every
    /// gate passes. `None` when gated off, budget-exhausted, errored, or
    /// empty.
    async fn fallback_run(
        &self,
        variants: &[Variant],
        reason: FallbackReason,
    ) -> Option<StrategyOutcome> {
        if !self.config.vision_fallback_usable() {
            return None;
        }
        let vision = self.vision.as_ref()?;
        if !vision.try_reserve() {
            log::info!("secondary OCR budget exhausted; keeping primary result");
            return None;
        }
        let original = variants
            .iter()
            .find(|v| v.kind == VariantKind::Original)
            .or_else(|| variants.first())?;

        self.metrics.record_secondary_ocr();
        log::info!("invoking secondary OCR ({reason:?})");
        match vision.recognize_image(&original.image).await {
            Ok(spans) if !spans.is_empty() => {
                let run = OcrRun::from_spans(
                    VariantKind::Original,
                    EngineKind::Secondary,
                    spans,
                    self.config.ocr_min_span_conf,
                );
                Some(StrategyOutcome {
                    run,
                    fallback: Some(reason),
                })
            }
            Ok(_) => {
                log::info!("secondary OCR returned nothing; keeping primary result");
                None
            }
            Err(err) => {
                log::warn!("secondary OCR failed: {err}");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deckscan_core::types::Span;
    use deckscan_ocr::testing::{spans_from_lines, FakeRecognizer};
    use deckscan_preprocess::variant_ladder;
    use image::DynamicImage;

    fn ladder() -> Vec<Variant> {
        let img = DynamicImage::new_rgb8(64, 64);
        variant_ladder(&img, &ScanConfig::default())
    }

    fn strategy(engine: FakeRecognizer, config: ScanConfig) -> (OcrStrategy, Arc<PipelineMetrics>) {
        let metrics = Arc::new(PipelineMetrics::new());
        (
            OcrStrategy::new(Arc::new(engine), None, Arc::new(config), Arc::clone(&metrics)),
            metrics,
        )
    }

    fn deck_lines() -> Vec<&'static str> {
        vec![
            "4 Island", "4 Opt", "4 Negate", "4 Shock", "4 Duress", "4 Anticipate",
            "4 Divination", "4 Fog", "4 Plummet", "4 Naturalize",
        ]
    }

    #[tokio::test]
    async fn early_stop_on_first_confident_variant() {
        let (strategy, metrics) = strategy(
            FakeRecognizer::constant(spans_from_lines(&deck_lines(), 0.95)),
            ScanConfig::default(),
        );
        let outcome = strategy.select(&ladder()).await.unwrap();
        assert_eq!(outcome.run.variant, VariantKind::Original);
        assert_eq!(metrics.primary_ocr_calls(), 1, "stopped after one variant");
        assert!(outcome.fallback.is_none());
    }

    #[tokio::test]
    async fn exhaustive_selection_prefers_more_lines() {
        // Four variants: the third yields the most parseable lines.
        let runs = vec![
            spans_from_lines(&["4 Opt"], 0.7),
            spans_from_lines(&["4 Opt", "noise"], 0.7),
            spans_from_lines(&deck_lines(), 0.7),
            spans_from_lines(&["4 Opt", "4 Island"], 0.7),
        ];
        let (strategy, metrics) = strategy(FakeRecognizer::scripted(runs), ScanConfig::default());
        let outcome = strategy.select(&ladder()).await.unwrap();
        assert_eq!(metrics.primary_ocr_calls(), 4, "all variants attempted");
        assert_eq!(outcome.run.variant, VariantKind::Binarised);
        assert_eq!(
            parser::count_qty_lines(&outcome.run, 0.3),
            deck_lines().len()
        );
    }

    #[tokio::test]
    async fn selection_breaks_line_ties_by_confidence() {
        // Same line count everywhere; only confidence differs.
        let runs = vec![
            spans_from_lines(&["4 Opt", "4 Island"], 0.5),
            spans_from_lines(&["4 Opt", "4 Island"], 0.75),
            spans_from_lines(&["4 Opt", "4 Island"], 0.6),
            spans_from_lines(&["4 Opt", "4 Island"], 0.6),
        ];
        let (strategy, _) = strategy(FakeRecognizer::scripted(runs), ScanConfig::default());
        let outcome = strategy.select(&ladder()).await.unwrap();
        assert_eq!(outcome.run.variant, VariantKind::Denoised);
        assert!((outcome.run.mean_confidence - 0.75).abs() < 1e-6);
    }

    #[tokio::test]
    async fn no_fallback_without_flag_even_when_triggered() {
        let (strategy, metrics) = strategy(
            FakeRecognizer::constant(spans_from_lines(&["4 Opt"], 0.45)),
            ScanConfig::default(),
        );
        let outcome = strategy.select(&ladder()).await.unwrap();
        assert!(outcome.fallback.is_none());
        assert_eq!(metrics.secondary_ocr_calls(), 0);
        assert_eq!(outcome.run.engine, EngineKind::Primary);
    }

    #[tokio::test]
    async fn engine_failure_on_all_variants_fails_the_scan() {
        let (strategy, _) = strategy(FakeRecognizer::failing(), ScanConfig::default());
        let err = strategy.select(&ladder()).await.unwrap_err();
        assert!(matches!(err, ScanError::Ocr(_)));
    }

    #[tokio::test]
    async fn empty_spans_still_select_a_run() {
        let (strategy, _) = strategy(
            FakeRecognizer::constant(Vec::<Span>::new()),
            ScanConfig::default(),
        );
        let outcome = strategy.select(&ladder()).await.unwrap();
        assert!(outcome.run.is_empty());
    }
}
