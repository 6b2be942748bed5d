//! Card-name resolution.
//!
//! Each parsed line is canonicalised against the corpus, stopping at the
//! first success: exact offline, fuzzy offline, online fuzzy lookup,
//! online autocomplete. Online steps degrade silently to offline-only on
//! transport trouble; a line that survives all four steps unresolved is
//! emitted with `card_id = None`, its top offline candidates, and a
//! `MATCH_AMBIGUOUS` warning.
//!
//! With online resolution disabled the resolver is fully deterministic for
//! a fixed corpus snapshot.

use std::sync::Arc;

use deckscan_core::normalize::normalize;
use deckscan_core::types::{
    Candidate, DeckWarning, NormalizedDeck, ParsedLine, ResolvedCard, Section, WarningCode,
};
use deckscan_core::{ScanConfig, ScanError};

use deckscan_carddb::{CardCorpus, CardDbError, CardHit, ScryfallClient};

use crate::parser::ParseOutcome;

/// Minimum fuzzy score the offline top candidate needs to be accepted.
const FUZZY_ACCEPT_THRESHOLD: f64 = 0.85;

/// Structural expectation for a constructed main deck.
const EXPECTED_MAIN: u32 = 60;
/// Structural expectation for a sideboard.
const EXPECTED_SIDE: u32 = 15;

/// Canonicalises parsed lines against the card database.
pub struct Resolver {
    corpus: Arc<CardCorpus>,
    online: Option<Arc<ScryfallClient>>,
    config: Arc<ScanConfig>,
    accept_threshold: f64,
}

impl Resolver {
    /// Build a resolver. Pass `online: None` to pin offline-only
    /// behaviour regardless of configuration.
    #[must_use]
    pub fn new(
        corpus: Arc<CardCorpus>,
        online: Option<Arc<ScryfallClient>>,
        config: Arc<ScanConfig>,
    ) -> Self {
        Self {
            corpus,
            online,
            config,
            accept_threshold: FUZZY_ACCEPT_THRESHOLD,
        }
    }

    /// Override the fuzzy acceptance threshold (tests pin behaviour at
    /// stricter thresholds).
    #[must_use]
    pub fn with_accept_threshold(mut self, threshold: f64) -> Self {
        self.accept_threshold = threshold;
        self
    }

    /// Resolve a full parse outcome into a [`NormalizedDeck`].
    ///
    /// Parser warnings are carried over; per-line ambiguities and
    /// structural shortfalls are appended. Duplicates within a section are
    /// merged before return.
    ///
    /// # Errors
    ///
    /// [`ScanError::CardDb`] only for corpus-level faults (not-ready);
    /// individual line failures never fail the deck.
    pub async fn resolve_deck(&self, outcome: &ParseOutcome) -> Result<NormalizedDeck, ScanError> {
        let mut deck = NormalizedDeck {
            main: Vec::with_capacity(outcome.main.len()),
            side: Vec::with_capacity(outcome.side.len()),
            warnings: outcome.warnings.clone(),
        };

        for line in outcome.main.iter().chain(outcome.side.iter()) {
            let (card, warning) = self.resolve_line(line).await?;
            match card.section {
                Section::Main => deck.main.push(card),
                Section::Side => deck.side.push(card),
            }
            if let Some(warning) = warning {
                deck.warnings.push(warning);
            }
        }

        deck.merge_duplicates();

        if deck.main_count() < EXPECTED_MAIN && !deck.main.is_empty() {
            deck.warnings.push(DeckWarning::new(
                WarningCode::DeckShortMain,
                format!("main deck totals {} cards", deck.main_count()),
            ));
        }
        if deck.side_count() > EXPECTED_SIDE {
            deck.warnings.push(DeckWarning::new(
                WarningCode::DeckOversizeSide,
                format!("sideboard totals {} cards", deck.side_count()),
            ));
        }

        Ok(deck)
    }

    /// Resolve one line through the four-step ladder.
    ///
    /// # Errors
    ///
    /// Only corpus-level faults propagate.
    pub async fn resolve_line(
        &self,
        line: &ParsedLine,
    ) -> Result<(ResolvedCard, Option<DeckWarning>), ScanError> {
        let normalized = normalize(&line.raw_name);

        // Step 1: exact offline.
        if let Some(hit) = self.corpus.lookup_exact(&normalized).map_err(ScanError::from)? {
            return Ok((resolved(line, &hit), None));
        }

        // Step 2: fuzzy offline.
        let candidates = self
            .corpus
            .fuzzy_candidates(&normalized, self.config.fuzzy_topk)
            .map_err(ScanError::from)?;
        if let Some(top) = candidates.first() {
            if top.score >= self.accept_threshold {
                log::debug!(
                    "fuzzy resolved '{}' -> '{}' ({:.3})",
                    line.raw_name,
                    top.name,
                    top.score
                );
                return Ok((resolved(line, top), None));
            }
        }

        // Steps 3-4: online, best-effort.
        if self.config.enable_carddb_online_fallback {
            if let Some(client) = &self.online {
                if let Some(hit) = self.resolve_online(client, &line.raw_name).await {
                    return Ok((resolved(line, &hit), None));
                }
            }
        }

        // Unresolved: attach candidates and flag.
        let warning = DeckWarning::new(
            WarningCode::MatchAmbiguous,
            format!("could not resolve '{} {}'", line.quantity, line.raw_name),
        );
        let card = ResolvedCard {
            quantity: line.quantity,
            canonical_name: line.raw_name.clone(),
            card_id: None,
            set_code: None,
            collector_number: None,
            section: line.section,
            candidates: candidates
                .iter()
                .map(|hit| Candidate {
                    card_id: hit.oracle_id.clone(),
                    name: hit.name.clone(),
                    score: hit.score,
                })
                .collect(),
        };
        Ok((card, Some(warning)))
    }

    /// Online `named?fuzzy`, then autocomplete accepted only on a unique
    /// suggestion. All failures degrade to `None`.
    async fn resolve_online(&self, client: &ScryfallClient, raw_name: &str) -> Option<CardHit> {
        match client.named_fuzzy(raw_name).await {
            Ok(Some(card)) => {
                return Some(CardHit {
                    oracle_id: card.oracle_id,
                    name: card.name,
                    set_code: card.set,
                    collector_number: card.collector_number,
                    score: 1.0,
                });
            }
            Ok(None) => {}
            Err(CardDbError::BreakerOpen) => {
                log::debug!("online resolution skipped: breaker open");
                return None;
            }
            Err(err) => {
                log::warn!("online named lookup failed for '{raw_name}': {err}");
                return None;
            }
        }

        match client.autocomplete(raw_name).await {
            Ok(suggestions) if suggestions.len() == 1 => {
                let name = &suggestions[0];
                match self.corpus.lookup_exact(&normalize(name)) {
                    Ok(Some(hit)) => Some(hit),
                    _ => {
                        log::debug!("autocomplete suggestion '{name}' not in corpus; ignoring");
                        None
                    }
                }
            }
            Ok(_) => None,
            Err(err) => {
                log::warn!("autocomplete failed for '{raw_name}': {err}");
                None
            }
        }
    }
}

fn resolved(line: &ParsedLine, hit: &CardHit) -> ResolvedCard {
    ResolvedCard {
        quantity: line.quantity,
        canonical_name: hit.name.clone(),
        card_id: Some(hit.oracle_id.clone()),
        set_code: hit.set_code.clone(),
        collector_number: hit.collector_number.clone(),
        section: line.section,
        candidates: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deckscan_carddb::CardEntry;
    use deckscan_core::types::FormatHint;

    fn corpus() -> Arc<CardCorpus> {
        let corpus = CardCorpus::new();
        corpus.build_from_entries(vec![
            CardEntry {
                oracle_id: "id-island".into(),
                name: "Island".into(),
                set_code: Some("ana".into()),
                collector_number: Some("57".into()),
            },
            CardEntry {
                oracle_id: "id-forest".into(),
                name: "Forest".into(),
                set_code: None,
                collector_number: None,
            },
            CardEntry {
                oracle_id: "id-opt".into(),
                name: "Opt".into(),
                set_code: None,
                collector_number: None,
            },
        ]);
        Arc::new(corpus)
    }

    fn offline_resolver() -> Resolver {
        Resolver::new(corpus(), None, Arc::new(ScanConfig::default()))
    }

    fn line(qty: u32, name: &str, section: Section) -> ParsedLine {
        ParsedLine::new(qty, name.to_string(), section)
    }

    fn outcome(main: Vec<ParsedLine>, side: Vec<ParsedLine>) -> ParseOutcome {
        ParseOutcome {
            main,
            side,
            hint: FormatHint::Unknown,
            unparseable: 0,
            warnings: Vec::new(),
        }
    }

    #[tokio::test]
    async fn exact_path_completeness() {
        let resolver = offline_resolver();
        let (card, warning) = resolver
            .resolve_line(&line(4, "ISLAND", Section::Main))
            .await
            .unwrap();
        assert_eq!(card.card_id.as_deref(), Some("id-island"));
        assert_eq!(card.canonical_name, "Island");
        assert_eq!(card.set_code.as_deref(), Some("ana"));
        assert!(warning.is_none());
    }

    #[tokio::test]
    async fn fuzzy_accepts_close_typo() {
        let resolver = offline_resolver();
        let (card, warning) = resolver
            .resolve_line(&line(4, "Forst", Section::Main))
            .await
            .unwrap();
        assert_eq!(card.card_id.as_deref(), Some("id-forest"));
        assert!(warning.is_none());
    }

    #[tokio::test]
    async fn strict_threshold_flags_ambiguous_with_candidates() {
        let resolver = offline_resolver().with_accept_threshold(0.999);
        let (card, warning) = resolver
            .resolve_line(&line(4, "Forst", Section::Main))
            .await
            .unwrap();
        assert!(card.card_id.is_none());
        assert!(!card.candidates.is_empty());
        assert_eq!(card.candidates[0].name, "Forest");
        assert_eq!(warning.unwrap().code, WarningCode::MatchAmbiguous);
    }

    #[tokio::test]
    async fn offline_resolution_is_deterministic() {
        let resolver = offline_resolver();
        let l = line(3, "Forst", Section::Main);
        let (a, _) = resolver.resolve_line(&l).await.unwrap();
        let (b, _) = resolver.resolve_line(&l).await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn deck_resolution_merges_and_warns_short_main() {
        let resolver = offline_resolver();
        let parsed = outcome(
            vec![
                line(4, "Island", Section::Main),
                line(4, "Opt", Section::Main),
                line(4, "island", Section::Main),
            ],
            vec![line(2, "Opt", Section::Side)],
        );
        let deck = resolver.resolve_deck(&parsed).await.unwrap();
        assert_eq!(deck.main.len(), 2, "duplicate Island lines merged");
        assert_eq!(deck.main[0].quantity, 8);
        assert_eq!(deck.side_count(), 2);
        assert!(deck
            .warnings
            .iter()
            .any(|w| w.code == WarningCode::DeckShortMain));
        assert!(deck.is_well_formed());
    }

    #[tokio::test]
    async fn unresolvable_line_completes_with_warning() {
        let resolver = offline_resolver();
        let parsed = outcome(vec![line(4, "Zzzyx Completely Unknown", Section::Main)], vec![]);
        let deck = resolver.resolve_deck(&parsed).await.unwrap();
        assert_eq!(deck.main.len(), 1);
        assert!(deck.main[0].card_id.is_none());
        assert!(deck
            .warnings
            .iter()
            .any(|w| w.code == WarningCode::MatchAmbiguous));
    }

    #[tokio::test]
    async fn not_ready_corpus_fails_resolution() {
        let resolver = Resolver::new(
            Arc::new(CardCorpus::new()),
            None,
            Arc::new(ScanConfig::default()),
        );
        let err = resolver
            .resolve_line(&line(4, "Island", Section::Main))
            .await
            .unwrap_err();
        assert!(matches!(err, ScanError::CardDb(_)));
    }
}
