//! Resolved cards and normalised decks.

use serde::{Deserialize, Serialize};

use super::line::{Candidate, Section};

/// Warning codes attached to a normalised deck.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WarningCode {
    /// Final OCR confidence stayed below the acceptance threshold.
    OcrLowConf,
    /// A line resolved to no single card; candidates attached.
    MatchAmbiguous,
    /// The MTGO 59+1 basic-land defect was detected and corrected.
    MtgoLandFixApplied,
    /// A 59+1 pair was seen but lacked corroborating evidence; left as-is.
    MtgoLandSuspect,
    /// Lines that matched no grammar were discarded.
    UnparseableLines,
    /// Main section totals fewer than 60 cards.
    DeckShortMain,
    /// Side section totals more than 15 cards.
    DeckOversizeSide,
}

/// A warning with human-readable detail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeckWarning {
    /// Stable code.
    pub code: WarningCode,
    /// Context: the line, count, or name concerned.
    pub detail: String,
}

impl DeckWarning {
    /// Create a warning.
    #[must_use]
    pub fn new(code: WarningCode, detail: impl Into<String>) -> Self {
        Self {
            code,
            detail: detail.into(),
        }
    }
}

/// A parsed line after canonicalisation against the card database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedCard {
    /// Card count after duplicate merging.
    pub quantity: u32,
    /// Authoritative card name; the raw OCR text when unresolved.
    pub canonical_name: String,
    /// Stable identifier from the card database; `None` when resolution
    /// failed (see [`WarningCode::MatchAmbiguous`]).
    pub card_id: Option<String>,
    /// Set code, when the corpus knows one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub set_code: Option<String>,
    /// Collector number, when the corpus knows one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collector_number: Option<String>,
    /// Section the card belongs to.
    pub section: Section,
    /// Offline fuzzy candidates, populated only for unresolved lines.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub candidates: Vec<Candidate>,
}

/// The final structured deck.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizedDeck {
    /// Main-deck cards in resolver order.
    pub main: Vec<ResolvedCard>,
    /// Sideboard cards in resolver order.
    pub side: Vec<ResolvedCard>,
    /// Accumulated warnings.
    #[serde(default)]
    pub warnings: Vec<DeckWarning>,
}

impl NormalizedDeck {
    /// Total quantity in the main section.
    #[must_use]
    pub fn main_count(&self) -> u32 {
        self.main.iter().map(|c| c.quantity).sum()
    }

    /// Total quantity in the side section.
    #[must_use]
    pub fn side_count(&self) -> u32 {
        self.side.iter().map(|c| c.quantity).sum()
    }

    /// Merge cards sharing a `card_id` within each section by summing
    /// quantities, preserving first-occurrence order. Unresolved cards
    /// (`card_id == None`) merge by canonical name instead.
    pub fn merge_duplicates(&mut self) {
        Self::merge_section(&mut self.main);
        Self::merge_section(&mut self.side);
    }

    fn merge_section(cards: &mut Vec<ResolvedCard>) {
        let mut merged: Vec<ResolvedCard> = Vec::with_capacity(cards.len());
        for card in cards.drain(..) {
            let existing = merged.iter_mut().find(|c| match (&c.card_id, &card.card_id) {
                (Some(a), Some(b)) => a == b,
                (None, None) => c.canonical_name == card.canonical_name,
                _ => false,
            });
            match existing {
                Some(c) => c.quantity += card.quantity,
                None => merged.push(card),
            }
        }
        *cards = merged;
    }

    /// Cards of one section in the canonical export order: quantity
    /// descending, then canonical name ascending.
    #[must_use]
    pub fn sorted_section(&self, section: Section) -> Vec<&ResolvedCard> {
        let source = match section {
            Section::Main => &self.main,
            Section::Side => &self.side,
        };
        let mut cards: Vec<&ResolvedCard> = source.iter().collect();
        cards.sort_by(|a, b| {
            b.quantity
                .cmp(&a.quantity)
                .then_with(|| a.canonical_name.cmp(&b.canonical_name))
        });
        cards
    }

    /// Structural sanity check used by exporters: quantities must be
    /// positive and no `card_id` may repeat within a section.
    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        for section in [&self.main, &self.side] {
            let mut seen: Vec<&str> = Vec::with_capacity(section.len());
            for card in section.iter() {
                if card.quantity == 0 {
                    return false;
                }
                if let Some(id) = &card.card_id {
                    if seen.contains(&id.as_str()) {
                        return false;
                    }
                    seen.push(id);
                }
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card(qty: u32, name: &str, id: Option<&str>, section: Section) -> ResolvedCard {
        ResolvedCard {
            quantity: qty,
            canonical_name: name.to_string(),
            card_id: id.map(String::from),
            set_code: None,
            collector_number: None,
            section,
            candidates: Vec::new(),
        }
    }

    #[test]
    fn merge_sums_quantities_by_id() {
        let mut deck = NormalizedDeck {
            main: vec![
                card(2, "Opt", Some("id-opt"), Section::Main),
                card(4, "Island", Some("id-island"), Section::Main),
                card(2, "Opt", Some("id-opt"), Section::Main),
            ],
            side: vec![],
            warnings: vec![],
        };
        deck.merge_duplicates();
        assert_eq!(deck.main.len(), 2);
        assert_eq!(deck.main[0].quantity, 4);
        assert_eq!(deck.main[0].canonical_name, "Opt");
        assert!(deck.is_well_formed());
    }

    #[test]
    fn merge_keeps_sections_apart() {
        let mut deck = NormalizedDeck {
            main: vec![card(4, "Negate", Some("id-negate"), Section::Main)],
            side: vec![card(2, "Negate", Some("id-negate"), Section::Side)],
            warnings: vec![],
        };
        deck.merge_duplicates();
        assert_eq!(deck.main_count(), 4);
        assert_eq!(deck.side_count(), 2);
    }

    #[test]
    fn unresolved_cards_merge_by_name() {
        let mut deck = NormalizedDeck {
            main: vec![
                card(1, "Forst", None, Section::Main),
                card(1, "Forst", None, Section::Main),
            ],
            side: vec![],
            warnings: vec![],
        };
        deck.merge_duplicates();
        assert_eq!(deck.main.len(), 1);
        assert_eq!(deck.main[0].quantity, 2);
    }

    #[test]
    fn sorted_section_orders_by_quantity_then_name() {
        let deck = NormalizedDeck {
            main: vec![
                card(2, "Brainstorm", Some("a"), Section::Main),
                card(4, "Opt", Some("b"), Section::Main),
                card(4, "Island", Some("c"), Section::Main),
            ],
            side: vec![],
            warnings: vec![],
        };
        let names: Vec<&str> = deck
            .sorted_section(Section::Main)
            .iter()
            .map(|c| c.canonical_name.as_str())
            .collect();
        assert_eq!(names, vec!["Island", "Opt", "Brainstorm"]);
    }

    #[test]
    fn duplicate_id_in_section_is_malformed() {
        let deck = NormalizedDeck {
            main: vec![
                card(2, "Opt", Some("id-opt"), Section::Main),
                card(2, "Opt", Some("id-opt"), Section::Main),
            ],
            side: vec![],
            warnings: vec![],
        };
        assert!(!deck.is_well_formed());
    }
}
