//! Classic MTGO text format.
//!
//! Main cards as `<qty> <name>`, sideboard cards as `SB: <qty> <name>`, no
//! headers. The grammar is unambiguous, so this module also parses.

use std::fmt::Write;

use crate::error::Result;
use crate::types::{NormalizedDeck, Section};

use super::arena::{push_card, split_quantity};
use super::ordered;

/// Serialises and parses the MTGO text format.
#[derive(Debug, Clone, Copy, Default)]
pub struct MtgoSerializer;

impl MtgoSerializer {
    /// Render `deck` as MTGO text.
    #[must_use]
    pub fn serialize(&self, deck: &NormalizedDeck) -> String {
        let mut lines: Vec<String> = Vec::with_capacity(deck.main.len() + deck.side.len());
        for card in ordered(deck, Section::Main) {
            lines.push(format!("{} {}", card.quantity, card.canonical_name));
        }
        for card in ordered(deck, Section::Side) {
            let mut line = String::from("SB: ");
            let _ = write!(line, "{} {}", card.quantity, card.canonical_name);
            lines.push(line);
        }
        lines.join("\n")
    }

    /// Parse MTGO text back into a deck skeleton.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::ScanError::ExportInvalid`] on unparseable
    /// lines.
    pub fn parse(&self, text: &str) -> Result<NormalizedDeck> {
        let mut deck = NormalizedDeck::default();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let (body, section) = match line.strip_prefix("SB:") {
                Some(rest) => (rest.trim(), Section::Side),
                None => (line, Section::Main),
            };
            let (qty, name) = split_quantity(body)?;
            push_card(&mut deck, qty, name, section);
        }
        Ok(deck)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serializer::{export_deck, ExportFormat};

    #[test]
    fn round_trips_its_own_output() {
        let deck = crate::serializer::tests::sample_deck();
        let text = MtgoSerializer.serialize(&deck);
        let parsed = MtgoSerializer.parse(&text).unwrap();
        let again = export_deck(&parsed, ExportFormat::Mtgo).unwrap();
        assert_eq!(text, again);
    }

    #[test]
    fn sideboard_lines_carry_prefix() {
        let deck = crate::serializer::tests::sample_deck();
        let text = MtgoSerializer.serialize(&deck);
        assert!(text.ends_with("SB: 2 Negate"));
    }
}
