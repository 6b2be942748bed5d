//! MTG Arena import format.
//!
//! ```text
//! Deck
//! 4 Island
//! 4 Opt
//!
//! Sideboard
//! 2 Negate
//! ```
//!
//! When the corpus supplied a printing, lines carry the Arena set suffix:
//! `4 Island (ANA) 57`.

use std::fmt::Write;

use crate::error::{Result, ScanError};
use crate::types::{NormalizedDeck, ResolvedCard, Section};

use super::ordered;

/// Serialises decks into the Arena import format.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArenaSerializer;

impl ArenaSerializer {
    /// Render `deck` as Arena import text.
    #[must_use]
    pub fn serialize(&self, deck: &NormalizedDeck) -> String {
        let mut out = String::from("Deck");
        for card in ordered(deck, Section::Main) {
            out.push('\n');
            write_card(&mut out, card);
        }
        let side = ordered(deck, Section::Side);
        if !side.is_empty() {
            out.push_str("\n\nSideboard");
            for card in side {
                out.push('\n');
                write_card(&mut out, card);
            }
        }
        out
    }

    /// Parse Arena import text back into a deck skeleton (names and
    /// quantities only; card identity is not recovered).
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::ExportInvalid`] on lines that fit neither the
    /// header nor the card grammar.
    pub fn parse(&self, text: &str) -> Result<NormalizedDeck> {
        let mut deck = NormalizedDeck::default();
        let mut section = Section::Main;
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.eq_ignore_ascii_case("deck") {
                continue;
            }
            if line.eq_ignore_ascii_case("sideboard") {
                section = Section::Side;
                continue;
            }
            let (qty, rest) = split_quantity(line)?;
            // Drop a trailing "(SET) 123" printing suffix if present.
            let name = match rest.rfind(" (") {
                Some(idx) if rest[idx..].contains(')') => rest[..idx].trim_end(),
                _ => rest,
            };
            push_card(&mut deck, qty, name, section);
        }
        Ok(deck)
    }
}

fn write_card(out: &mut String, card: &ResolvedCard) {
    let _ = write!(out, "{} {}", card.quantity, card.canonical_name);
    if let (Some(set), Some(num)) = (&card.set_code, &card.collector_number) {
        let _ = write!(out, " ({}) {}", set.to_ascii_uppercase(), num);
    }
}

pub(crate) fn split_quantity(line: &str) -> Result<(u32, &str)> {
    let (qty_str, rest) = line
        .split_once(' ')
        .ok_or_else(|| ScanError::ExportInvalid(format!("unparseable line: {line}")))?;
    let qty: u32 = qty_str
        .parse()
        .map_err(|_| ScanError::ExportInvalid(format!("bad quantity in line: {line}")))?;
    if qty == 0 {
        return Err(ScanError::ExportInvalid(format!(
            "zero quantity in line: {line}"
        )));
    }
    Ok((qty, rest.trim()))
}

pub(crate) fn push_card(deck: &mut NormalizedDeck, qty: u32, name: &str, section: Section) {
    let card = ResolvedCard {
        quantity: qty,
        canonical_name: name.to_string(),
        card_id: None,
        set_code: None,
        collector_number: None,
        section,
        candidates: Vec::new(),
    };
    match section {
        Section::Main => deck.main.push(card),
        Section::Side => deck.side.push(card),
    }
}
