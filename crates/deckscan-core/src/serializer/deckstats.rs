//! Deckstats text format.
//!
//! Counts carry an `x` suffix and the sideboard gets a `Sideboard:` header:
//!
//! ```text
//! 4x Island
//! 4x Opt
//!
//! Sideboard:
//! 2x Negate
//! ```

use crate::types::{NormalizedDeck, Section};

use super::ordered;

/// Serialises decks into the Deckstats text format.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeckstatsSerializer;

impl DeckstatsSerializer {
    /// Render `deck` as Deckstats text.
    #[must_use]
    pub fn serialize(&self, deck: &NormalizedDeck) -> String {
        let mut out = String::new();
        let main = ordered(deck, Section::Main);
        for (i, card) in main.iter().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            out.push_str(&format!("{}x {}", card.quantity, card.canonical_name));
        }
        let side = ordered(deck, Section::Side);
        if !side.is_empty() {
            if !main.is_empty() {
                out.push_str("\n\n");
            }
            out.push_str("Sideboard:");
            for card in side {
                out.push('\n');
                out.push_str(&format!("{}x {}", card.quantity, card.canonical_name));
            }
        }
        out
    }
}
